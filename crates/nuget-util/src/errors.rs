//! The restore engine's error taxonomy (spec §7). Each variant carries the
//! fields the taxonomy lists as "carries" and maps to a stable `NU1xxx`
//! code consumed by downstream tooling.

use std::path::PathBuf;

pub type RestoreResult<T> = Result<T, RestoreError>;

/// Per-source version summary attached to `package-version-not-found` and
/// `only-prerelease-available` errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersionInfo {
    pub source: String,
    pub total_count: usize,
    pub nearest_version: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("NU1101: package '{id}' is not found in any source\n{}", format_sources(.sources))]
    PackageNotFound { id: String, sources: Vec<String> },

    #[error("NU1102: unable to find package '{id}' with version {constraint}\n{}", format_version_infos(.version_infos))]
    PackageVersionNotFound {
        project_path: PathBuf,
        id: String,
        constraint: String,
        version_infos: Vec<SourceVersionInfo>,
    },

    #[error("NU1103: only prerelease versions of package '{id}' satisfy {constraint}\n{}", format_version_infos(.version_infos))]
    OnlyPrereleaseAvailable {
        project_path: PathBuf,
        id: String,
        constraint: String,
        version_infos: Vec<SourceVersionInfo>,
    },

    #[error("NU1605: version conflict for package '{id}': no version satisfies all constraints ({constraints:?})")]
    VersionConflict { id: String, constraints: Vec<String> },

    #[error("circuit open for host '{host}'")]
    CircuitOpen { host: String },

    #[error("rate limit exceeded for source '{source_name}'")]
    RateLimitExceeded { source_name: String },

    #[error("io error at '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("protocol error from source '{source_name}': {message}")]
    Protocol { source_name: String, message: String },

    #[error("parse error in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("restore cancelled: {reason}")]
    Cancelled { reason: String },
}

impl RestoreError {
    /// Stable `NU1xxx`-style code per the taxonomy in spec §7.
    pub fn stable_code(&self) -> &'static str {
        match self {
            RestoreError::PackageNotFound { .. } => "NU1101",
            RestoreError::PackageVersionNotFound { .. } => "NU1102",
            RestoreError::OnlyPrereleaseAvailable { .. } => "NU1103",
            RestoreError::VersionConflict { .. } => "NU1605",
            RestoreError::CircuitOpen { .. } => "NU1301",
            RestoreError::RateLimitExceeded { .. } => "NU1302",
            RestoreError::Io { .. } => "NU1001",
            RestoreError::Protocol { .. } => "NU1002",
            RestoreError::Parse { .. } => "NU1003",
            RestoreError::Cancelled { .. } => "NU1004",
        }
    }
}

fn format_sources(sources: &[String]) -> String {
    sources
        .iter()
        .map(|s| format!("  - {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_version_infos(infos: &[SourceVersionInfo]) -> String {
    infos
        .iter()
        .map(|i| {
            format!(
                "  - {}: {} version(s) available, nearest {}",
                i.source,
                i.total_count,
                i.nearest_version.as_deref().unwrap_or("<none>")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
