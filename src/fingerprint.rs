//! Fingerprint calculator (spec §4.3): discovers the effective inputs,
//! serializes them through the ordered dg-spec document (spec §4.2), and
//! hashes the result with FNV-1a 64 (spec §4.1).

use std::collections::BTreeMap;
use std::path::{Path, MAIN_SEPARATOR};

use indexmap::IndexMap;
use nuget_schemas::dgspec::{
    is_modern_framework, DependencyEntry, DgSpecDocument, DownloadDependencyEntry, FrameworkSpec,
    PackageSpec, RestoreFrameworkEntry, RestoreMetadata,
};
use nuget_util::fnv::hash_base64;
use serde_json::Value;

use crate::project::ProjectModel;

/// Inputs the fingerprint calculator cannot derive from `ProjectModel`
/// alone: SDK-probed paths and, per the resolved Open Question in
/// SPEC_FULL.md §9.A, a previously persisted download-dependencies map
/// carried forward rather than recomputed.
#[derive(Debug, Clone, Default)]
pub struct FingerprintInputs {
    /// Per-framework path to the SDK's runtime-identifier-graph file.
    pub runtime_identifier_graph_paths: BTreeMap<String, String>,
    pub sdk_analysis_level: Option<String>,
    /// Per-framework download-dependency list, carried forward from a
    /// previously written dg-spec when one exists.
    pub download_dependencies: BTreeMap<String, Vec<DownloadDependencyEntry>>,
}

impl FingerprintInputs {
    /// Reconstructs inputs ahead of a restore: probes `sdk_root` for the
    /// runtime-identifier-graph file every modern framework shares, and
    /// reads `download_dependencies` back out of the dg-spec this project
    /// persisted on its last restore, when one exists (spec §9.A: "carry
    /// forward from a previously persisted dg-spec" rather than recompute
    /// every time).
    pub fn discover(sdk_root: Option<&Path>, previous_dgspec_path: &Path, tfms: &[String]) -> Self {
        let runtime_identifier_graph_paths = sdk_root
            .and_then(probe_runtime_identifier_graph)
            .map(|path| tfms.iter().map(|tfm| (tfm.clone(), path.clone())).collect())
            .unwrap_or_default();

        FingerprintInputs {
            runtime_identifier_graph_paths,
            sdk_analysis_level: None,
            download_dependencies: read_persisted_download_dependencies(previous_dgspec_path),
        }
    }
}

/// Walks `sdk_root` looking for the SDK's runtime-identifier-graph file.
/// Real SDK installs keep exactly one; the first match wins.
fn probe_runtime_identifier_graph(sdk_root: &Path) -> Option<String> {
    walkdir::WalkDir::new(sdk_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == "PortableRuntimeIdentifierGraph.json")
        .map(|entry| entry.path().to_string_lossy().into_owned())
}

/// Reads `downloadDependencies` back out of a previously written dg-spec
/// document without deriving `Deserialize` on the (serialize-only)
/// document types above — the fingerprint's shape is stable enough that
/// generic JSON traversal is simpler than keeping a parallel read model.
fn read_persisted_download_dependencies(path: &Path) -> BTreeMap<String, Vec<DownloadDependencyEntry>> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    let Ok(value) = serde_json::from_str::<Value>(&text) else {
        return BTreeMap::new();
    };
    let Some(frameworks) = value
        .get("projects")
        .and_then(|p| p.as_object())
        .and_then(|projects| projects.values().next())
        .and_then(|project| project.get("frameworks"))
        .and_then(|f| f.as_object())
    else {
        return BTreeMap::new();
    };

    frameworks
        .iter()
        .filter_map(|(tfm, spec)| {
            let entries = spec.get("downloadDependencies")?.as_array()?;
            let parsed: Vec<DownloadDependencyEntry> = entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name")?.as_str()?.to_string();
                    let version = entry.get("version")?.as_str()?.to_string();
                    Some(DownloadDependencyEntry { name, version })
                })
                .collect();
            if parsed.is_empty() {
                None
            } else {
                Some((tfm.clone(), parsed))
            }
        })
        .collect()
}

pub struct FingerprintResult {
    pub hash: String,
    pub canonical_json: Vec<u8>,
}

pub struct FingerprintCalculator;

impl FingerprintCalculator {
    /// Computes the fingerprint for `project`. `inputs` carries the
    /// SDK-probed and carried-forward data described above.
    pub fn compute(project: &dyn ProjectModel, inputs: &FingerprintInputs) -> FingerprintResult {
        let doc = Self::build_document(project, inputs);
        let canonical_json = doc.to_canonical_json();
        let hash = hash_base64(&canonical_json);
        FingerprintResult {
            hash,
            canonical_json,
        }
    }

    fn build_document(project: &dyn ProjectModel, inputs: &FingerprintInputs) -> DgSpecDocument {
        let project_path = project.project_path().to_string_lossy().into_owned();

        let mut original_tfms: Vec<String> = project.target_frameworks().to_vec();
        original_tfms.sort();

        let mut sorted_sources: Vec<String> = project.sources().to_vec();
        sorted_sources.sort();

        let mut fallback_folders: Vec<String> = project
            .fallback_folders()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        fallback_folders.sort();

        let mut config_file_paths: Vec<String> = project
            .config_file_paths()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        config_file_paths.sort();

        let mut restore_frameworks = IndexMap::new();
        let mut package_spec_frameworks = IndexMap::new();
        for tfm in project.target_frameworks() {
            restore_frameworks.insert(tfm.clone(), RestoreFrameworkEntry::new(tfm.clone()));

            let deps: BTreeMap<String, DependencyEntry> = project
                .package_references()
                .iter()
                .filter(|r| {
                    r.framework_condition
                        .as_deref()
                        .map(|c| c == tfm)
                        .unwrap_or(true)
                })
                .map(|r| {
                    (
                        r.id.clone(),
                        DependencyEntry::package(r.range.normalized_for_dgspec()),
                    )
                })
                .collect();

            let mut spec = FrameworkSpec::new(tfm.clone(), deps);
            if is_modern_framework(tfm) {
                let rid_graph = inputs
                    .runtime_identifier_graph_paths
                    .get(tfm)
                    .cloned()
                    .unwrap_or_default();
                spec = spec.with_modern_defaults(rid_graph);
                if let Some(downloads) = inputs.download_dependencies.get(tfm) {
                    spec = spec.with_download_dependencies(downloads.clone());
                }
            }
            package_spec_frameworks.insert(tfm.clone(), spec);
        }

        let packages_path = format!(
            "{}{MAIN_SEPARATOR}",
            project.packages_folder().to_string_lossy().trim_end_matches(MAIN_SEPARATOR)
        );

        let restore_metadata = RestoreMetadata {
            project_unique_name: project_path.clone(),
            project_name: project.project_name().to_string(),
            project_path: project_path.clone(),
            packages_path,
            output_path: format!(
                "{}{MAIN_SEPARATOR}",
                project.output_path().to_string_lossy().trim_end_matches(MAIN_SEPARATOR)
            ),
            project_style: "PackageReference".to_string(),
            fallback_folders,
            config_file_paths,
            original_target_frameworks: original_tfms,
            sources: RestoreMetadata::sources_map(&sorted_sources),
            frameworks: restore_frameworks,
            warning_properties: Default::default(),
            restore_audit_properties: Default::default(),
            sdk_analysis_level: inputs.sdk_analysis_level.clone(),
        };

        let package_spec = PackageSpec::new(restore_metadata, package_spec_frameworks);
        DgSpecDocument::new(&project_path, package_spec)
    }
}
