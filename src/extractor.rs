//! `Extractor`: the narrow interface consumed from the (out-of-scope)
//! V2/V3 package extraction collaborator (spec §6, §9). The installer
//! (§4.10) is a thin dispatcher over two concrete implementations sharing
//! this trait.

use std::path::{Path, PathBuf};

use nuget_schemas::PackageIdentity;

use crate::source_client::{PackageBytes, ProtocolVersion};

#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub protocol_version: ProtocolVersion,
    /// Bypass the "already cached" check (`Options.force`).
    pub force: bool,
}

/// What `install` leaves on disk: enough for the cache file's
/// `expectedPackageFiles` entry and the local metadata provider's
/// completion-marker check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub identity: PackageIdentity,
    /// Path to the sha-hash completion marker file.
    pub hash_file_path: PathBuf,
    /// Paths of every file the package left on disk, relative to
    /// `destination`, forward-slash separated. Feeds the lock file's
    /// `libraries["<id>/<version>"].files` (spec §3).
    pub files: Vec<String>,
}

pub trait Extractor: Send + Sync {
    fn install(
        &self,
        identity: &PackageIdentity,
        bytes: PackageBytes,
        destination: &Path,
        ctx: &ExtractionContext,
    ) -> Result<InstalledPackage, nuget_util::RestoreError>;
}
