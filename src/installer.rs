//! Package installer (spec §4.10): a thin dispatcher over the V2/V3
//! extractors, skipping an already-cached identity unless `force` is set.

use std::path::{Path, PathBuf};

use nuget_schemas::identity::PackageIdentity;
use nuget_util::ident::lower_id;
use nuget_util::errors::RestoreResult;

use crate::extractor::{ExtractionContext, Extractor, InstalledPackage};
use crate::source_client::{PackageBytes, ProtocolVersion};

pub struct PackageInstaller {
    v2_extractor: std::sync::Arc<dyn Extractor>,
    v3_extractor: std::sync::Arc<dyn Extractor>,
}

impl PackageInstaller {
    pub fn new(v2_extractor: std::sync::Arc<dyn Extractor>, v3_extractor: std::sync::Arc<dyn Extractor>) -> Self {
        PackageInstaller {
            v2_extractor,
            v3_extractor,
        }
    }

    /// Installs `identity` under `packages_folder`, or no-ops if the
    /// completion marker is already present and `ctx.force` is false.
    pub fn install(
        &self,
        identity: &PackageIdentity,
        bytes: PackageBytes,
        packages_folder: &Path,
        ctx: &ExtractionContext,
    ) -> RestoreResult<InstalledPackage> {
        let destination = packages_folder.join(identity.lower_path());
        let hash_file_path = sha512_path(&destination, identity);

        if !ctx.force && hash_file_path.exists() {
            return Ok(InstalledPackage {
                identity: identity.clone(),
                files: installed_files(&destination),
                hash_file_path,
            });
        }

        let extractor = match ctx.protocol_version {
            ProtocolVersion::V2 => &self.v2_extractor,
            ProtocolVersion::V3 => &self.v3_extractor,
        };
        extractor.install(identity, bytes, &destination, ctx)
    }
}

fn sha512_path(destination: &Path, identity: &PackageIdentity) -> PathBuf {
    destination.join(format!(
        "{}.{}.nupkg.sha512",
        lower_id(&identity.id),
        identity.version
    ))
}

/// Walks an already-extracted package directory to rebuild its file list.
/// The extractor never runs on the cache-hit path, so this is the only
/// source of `InstalledPackage.files` for a package that was installed on
/// a previous restore.
fn installed_files(destination: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(destination)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(destination)
                .ok()
                .map(|rel| rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuget_schemas::version::PackageVersion;
    use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
    use tempfile::tempdir;

    struct CountingExtractor {
        calls: AtomicUsize,
    }

    impl Extractor for CountingExtractor {
        fn install(
            &self,
            identity: &PackageIdentity,
            _bytes: PackageBytes,
            destination: &Path,
            _ctx: &ExtractionContext,
        ) -> RestoreResult<InstalledPackage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(destination).unwrap();
            let hash_file_path = sha512_path(destination, identity);
            std::fs::write(&hash_file_path, b"hash").unwrap();
            let files = installed_files(destination);
            Ok(InstalledPackage {
                identity: identity.clone(),
                hash_file_path,
                files,
            })
        }
    }

    fn identity() -> PackageIdentity {
        PackageIdentity::new("Newtonsoft.Json", PackageVersion::new(13, 0, 3))
    }

    #[test]
    fn installs_when_no_completion_marker_exists() {
        let dir = tempdir().unwrap();
        let v3 = Arc::new(CountingExtractor { calls: AtomicUsize::new(0) });
        let installer = PackageInstaller::new(v3.clone(), v3.clone());
        let ctx = ExtractionContext {
            protocol_version: ProtocolVersion::V3,
            force: false,
        };
        let installed = installer
            .install(&identity(), PackageBytes(vec![]), dir.path(), &ctx)
            .unwrap();
        assert!(installed.hash_file_path.exists());
        assert_eq!(v3.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn already_cached_identity_is_a_no_op() {
        let dir = tempdir().unwrap();
        let v3 = Arc::new(CountingExtractor { calls: AtomicUsize::new(0) });
        let installer = PackageInstaller::new(v3.clone(), v3.clone());
        let ctx = ExtractionContext {
            protocol_version: ProtocolVersion::V3,
            force: false,
        };
        installer.install(&identity(), PackageBytes(vec![]), dir.path(), &ctx).unwrap();
        installer.install(&identity(), PackageBytes(vec![]), dir.path(), &ctx).unwrap();
        assert_eq!(v3.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn already_cached_identity_reports_its_files_from_disk() {
        let dir = tempdir().unwrap();
        let v3 = Arc::new(CountingExtractor { calls: AtomicUsize::new(0) });
        let installer = PackageInstaller::new(v3.clone(), v3.clone());
        let ctx = ExtractionContext {
            protocol_version: ProtocolVersion::V3,
            force: false,
        };
        let first = installer.install(&identity(), PackageBytes(vec![]), dir.path(), &ctx).unwrap();
        assert!(!first.files.is_empty());
        let second = installer.install(&identity(), PackageBytes(vec![]), dir.path(), &ctx).unwrap();
        assert_eq!(second.files, first.files);
    }

    #[test]
    fn force_bypasses_the_already_cached_check() {
        let dir = tempdir().unwrap();
        let v3 = Arc::new(CountingExtractor { calls: AtomicUsize::new(0) });
        let installer = PackageInstaller::new(v3.clone(), v3.clone());
        let forced_ctx = ExtractionContext {
            protocol_version: ProtocolVersion::V3,
            force: true,
        };
        installer.install(&identity(), PackageBytes(vec![]), dir.path(), &forced_ctx).unwrap();
        installer.install(&identity(), PackageBytes(vec![]), dir.path(), &forced_ctx).unwrap();
        assert_eq!(v3.calls.load(Ordering::SeqCst), 2);
    }
}
