//! Local metadata provider (spec §4.6): resolves `(id, range)` against an
//! already-hydrated packages folder without touching the network.

use std::fs;
use std::path::{Path, PathBuf};

use nuget_schemas::identity::DependencyGroup;
use nuget_schemas::version::PackageVersion;
use nuget_schemas::version_range::VersionRange;
use nuget_util::ident::lower_id;

use crate::nuspec;

/// A resolved local hit: the dependency groups from the cached nuspec and
/// the exact version string that was selected.
pub struct LocalResolution {
    pub groups: Vec<DependencyGroup>,
    pub resolved_version: String,
}

pub struct LocalMetadataProvider {
    packages_folder: PathBuf,
}

impl LocalMetadataProvider {
    pub fn new(packages_folder: impl Into<PathBuf>) -> Self {
        LocalMetadataProvider {
            packages_folder: packages_folder.into(),
        }
    }

    /// Resolves `(id, range)` against the local cache. `None` means "not
    /// cached" — the caller falls through to remote (spec §4.6, §4.7).
    /// Errors reading a cached nuspec are swallowed into `None` rather than
    /// propagated, per spec §4.6's closing rule.
    pub fn resolve(&self, id: &str, range: &VersionRange) -> Option<LocalResolution> {
        let version = self.resolve_version(id, range)?;
        let groups = self.read_nuspec(id, &version).ok()?;
        Some(LocalResolution {
            groups,
            resolved_version: version.to_string(),
        })
    }

    fn resolve_version(&self, id: &str, range: &VersionRange) -> Option<PackageVersion> {
        if let VersionRange::Exact(v) = range {
            return self.has_completion_marker(id, v).then(|| v.clone());
        }
        let candidates = self.cached_versions(id);
        range.best_match(candidates.iter()).cloned()
    }

    /// Every subdirectory name under the id's folder that parses as a
    /// version and carries a completion marker.
    fn cached_versions(&self, id: &str) -> Vec<PackageVersion> {
        let id_dir = self.id_dir(id);
        let Ok(entries) = fs::read_dir(&id_dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let version: PackageVersion = name.parse().ok()?;
                self.has_completion_marker(id, &version).then_some(version)
            })
            .collect()
    }

    fn has_completion_marker(&self, id: &str, version: &PackageVersion) -> bool {
        let dir = self.version_dir(id, version);
        self.nupkg_metadata_path(&dir).exists() || self.nupkg_sha512_path(id, &dir, version).exists()
    }

    fn read_nuspec(&self, id: &str, version: &PackageVersion) -> std::io::Result<Vec<DependencyGroup>> {
        let dir = self.version_dir(id, version);
        let nuspec_path = dir.join(format!("{}.nuspec", lower_id(id)));
        let contents = fs::read(&nuspec_path)?;
        nuspec::parse_dependency_groups(&nuspec_path, contents.as_slice())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    fn id_dir(&self, id: &str) -> PathBuf {
        self.packages_folder.join(lower_id(id))
    }

    fn version_dir(&self, id: &str, version: &PackageVersion) -> PathBuf {
        self.id_dir(id).join(version.normalized())
    }

    fn nupkg_metadata_path(&self, version_dir: &Path) -> PathBuf {
        version_dir.join(".nupkg.metadata")
    }

    fn nupkg_sha512_path(&self, id: &str, version_dir: &Path, version: &PackageVersion) -> PathBuf {
        version_dir.join(format!("{}.{}.nupkg.sha512", lower_id(id), version.normalized()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_cached_package(root: &Path, id: &str, version: &str, nuspec_xml: &str) {
        let dir = root.join(lower_id(id)).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.nuspec", lower_id(id))), nuspec_xml).unwrap();
        fs::write(dir.join(".nupkg.metadata"), "{}").unwrap();
    }

    fn sample_nuspec() -> &'static str {
        r#"<package><metadata><dependencies>
            <group targetFramework="net8.0"><dependency id="A" version="1.0.0" /></group>
        </dependencies></metadata></package>"#
    }

    #[test]
    fn exact_version_without_marker_is_not_cached() {
        let dir = tempdir().unwrap();
        let provider = LocalMetadataProvider::new(dir.path());
        let range: VersionRange = "[13.0.3]".parse().unwrap();
        assert!(provider.resolve("Newtonsoft.Json", &range).is_none());
    }

    #[test]
    fn exact_version_with_marker_resolves() {
        let dir = tempdir().unwrap();
        write_cached_package(dir.path(), "Newtonsoft.Json", "13.0.3", sample_nuspec());
        let provider = LocalMetadataProvider::new(dir.path());
        let range: VersionRange = "[13.0.3]".parse().unwrap();
        let resolved = provider.resolve("Newtonsoft.Json", &range).unwrap();
        assert_eq!(resolved.resolved_version, "13.0.3");
        assert_eq!(resolved.groups.len(), 1);
    }

    #[test]
    fn range_picks_lowest_admissible_cached_version() {
        let dir = tempdir().unwrap();
        write_cached_package(dir.path(), "A", "1.0.0", sample_nuspec());
        write_cached_package(dir.path(), "A", "2.0.0", sample_nuspec());
        let provider = LocalMetadataProvider::new(dir.path());
        let range: VersionRange = "[1.0.0,)".parse().unwrap();
        let resolved = provider.resolve("A", &range).unwrap();
        assert_eq!(resolved.resolved_version, "1.0.0");
    }

    #[test]
    fn uncached_id_directory_is_not_cached() {
        let dir = tempdir().unwrap();
        let provider = LocalMetadataProvider::new(dir.path());
        let range: VersionRange = "1.0.0".parse().unwrap();
        assert!(provider.resolve("Nonexistent", &range).is_none());
    }

    #[test]
    fn case_variant_id_still_resolves() {
        let dir = tempdir().unwrap();
        write_cached_package(dir.path(), "newtonsoft.json", "13.0.3", sample_nuspec());
        let provider = LocalMetadataProvider::new(dir.path());
        let range: VersionRange = "[13.0.3]".parse().unwrap();
        assert!(provider.resolve("Newtonsoft.Json", &range).is_some());
    }

    #[test]
    fn corrupt_nuspec_falls_back_to_not_cached() {
        let dir = tempdir().unwrap();
        write_cached_package(dir.path(), "A", "1.0.0", "<package><metadata>");
        let provider = LocalMetadataProvider::new(dir.path());
        let range: VersionRange = "[1.0.0]".parse().unwrap();
        assert!(provider.resolve("A", &range).is_none());
    }
}
