//! Fixtures shared by the restore engine's integration tests: an
//! in-memory [`ProjectModel`], a fake [`Extractor`], an in-memory
//! [`SourceClient`], and a helper for pre-seeding a local packages
//! folder the way a prior restore would have left it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use nuget_restore_core::extractor::{ExtractionContext, Extractor, InstalledPackage};
use nuget_restore_core::project::ProjectModel;
use nuget_restore_core::source_client::{PackageBytes, PackageMetadata, ProtocolVersion, SourceClient};
use nuget_schemas::identity::{PackageIdentity, PackageReference};
use nuget_util::ident::lower_id;

/// A fully in-memory `ProjectModel`. Every field defaults to empty;
/// chain the `with_*` builders to populate what a test needs.
#[derive(Debug, Clone)]
pub struct FixtureProject {
    pub path: PathBuf,
    pub name: String,
    pub refs: Vec<PackageReference>,
    pub tfms: Vec<String>,
    pub packages_folder: PathBuf,
    pub fallback_folders: Vec<PathBuf>,
    pub sources: Vec<String>,
    pub config_file_paths: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub central_package_management: bool,
}

impl FixtureProject {
    pub fn new(project_dir: impl Into<PathBuf>, packages_folder: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        FixtureProject {
            path: project_dir.join("project.csproj"),
            name: "project".to_string(),
            refs: Vec::new(),
            tfms: vec!["net8.0".to_string()],
            packages_folder: packages_folder.into(),
            fallback_folders: Vec::new(),
            sources: Vec::new(),
            config_file_paths: Vec::new(),
            output_path: project_dir.join("bin"),
            central_package_management: false,
        }
    }

    pub fn with_reference(mut self, reference: PackageReference) -> Self {
        self.refs.push(reference);
        self
    }

    pub fn with_frameworks(mut self, tfms: Vec<&str>) -> Self {
        self.tfms = tfms.into_iter().map(String::from).collect();
        self
    }

    pub fn with_sources(mut self, sources: Vec<&str>) -> Self {
        self.sources = sources.into_iter().map(String::from).collect();
        self
    }
}

impl ProjectModel for FixtureProject {
    fn project_path(&self) -> &Path {
        &self.path
    }
    fn project_name(&self) -> &str {
        &self.name
    }
    fn package_references(&self) -> &[PackageReference] {
        &self.refs
    }
    fn target_frameworks(&self) -> &[String] {
        &self.tfms
    }
    fn is_central_package_management_enabled(&self) -> bool {
        self.central_package_management
    }
    fn packages_folder(&self) -> &Path {
        &self.packages_folder
    }
    fn fallback_folders(&self) -> &[PathBuf] {
        &self.fallback_folders
    }
    fn sources(&self) -> &[String] {
        &self.sources
    }
    fn config_file_paths(&self) -> &[PathBuf] {
        &self.config_file_paths
    }
    fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Writes a completion-marked package into `root` the way a prior,
/// successful install would have left it, so `LocalMetadataProvider`
/// and `PackageInstaller` both see it as already cached.
pub fn seed_local_package(root: &Path, id: &str, version: &str, nuspec_xml: &str) {
    let dir = root.join(lower_id(id)).join(version);
    std::fs::create_dir_all(&dir).expect("create fixture package directory");
    std::fs::write(dir.join(format!("{}.nuspec", lower_id(id))), nuspec_xml).expect("write fixture nuspec");
    std::fs::write(dir.join(".nupkg.metadata"), "{}").expect("write fixture completion marker");
    std::fs::write(
        dir.join(format!("{}.{}.nupkg.sha512", lower_id(id), version)),
        "fixture-hash",
    )
    .expect("write fixture hash file");
}

/// An empty-`<dependencies/>` nuspec, for packages whose own dependency
/// graph is irrelevant to the test.
pub fn leaf_nuspec() -> &'static str {
    r#"<package><metadata><dependencies></dependencies></metadata></package>"#
}

/// A single-group nuspec declaring one dependency under `framework`.
pub fn nuspec_with_dependency(framework: &str, dep_id: &str, dep_version: &str) -> String {
    format!(
        r#"<package><metadata><dependencies>
            <group targetFramework="{framework}"><dependency id="{dep_id}" version="{dep_version}" /></group>
        </dependencies></metadata></package>"#
    )
}

/// An in-memory package: the metadata a `SourceClient::get_metadata` call
/// would return, plus the bytes `download_package` hands to the
/// extractor.
#[derive(Debug, Clone)]
pub struct FixturePackage {
    pub versions: Vec<String>,
    pub dependency_groups_by_version: HashMap<String, Vec<nuget_schemas::identity::DependencyGroup>>,
    pub bytes: Vec<u8>,
}

/// A `SourceClient` backed entirely by an in-memory catalog. Calls never
/// touch the network; `fail_downloads` lets a test simulate a source that
/// resolves metadata but can't serve the archive.
pub struct InMemorySource {
    host: String,
    source: String,
    catalog: HashMap<String, FixturePackage>,
    pub fail_downloads: bool,
    pub call_log: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        InMemorySource {
            host: source.clone(),
            source,
            catalog: HashMap::new(),
            fail_downloads: false,
            call_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_package(mut self, id: &str, package: FixturePackage) -> Self {
        self.catalog.insert(lower_id(id), package);
        self
    }

    fn log(&self, event: impl Into<String>) {
        self.call_log.lock().unwrap().push(event.into());
    }
}

impl SourceClient for InMemorySource {
    fn host(&self) -> &str {
        &self.host
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }

    fn list_versions(&self, id: &str) -> Result<Vec<String>, nuget_util::RestoreError> {
        self.log(format!("list_versions({id})"));
        Ok(self
            .catalog
            .get(&lower_id(id))
            .map(|p| p.versions.clone())
            .unwrap_or_default())
    }

    fn get_metadata(&self, id: &str, version: &str) -> Result<PackageMetadata, nuget_util::RestoreError> {
        self.log(format!("get_metadata({id}, {version})"));
        let package = self.catalog.get(&lower_id(id)).ok_or_else(|| nuget_util::RestoreError::Protocol {
            source_name: self.source.clone(),
            message: format!("unknown package '{id}'"),
        })?;
        let groups = package.dependency_groups_by_version.get(version).cloned().unwrap_or_default();
        Ok(PackageMetadata { dependency_groups: groups })
    }

    fn download_package(&self, id: &str, version: &str) -> Result<PackageBytes, nuget_util::RestoreError> {
        self.log(format!("download_package({id}, {version})"));
        if self.fail_downloads {
            return Err(nuget_util::RestoreError::Protocol {
                source_name: self.source.clone(),
                message: "simulated download failure".to_string(),
            });
        }
        let package = self.catalog.get(&lower_id(id)).ok_or_else(|| nuget_util::RestoreError::Protocol {
            source_name: self.source.clone(),
            message: format!("unknown package '{id}'"),
        })?;
        Ok(PackageBytes(package.bytes.clone()))
    }
}

/// Writes a marker file under `destination` as if it had extracted a real
/// archive there; real V2/V3 extractors do far more, but tests driving
/// the orchestrator only need the completion-marker contract upheld.
pub struct FakeExtractor;

impl Extractor for FakeExtractor {
    fn install(
        &self,
        identity: &PackageIdentity,
        _bytes: PackageBytes,
        destination: &Path,
        _ctx: &ExtractionContext,
    ) -> Result<InstalledPackage, nuget_util::RestoreError> {
        std::fs::create_dir_all(destination).map_err(|e| nuget_util::RestoreError::Io {
            path: destination.to_path_buf(),
            message: e.to_string(),
        })?;
        let hash_file_path = destination.join(format!(
            "{}.{}.nupkg.sha512",
            lower_id(&identity.id),
            identity.version
        ));
        std::fs::write(&hash_file_path, "fake-hash").map_err(|e| nuget_util::RestoreError::Io {
            path: hash_file_path.clone(),
            message: e.to_string(),
        })?;
        let nuspec_name = format!("{}.nuspec", lower_id(&identity.id));
        std::fs::write(destination.join(&nuspec_name), "<package/>").map_err(|e| nuget_util::RestoreError::Io {
            path: destination.join(&nuspec_name),
            message: e.to_string(),
        })?;
        let hash_file_name = hash_file_path
            .file_name()
            .expect("hash file path has a file name")
            .to_string_lossy()
            .into_owned();
        let mut files = vec![hash_file_name, nuspec_name];
        files.sort();
        Ok(InstalledPackage {
            identity: identity.clone(),
            hash_file_path,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn seeded_package_round_trips_through_the_local_metadata_provider() {
        let dir = tempdir().unwrap();
        seed_local_package(dir.path(), "A", "1.0.0", leaf_nuspec());
        let provider = nuget_restore_core::local_metadata::LocalMetadataProvider::new(dir.path());
        let range: nuget_schemas::VersionRange = "[1.0.0]".parse().unwrap();
        assert!(provider.resolve("A", &range).is_some());
    }

    #[test]
    fn fake_extractor_leaves_a_completion_marker_behind() {
        let dir = tempdir().unwrap();
        let identity = PackageIdentity::new("A", "1.0.0".parse().unwrap());
        let ctx = ExtractionContext {
            protocol_version: ProtocolVersion::V3,
            force: false,
        };
        let installed = FakeExtractor
            .install(&identity, PackageBytes(vec![]), dir.path(), &ctx)
            .unwrap();
        assert!(installed.hash_file_path.exists());
    }

    #[test]
    fn in_memory_source_resolves_a_cataloged_version() {
        let source = InMemorySource::new("https://fixture/index.json").with_package(
            "A",
            FixturePackage {
                versions: vec!["1.0.0".to_string()],
                dependency_groups_by_version: HashMap::new(),
                bytes: vec![1, 2, 3],
            },
        );
        assert_eq!(source.list_versions("A").unwrap(), vec!["1.0.0".to_string()]);
        assert_eq!(source.download_package("A", "1.0.0").unwrap().0, vec![1, 2, 3]);
    }
}
