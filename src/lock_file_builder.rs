//! Lock file builder (spec §4.11): assembles `nuget_schemas::LockFile`
//! from the walker's per-framework output.

use std::collections::HashMap;

use indexmap::IndexMap;
use nuget_schemas::lock_file::{LibraryEntry, LockFile, ProjectFrameworkSection, ProjectRestoreSection, ProjectSection};
use serde_json::{Map, Value};

use crate::project::ProjectModel;
use crate::walker::WalkOutcome;

pub struct LockFileBuilder;

impl LockFileBuilder {
    /// `framework_outcomes` holds one walk result per declared target
    /// framework. `library_files` supplies the installed file list for a
    /// library key (`"<Id>/<version>"`); entries with no known files get an
    /// empty list.
    pub fn build(
        project: &dyn ProjectModel,
        framework_outcomes: &IndexMap<String, WalkOutcome>,
        library_files: &HashMap<String, Vec<String>>,
    ) -> LockFile {
        let project_path = project.project_path().to_string_lossy().into_owned();

        let restore = ProjectRestoreSection {
            project_unique_name: project_path.clone(),
            project_name: project.project_name().to_string(),
            project_path: project_path.clone(),
            output_path: project.output_path().to_string_lossy().into_owned(),
            project_style: "PackageReference".to_string(),
        };

        let mut frameworks = IndexMap::new();
        for tfm in project.target_frameworks() {
            let mut dependencies = IndexMap::new();
            for reference in project.package_references() {
                if reference.framework_condition.as_deref().map(|c| c == tfm).unwrap_or(true) {
                    dependencies.insert(reference.id.clone(), reference.range.normalized_for_dgspec());
                }
            }
            frameworks.insert(
                tfm.clone(),
                ProjectFrameworkSection {
                    target_alias: tfm.clone(),
                    dependencies,
                },
            );
        }

        let mut lock = LockFile::new(ProjectSection {
            version: "1.0.0".to_string(),
            restore,
            frameworks,
        });

        if let Some(folder) = project.packages_folder().to_str() {
            lock.package_folders.insert(folder.to_string(), Map::new());
        }

        let mut global_direct: Vec<String> = Vec::new();

        for tfm in project.target_frameworks() {
            lock.targets.insert(tfm.clone(), Map::<String, Value>::new());

            let Some(outcome) = framework_outcomes.get(tfm) else {
                lock.project_file_dependency_groups.insert(tfm.clone(), Vec::new());
                continue;
            };

            let mut direct_entries: Vec<&crate::walker::GraphNode> = outcome.direct().collect();
            direct_entries.sort_by(|a, b| a.identity.id.cmp(&b.identity.id));
            let formatted: Vec<String> = direct_entries
                .iter()
                .map(|n| format!("{} >= {}", n.identity.id, n.identity.version))
                .collect();
            for entry in &formatted {
                if !global_direct.contains(entry) {
                    global_direct.push(entry.clone());
                }
            }
            lock.project_file_dependency_groups.insert(tfm.clone(), formatted);

            for node in outcome.nodes.values() {
                let key = node.identity.library_key();
                lock.libraries.entry(key.clone()).or_insert_with(|| {
                    let files = library_files.get(&key).cloned().unwrap_or_default();
                    LibraryEntry::package(node.identity.lower_path(), files)
                });
            }
        }

        global_direct.sort();
        lock.project_file_dependency_groups.insert(String::new(), global_direct);

        lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::GraphNode;
    use nuget_schemas::identity::{PackageIdentity, PackageReference};
    use nuget_schemas::version::PackageVersion;
    use std::path::{Path as StdPath, PathBuf};

    struct StubProject {
        path: PathBuf,
        refs: Vec<PackageReference>,
        tfms: Vec<String>,
        packages_folder: PathBuf,
    }

    impl ProjectModel for StubProject {
        fn project_path(&self) -> &StdPath {
            &self.path
        }
        fn project_name(&self) -> &str {
            "a"
        }
        fn package_references(&self) -> &[PackageReference] {
            &self.refs
        }
        fn target_frameworks(&self) -> &[String] {
            &self.tfms
        }
        fn is_central_package_management_enabled(&self) -> bool {
            false
        }
        fn packages_folder(&self) -> &StdPath {
            &self.packages_folder
        }
        fn fallback_folders(&self) -> &[PathBuf] {
            &[]
        }
        fn sources(&self) -> &[String] {
            &[]
        }
        fn config_file_paths(&self) -> &[PathBuf] {
            &[]
        }
        fn output_path(&self) -> &StdPath {
            &self.path
        }
    }

    fn outcome_with_one_direct_node() -> IndexMap<String, WalkOutcome> {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "newtonsoft.json".to_string(),
            GraphNode {
                identity: PackageIdentity::new("Newtonsoft.Json", PackageVersion::new(13, 0, 3)),
                direct: true,
                parents: vec![],
            },
        );
        let mut map = IndexMap::new();
        map.insert(
            "net8.0".to_string(),
            WalkOutcome {
                nodes,
                errors: vec![],
            },
        );
        map
    }

    #[test]
    fn direct_dependency_appears_in_both_tfm_group_and_global_key() {
        let project = StubProject {
            path: PathBuf::from("/a.csproj"),
            refs: vec![PackageReference::new(
                "Newtonsoft.Json",
                "[13.0.3]".parse().unwrap(),
            )],
            tfms: vec!["net8.0".to_string()],
            packages_folder: PathBuf::from("/home/user/.nuget/packages"),
        };
        let outcomes = outcome_with_one_direct_node();
        let lock = LockFileBuilder::build(&project, &outcomes, &HashMap::new());

        assert_eq!(
            lock.project_file_dependency_groups["net8.0"],
            vec!["Newtonsoft.Json >= 13.0.3"]
        );
        assert_eq!(
            lock.project_file_dependency_groups[""],
            vec!["Newtonsoft.Json >= 13.0.3"]
        );
        assert!(lock.libraries.contains_key("Newtonsoft.Json/13.0.3"));
        assert_eq!(
            lock.libraries["Newtonsoft.Json/13.0.3"].path,
            "newtonsoft.json/13.0.3"
        );
        assert!(lock.targets.contains_key("net8.0"));
    }

    #[test]
    fn a_declared_framework_with_no_resolved_packages_still_gets_an_empty_target() {
        let project = StubProject {
            path: PathBuf::from("/a.csproj"),
            refs: vec![],
            tfms: vec!["net8.0".to_string()],
            packages_folder: PathBuf::from("/packages"),
        };
        let lock = LockFileBuilder::build(&project, &IndexMap::new(), &HashMap::new());
        assert!(lock.targets.contains_key("net8.0"));
        assert_eq!(lock.project_file_dependency_groups["net8.0"], Vec::<String>::new());
    }
}
