//! `LockFile` schema (spec §3, §4.11): the downstream-consumed manifest
//! written to `obj/project.assets.json`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LOCK_FILE_VERSION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,
    pub targets: IndexMap<String, Map<String, Value>>,
    pub libraries: IndexMap<String, LibraryEntry>,
    #[serde(rename = "projectFileDependencyGroups")]
    pub project_file_dependency_groups: IndexMap<String, Vec<String>>,
    #[serde(rename = "packageFolders")]
    pub package_folders: IndexMap<String, Map<String, Value>>,
    pub project: ProjectSection,
}

impl LockFile {
    pub fn new(project: ProjectSection) -> Self {
        LockFile {
            version: LOCK_FILE_VERSION,
            targets: IndexMap::new(),
            libraries: IndexMap::new(),
            project_file_dependency_groups: IndexMap::new(),
            package_folders: IndexMap::new(),
            project,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub files: Vec<String>,
}

impl LibraryEntry {
    pub fn package(path: String, files: Vec<String>) -> Self {
        LibraryEntry {
            kind: "package".to_string(),
            path,
            files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    pub version: String,
    pub restore: ProjectRestoreSection,
    pub frameworks: IndexMap<String, ProjectFrameworkSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRestoreSection {
    #[serde(rename = "projectUniqueName")]
    pub project_unique_name: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "projectPath")]
    pub project_path: String,
    #[serde(rename = "outputPath")]
    pub output_path: String,
    #[serde(rename = "projectStyle")]
    pub project_style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFrameworkSection {
    #[serde(rename = "targetAlias")]
    pub target_alias: String,
    pub dependencies: IndexMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut lock = LockFile::new(ProjectSection {
            version: "1.0.0".into(),
            restore: ProjectRestoreSection {
                project_unique_name: "/a.csproj".into(),
                project_name: "a".into(),
                project_path: "/a.csproj".into(),
                output_path: "/obj".into(),
                project_style: "PackageReference".into(),
            },
            frameworks: IndexMap::new(),
        });
        lock.libraries.insert(
            "Newtonsoft.Json/13.0.3".into(),
            LibraryEntry::package("newtonsoft.json/13.0.3".into(), vec!["lib/net6.0/x.dll".into()]),
        );
        let json = serde_json::to_string(&lock).unwrap();
        let back: LockFile = serde_json::from_str(&json).unwrap();
        assert_eq!(lock, back);
    }
}
