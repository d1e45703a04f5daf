//! The ordered dependency-graph-spec document (spec §4.2): the canonical
//! JSON representation that gets hashed for the fingerprint. Key order and
//! whitespace are fixed by construction — every map here is either a
//! `BTreeMap` (ordinal-ascending sort, matching spec's explicit sort
//! requirements) or an `IndexMap` (insertion order, used where the spec
//! preserves project-declared order, e.g. per-framework objects).

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn empty_object() -> Map<String, Value> {
    Map::new()
}

#[derive(Debug, Clone, Serialize)]
pub struct DgSpecDocument {
    pub format: u32,
    pub restore: IndexMap<String, Map<String, Value>>,
    pub projects: IndexMap<String, PackageSpec>,
}

impl DgSpecDocument {
    pub fn new(project_path: &str, package_spec: PackageSpec) -> Self {
        let mut restore = IndexMap::new();
        restore.insert(project_path.to_string(), empty_object());
        let mut projects = IndexMap::new();
        projects.insert(project_path.to_string(), package_spec);
        DgSpecDocument {
            format: 1,
            restore,
            projects,
        }
    }

    /// Byte-exact canonical serialization, fed to the FNV-1a 64 hasher.
    /// Compact (no extraneous whitespace); order is controlled entirely by
    /// field declaration order and the map types chosen above.
    pub fn to_canonical_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("DgSpecDocument serialization cannot fail")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageSpec {
    pub version: String,
    pub restore: RestoreMetadata,
    pub frameworks: IndexMap<String, FrameworkSpec>,
}

impl PackageSpec {
    pub fn new(restore: RestoreMetadata, frameworks: IndexMap<String, FrameworkSpec>) -> Self {
        PackageSpec {
            version: "1.0.0".to_string(),
            restore,
            frameworks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreMetadata {
    #[serde(rename = "projectUniqueName")]
    pub project_unique_name: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "projectPath")]
    pub project_path: String,
    #[serde(rename = "packagesPath")]
    pub packages_path: String,
    #[serde(rename = "outputPath")]
    pub output_path: String,
    #[serde(rename = "projectStyle")]
    pub project_style: String,
    #[serde(rename = "fallbackFolders", skip_serializing_if = "Vec::is_empty")]
    pub fallback_folders: Vec<String>,
    #[serde(rename = "configFilePaths", skip_serializing_if = "Vec::is_empty")]
    pub config_file_paths: Vec<String>,
    #[serde(rename = "originalTargetFrameworks")]
    pub original_target_frameworks: Vec<String>,
    pub sources: BTreeMap<String, Map<String, Value>>,
    pub frameworks: IndexMap<String, RestoreFrameworkEntry>,
    #[serde(rename = "warningProperties")]
    pub warning_properties: WarningProperties,
    #[serde(rename = "restoreAuditProperties")]
    pub restore_audit_properties: AuditProperties,
    #[serde(rename = "SdkAnalysisLevel", skip_serializing_if = "Option::is_none")]
    pub sdk_analysis_level: Option<String>,
}

impl RestoreMetadata {
    pub fn sources_map(sources: &[String]) -> BTreeMap<String, Map<String, Value>> {
        sources
            .iter()
            .map(|s| (s.clone(), empty_object()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreFrameworkEntry {
    #[serde(rename = "targetAlias")]
    pub target_alias: String,
    #[serde(rename = "projectReferences")]
    pub project_references: Map<String, Value>,
}

impl RestoreFrameworkEntry {
    pub fn new(target_alias: impl Into<String>) -> Self {
        RestoreFrameworkEntry {
            target_alias: target_alias.into(),
            project_references: empty_object(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WarningProperties {
    #[serde(rename = "warnAsError")]
    pub warn_as_error: Vec<String>,
}

impl Default for WarningProperties {
    fn default() -> Self {
        WarningProperties {
            warn_as_error: vec!["NU1605".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditProperties {
    #[serde(rename = "enableAudit")]
    pub enable_audit: String,
    #[serde(rename = "auditLevel")]
    pub audit_level: String,
    #[serde(rename = "auditMode")]
    pub audit_mode: String,
}

impl Default for AuditProperties {
    fn default() -> Self {
        AuditProperties {
            enable_audit: "true".to_string(),
            audit_level: "low".to_string(),
            audit_mode: "direct".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEntry {
    pub target: String,
    pub version: String,
}

impl DependencyEntry {
    pub fn package(normalized_range: impl Into<String>) -> Self {
        DependencyEntry {
            target: "Package".to_string(),
            version: normalized_range.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadDependencyEntry {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkReferenceEntry {
    #[serde(rename = "privateAssets")]
    pub private_assets: String,
}

impl Default for FrameworkReferenceEntry {
    fn default() -> Self {
        FrameworkReferenceEntry {
            private_assets: "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkSpec {
    #[serde(rename = "targetAlias")]
    pub target_alias: String,
    pub dependencies: BTreeMap<String, DependencyEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<String>>,
    #[serde(rename = "assetTargetFallback", skip_serializing_if = "Option::is_none")]
    pub asset_target_fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn: Option<bool>,
    #[serde(
        rename = "downloadDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub download_dependencies: Option<Vec<DownloadDependencyEntry>>,
    #[serde(
        rename = "frameworkReferences",
        skip_serializing_if = "Option::is_none"
    )]
    pub framework_references: Option<IndexMap<String, FrameworkReferenceEntry>>,
    #[serde(
        rename = "runtimeIdentifierGraphPath",
        skip_serializing_if = "Option::is_none"
    )]
    pub runtime_identifier_graph_path: Option<String>,
}

/// `net6.0`-and-later frameworks get the modern import/fallback block; the
/// classic net-fx fallback list used by `imports` on those frameworks.
pub const NET_FX_FALLBACK_IMPORTS: &[&str] = &[
    "net461", "net462", "net47", "net471", "net472", "net48", "net481",
];

/// True for SDK-style "net5.0"-and-later TFMs, which get `imports`,
/// `assetTargetFallback`, `warn`, and `frameworkReferences` populated.
/// `netcoreapp*`, `netstandard*`, and classic `net4xx` (no dot) TFMs are not
/// modern in this sense.
pub fn is_modern_framework(tfm: &str) -> bool {
    let Some(rest) = tfm.strip_prefix("net") else {
        return false;
    };
    let Some((major_s, minor_s)) = rest.split_once('.') else {
        return false;
    };
    let Ok(major) = major_s.parse::<u32>() else {
        return false;
    };
    if minor_s.parse::<u32>().is_err() {
        return false;
    }
    major >= 5
}

impl FrameworkSpec {
    pub fn new(target_alias: impl Into<String>, dependencies: BTreeMap<String, DependencyEntry>) -> Self {
        FrameworkSpec {
            target_alias: target_alias.into(),
            dependencies,
            imports: None,
            asset_target_fallback: None,
            warn: None,
            download_dependencies: None,
            framework_references: None,
            runtime_identifier_graph_path: None,
        }
    }

    pub fn with_modern_defaults(mut self, runtime_identifier_graph_path: impl Into<String>) -> Self {
        self.imports = Some(NET_FX_FALLBACK_IMPORTS.iter().map(|s| s.to_string()).collect());
        self.asset_target_fallback = Some(true);
        self.warn = Some(true);
        let mut refs = IndexMap::new();
        refs.insert(
            "Microsoft.NETCore.App".to_string(),
            FrameworkReferenceEntry::default(),
        );
        self.framework_references = Some(refs);
        self.runtime_identifier_graph_path = Some(runtime_identifier_graph_path.into());
        self
    }

    pub fn with_download_dependencies(mut self, deps: Vec<DownloadDependencyEntry>) -> Self {
        if !deps.is_empty() {
            let mut sorted = deps;
            sorted.sort_by(|a, b| a.name.cmp(&b.name));
            self.download_dependencies = Some(sorted);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> DgSpecDocument {
        let mut deps = BTreeMap::new();
        deps.insert(
            "Newtonsoft.Json".to_string(),
            DependencyEntry::package("[13.0.3, )"),
        );
        let framework = FrameworkSpec::new("net8.0", deps)
            .with_modern_defaults("/sdk/8.0.100/RuntimeIdentifierGraph.json");
        let mut frameworks = IndexMap::new();
        frameworks.insert("net8.0".to_string(), framework);

        let restore_fw = {
            let mut m = IndexMap::new();
            m.insert(
                "net8.0".to_string(),
                RestoreFrameworkEntry::new("net8.0"),
            );
            m
        };
        let restore = RestoreMetadata {
            project_unique_name: "/proj/a.csproj".into(),
            project_name: "a".into(),
            project_path: "/proj/a.csproj".into(),
            packages_path: "/home/user/.nuget/packages/".into(),
            output_path: "/proj/obj/".into(),
            project_style: "PackageReference".into(),
            fallback_folders: vec![],
            config_file_paths: vec!["/proj/nuget.config".into()],
            original_target_frameworks: vec!["net8.0".into()],
            sources: RestoreMetadata::sources_map(&["https://api.nuget.org/v3/index.json".into()]),
            frameworks: restore_fw,
            warning_properties: WarningProperties::default(),
            restore_audit_properties: AuditProperties::default(),
            sdk_analysis_level: None,
        };
        let package_spec = PackageSpec::new(restore, frameworks);
        DgSpecDocument::new("/proj/a.csproj", package_spec)
    }

    #[test]
    fn top_level_key_order_is_format_restore_projects() {
        let json = sample_doc().to_canonical_json();
        let text = String::from_utf8(json).unwrap();
        let format_idx = text.find("\"format\"").unwrap();
        let restore_idx = text.find("\"restore\"").unwrap();
        let projects_idx = text.find("\"projects\"").unwrap();
        assert!(format_idx < restore_idx);
        assert!(restore_idx < projects_idx);
    }

    #[test]
    fn serialization_is_deterministic_across_calls() {
        let a = sample_doc().to_canonical_json();
        let b = sample_doc().to_canonical_json();
        assert_eq!(a, b);
    }

    #[test]
    fn modern_framework_detection() {
        assert!(is_modern_framework("net8.0"));
        assert!(is_modern_framework("net6.0"));
        assert!(!is_modern_framework("net48"));
        assert!(!is_modern_framework("netstandard2.0"));
        assert!(!is_modern_framework("netcoreapp3.1"));
    }

    #[test]
    fn bare_version_normalizes_with_single_space_after_comma() {
        let entry = DependencyEntry::package("[1.0.0, )");
        assert_eq!(entry.version, "[1.0.0, )");
    }
}
