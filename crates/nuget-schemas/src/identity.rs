//! `PackageIdentity`, `PackageReference`, `DependencyGroup` and
//! `PackageDependency` (spec §3).

use serde::{Deserialize, Serialize};

use crate::version::PackageVersion;
use crate::version_range::VersionRange;

/// `(id: case-insensitive name, version)`. Case is preserved for display
/// and manifest output; comparisons elsewhere use
/// `nuget_util::ident::ids_eq` / lowercased keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    pub id: String,
    pub version: PackageVersion,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        PackageIdentity {
            id: id.into(),
            version,
        }
    }

    /// `"<id-lower>/<version>"`, the relative on-disk/cache-key form.
    pub fn lower_path(&self) -> String {
        format!("{}/{}", nuget_util::ident::lower_id(&self.id), self.version)
    }

    /// `"<Id>/<version>"`, case preserved, the lock file `libraries` key.
    pub fn library_key(&self) -> String {
        format!("{}/{}", self.id, self.version)
    }
}

/// A declared root dependency from the project model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub id: String,
    pub range: VersionRange,
    pub framework_condition: Option<String>,
}

impl PackageReference {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        PackageReference {
            id: id.into(),
            range,
            framework_condition: None,
        }
    }

    pub fn with_framework_condition(mut self, tfm: impl Into<String>) -> Self {
        self.framework_condition = Some(tfm.into());
        self
    }
}

/// One dependency entry inside a `DependencyGroup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub id: String,
    pub range: VersionRangeString,
}

/// Wire representation of a `VersionRange`: always the parseable string
/// form, never the parsed tagged-variant form, matching the nuspec/dg-spec
/// wire format.
pub type VersionRangeString = String;

/// `(target-framework | "any", dependencies)` — one group from a nuspec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub target_framework: String,
    pub dependencies: Vec<PackageDependency>,
}

impl DependencyGroup {
    pub const ANY: &'static str = "any";

    pub fn is_any(&self) -> bool {
        self.target_framework == Self::ANY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_path_lowercases_only_the_id() {
        let id = PackageIdentity::new("Newtonsoft.Json", "13.0.3".parse().unwrap());
        assert_eq!(id.lower_path(), "newtonsoft.json/13.0.3");
        assert_eq!(id.library_key(), "Newtonsoft.Json/13.0.3");
    }
}
