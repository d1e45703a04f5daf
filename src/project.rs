//! `ProjectModel`: the narrow interface consumed from the (out-of-scope)
//! project-file loader collaborator (spec §6).

use std::path::{Path, PathBuf};

use nuget_schemas::PackageReference;

/// Everything the restore engine reads from a loaded project file. The
/// real XML parser producing this is an external collaborator; this crate
/// only depends on the trait.
pub trait ProjectModel {
    fn project_path(&self) -> &Path;
    fn project_name(&self) -> &str;
    fn package_references(&self) -> &[PackageReference];
    /// Declared target frameworks, in project-declaration order.
    fn target_frameworks(&self) -> &[String];
    fn is_central_package_management_enabled(&self) -> bool;
    fn packages_folder(&self) -> &Path;
    fn fallback_folders(&self) -> &[PathBuf];
    /// Package sources after `<clear/>` merge across the config hierarchy,
    /// sorted ordinal-ascending (spec §4.2).
    fn sources(&self) -> &[String];
    /// Config files that contributed to the effective configuration,
    /// existing-files only, sorted ordinal-ascending.
    fn config_file_paths(&self) -> &[PathBuf];
    fn output_path(&self) -> &Path;
}
