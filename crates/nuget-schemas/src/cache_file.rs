//! `CacheFile` schema (spec §3, §4.9): the restore memo written to
//! `obj/project.nuget.cache`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::log_message::LogMessage;

pub const CACHE_FILE_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub version: u32,
    #[serde(rename = "dgSpecHash")]
    pub dg_spec_hash: String,
    pub success: bool,
    #[serde(rename = "projectFilePath")]
    pub project_file_path: PathBuf,
    #[serde(rename = "expectedPackageFiles")]
    pub expected_package_files: Vec<PathBuf>,
    pub logs: Vec<LogMessage>,
}

impl CacheFile {
    pub fn new(project_file_path: PathBuf) -> Self {
        CacheFile {
            version: CACHE_FILE_VERSION,
            dg_spec_hash: String::new(),
            success: false,
            project_file_path,
            expected_package_files: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// `version == 2 AND success AND dgSpecHash != ""` (spec §4.9).
    pub fn is_valid(&self) -> bool {
        self.version == CACHE_FILE_VERSION && self.success && !self.dg_spec_hash.is_empty()
    }

    /// An all-zeroed, always-invalid cache file, returned by a tolerant
    /// `load()` when the file is missing or unparsable.
    pub fn invalid(project_file_path: PathBuf) -> Self {
        CacheFile {
            version: 0,
            dg_spec_hash: String::new(),
            success: false,
            project_file_path,
            expected_package_files: Vec::new(),
            logs: Vec::new(),
        }
    }
}
