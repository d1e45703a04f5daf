//! `LogMessage`: accumulated non-fatal diagnostics that ship into the cache
//! file (spec §3, §7) so a subsequent cache-hit restore can replay them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub code: String,
    pub message: String,
    #[serde(rename = "projectPath")]
    pub project_path: PathBuf,
    #[serde(rename = "libraryID", skip_serializing_if = "Option::is_none", default)]
    pub library_id: Option<String>,
    #[serde(rename = "targetGraphs", skip_serializing_if = "Option::is_none", default)]
    pub target_graphs: Option<Vec<String>>,
}

impl LogMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>, project_path: PathBuf) -> Self {
        LogMessage {
            level: LogLevel::Error,
            code: code.into(),
            message: message.into(),
            project_path,
            library_id: None,
            target_graphs: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, project_path: PathBuf) -> Self {
        LogMessage {
            level: LogLevel::Warning,
            code: code.into(),
            message: message.into(),
            project_path,
            library_id: None,
            target_graphs: None,
        }
    }

    pub fn with_library(mut self, library_id: impl Into<String>) -> Self {
        self.library_id = Some(library_id.into());
        self
    }

    pub fn with_target_graphs(mut self, graphs: Vec<String>) -> Self {
        self.target_graphs = Some(graphs);
        self
    }
}
