//! `Options`: the pre-parsed configuration the orchestrator is driven by
//! (spec §6 — "No CLI surface is specified here").

use std::path::PathBuf;

use crate::tracer::Verbosity;

#[derive(Debug, Clone)]
pub struct Options {
    pub sources: Vec<String>,
    pub packages_folder: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    /// Bypass the cache and completion markers.
    pub force: bool,
    /// Disable HTTP caching in the remote client.
    pub no_cache: bool,
    /// Walk roots only; skip transitive resolution.
    pub no_dependencies: bool,
    pub verbosity: Verbosity,
    /// Root of the installed SDK, probed for per-framework ambient inputs
    /// (the runtime-identifier-graph file) that the project itself never
    /// declares. `None` when restoring outside an SDK context (e.g. a
    /// standalone test fixture).
    pub sdk_root: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            sources: Vec::new(),
            packages_folder: None,
            config_file: None,
            force: false,
            no_cache: false,
            no_dependencies: false,
            verbosity: Verbosity::Normal,
            sdk_root: None,
        }
    }
}
