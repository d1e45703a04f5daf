//! Diagnostic tracer (spec §4.13): pluggable hooks for verbose output,
//! no-op by default. Deliberately independent of the `tracing` backend
//! (see SPEC_FULL.md §1.A) — this is the verbosity-gated, human-facing
//! counterpart, not the structured-logging one.

use nuget_schemas::PackageIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Minimal,
    Normal,
    Detailed,
    Diagnostic,
}

#[derive(Debug, Clone)]
pub enum TraceEvent {
    CacheProbe { project: String, hit: bool },
    WalkStart { framework: String },
    NodeResolved { identity: PackageIdentity, direct: bool },
    Install { identity: PackageIdentity, skipped: bool },
    ManifestWritten { path: String },
}

pub trait Tracer: Send + Sync {
    fn trace(&self, verbosity: Verbosity, event: TraceEvent);
}

/// Default tracer: every event is discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn trace(&self, _verbosity: Verbosity, _event: TraceEvent) {}
}

/// Records every event it receives; used by tests that assert on pipeline
/// progress without parsing console output.
#[derive(Default)]
pub struct CollectingTracer {
    events: std::sync::Mutex<Vec<(Verbosity, String)>>,
}

impl CollectingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Verbosity, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl Tracer for CollectingTracer {
    fn trace(&self, verbosity: Verbosity, event: TraceEvent) {
        let label = match event {
            TraceEvent::CacheProbe { project, hit } => format!("cache_probe({project}, hit={hit})"),
            TraceEvent::WalkStart { framework } => format!("walk_start({framework})"),
            TraceEvent::NodeResolved { identity, direct } => {
                format!("node_resolved({}, direct={direct})", identity.library_key())
            }
            TraceEvent::Install { identity, skipped } => {
                format!("install({}, skipped={skipped})", identity.library_key())
            }
            TraceEvent::ManifestWritten { path } => format!("manifest_written({path})"),
        };
        self.events.lock().unwrap().push((verbosity, label));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_tracer_discards_everything() {
        let tracer = NullTracer;
        tracer.trace(
            Verbosity::Diagnostic,
            TraceEvent::WalkStart {
                framework: "net8.0".into(),
            },
        );
    }

    #[test]
    fn collecting_tracer_records_events_in_order() {
        let tracer = CollectingTracer::new();
        tracer.trace(Verbosity::Normal, TraceEvent::WalkStart { framework: "net8.0".into() });
        tracer.trace(
            Verbosity::Normal,
            TraceEvent::ManifestWritten {
                path: "/obj/project.assets.json".into(),
            },
        );
        let events = tracer.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].1.starts_with("walk_start"));
        assert!(events[1].1.starts_with("manifest_written"));
    }
}
