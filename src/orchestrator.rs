//! Restore orchestrator (spec §4.12): the full pipeline, from project
//! model to a saved lock file and cache file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use indexmap::IndexMap;
use itertools::Itertools;
use nuget_resilience::{CancellationToken, CircuitBreakerConfig, HostBreakers, SourceLimiters, TokenBucketConfig};
use nuget_schemas::cache_file::CacheFile;
use nuget_schemas::identity::PackageIdentity;
use nuget_schemas::lock_file::LockFile;
use nuget_schemas::log_message::LogMessage;
use nuget_util::errors::{RestoreError, RestoreResult};
use nuget_util::ident::lower_id;

use crate::cache_file_io;
use crate::extractor::{ExtractionContext, Extractor, InstalledPackage};
use crate::fingerprint::{FingerprintCalculator, FingerprintInputs};
use crate::framework::FrameworkOps;
use crate::installer::PackageInstaller;
use crate::local_metadata::LocalMetadataProvider;
use crate::lock_file_builder::LockFileBuilder;
use crate::metadata_client::LocalFirstMetadataClient;
use crate::options::Options;
use crate::project::ProjectModel;
use crate::source_client::SourceClient;
use crate::tracer::{NullTracer, TraceEvent, Tracer, Verbosity};
use crate::walker::{DependencyWalker, WalkOutcome};

/// Upper bound on concurrent package downloads/installs (spec §5.A: a
/// bounded worker pool, not one thread per package).
const MAX_INSTALL_WORKERS: usize = 8;

pub struct RestoreOutcome {
    pub cache_hit: bool,
    pub success: bool,
    pub direct_packages: Vec<PackageIdentity>,
    pub transitive_packages: Vec<PackageIdentity>,
    pub logs: Vec<LogMessage>,
}

pub struct RestoreOrchestrator {
    sources: Vec<Arc<dyn SourceClient>>,
    v2_extractor: Arc<dyn Extractor>,
    v3_extractor: Arc<dyn Extractor>,
    framework_ops: Arc<dyn FrameworkOps>,
    tracer: Arc<dyn Tracer>,
    breakers: Arc<HostBreakers>,
    limiters: Arc<SourceLimiters>,
    cancel: CancellationToken,
    options: Options,
}

impl RestoreOrchestrator {
    pub fn new(
        sources: Vec<Arc<dyn SourceClient>>,
        v2_extractor: Arc<dyn Extractor>,
        v3_extractor: Arc<dyn Extractor>,
        framework_ops: Arc<dyn FrameworkOps>,
        options: Options,
    ) -> Self {
        RestoreOrchestrator {
            sources,
            v2_extractor,
            v3_extractor,
            framework_ops,
            tracer: Arc::new(NullTracer),
            breakers: Arc::new(HostBreakers::new(CircuitBreakerConfig {
                max_failures: 5,
                open_timeout: std::time::Duration::from_secs(30),
                max_half_open_requests: 1,
            })),
            limiters: Arc::new(SourceLimiters::new(TokenBucketConfig::new(10.0, 10.0, 10.0))),
            cancel: CancellationToken::new(),
            options,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[tracing::instrument(skip(self, project), fields(project = %project.project_name()))]
    pub fn restore(&self, project: &dyn ProjectModel) -> RestoreResult<RestoreOutcome> {
        let obj_dir = self.obj_dir(project);
        let cache_path = obj_dir.join("project.nuget.cache");
        let lock_path = obj_dir.join("project.assets.json");
        let dgspec_path = obj_dir.join("project.nuget.dgspec.json");

        let inputs = FingerprintInputs::discover(
            self.options.sdk_root.as_deref(),
            &dgspec_path,
            project.target_frameworks(),
        );
        let fingerprint = FingerprintCalculator::compute(project, &inputs);
        nuget_util::atomic::write_atomic(&dgspec_path, &fingerprint.canonical_json)?;

        if !self.options.force {
            let (valid, cache) = cache_file_io::is_cache_valid(&cache_path, &fingerprint.hash)?;
            tracing::debug!(hit = valid, hash = %fingerprint.hash, "cache probe");
            self.tracer.trace(
                Verbosity::Normal,
                TraceEvent::CacheProbe {
                    project: project.project_name().to_string(),
                    hit: valid,
                },
            );
            if valid {
                let (direct_packages, transitive_packages) = self.read_packages_from_lock_file(&lock_path);
                return Ok(RestoreOutcome {
                    cache_hit: true,
                    success: true,
                    direct_packages,
                    transitive_packages,
                    logs: cache.logs,
                });
            }
        }

        let local = LocalMetadataProvider::new(self.packages_folder(project));
        let metadata_client = LocalFirstMetadataClient::new(
            local,
            self.sources.clone(),
            Arc::clone(&self.breakers),
            Arc::clone(&self.limiters),
            self.cancel.clone(),
        );
        let walker = DependencyWalker::new(
            &metadata_client,
            self.framework_ops.as_ref(),
            project.project_path().to_path_buf(),
        );

        let mut outcomes: IndexMap<String, WalkOutcome> = IndexMap::new();
        let mut logs: Vec<LogMessage> = Vec::new();
        let mut fatal = false;

        if !self.options.no_dependencies {
            for tfm in project.target_frameworks() {
                tracing::info!(framework = %tfm, "starting dependency walk");
                self.tracer.trace(
                    Verbosity::Normal,
                    TraceEvent::WalkStart { framework: tfm.clone() },
                );
                let outcome = walker.walk(project.package_references(), tfm);
                for error in &outcome.errors {
                    tracing::error!(code = error.stable_code(), %error, "restore error");
                    logs.push(error_to_log(error, project.project_path().to_path_buf()));
                    if is_fatal(error) {
                        fatal = true;
                    }
                }
                for node in outcome.nodes.values() {
                    self.tracer.trace(
                        Verbosity::Detailed,
                        TraceEvent::NodeResolved {
                            identity: node.identity.clone(),
                            direct: node.direct,
                        },
                    );
                }
                outcomes.insert(tfm.clone(), outcome);
            }
        }

        if fatal {
            tracing::warn!("aborting restore after a fatal resolution error");
            let cache = CacheFile {
                version: nuget_schemas::cache_file::CACHE_FILE_VERSION,
                dg_spec_hash: fingerprint.hash,
                success: false,
                project_file_path: project.project_path().to_path_buf(),
                expected_package_files: Vec::new(),
                logs: logs.clone(),
            };
            cache_file_io::save(&cache_path, &cache)?;
            return Ok(RestoreOutcome {
                cache_hit: false,
                success: false,
                direct_packages: Vec::new(),
                transitive_packages: Vec::new(),
                logs,
            });
        }

        let installer = PackageInstaller::new(Arc::clone(&self.v2_extractor), Arc::clone(&self.v3_extractor));

        let all_identities: Vec<PackageIdentity> = outcomes
            .values()
            .flat_map(|o| o.nodes.values().map(|n| n.identity.clone()))
            .sorted_by(|a, b| a.library_key().cmp(&b.library_key()))
            .unique_by(|identity| identity.library_key())
            .collect();

        let packages_folder = self.packages_folder(project);
        let install_results = self.install_all(&installer, &all_identities, &packages_folder);

        let mut expected_package_files = Vec::new();
        let mut library_files: HashMap<String, Vec<String>> = HashMap::new();

        for (identity, result) in all_identities.iter().zip(install_results) {
            let installed_package = result?;
            tracing::debug!(package = %identity.library_key(), "installed package");
            self.tracer.trace(
                Verbosity::Detailed,
                TraceEvent::Install {
                    identity: identity.clone(),
                    skipped: false,
                },
            );
            expected_package_files.push(installed_package.hash_file_path.clone());
            library_files.insert(identity.library_key(), installed_package.files);
        }

        let lock_file = self.build_lock_file(project, &outcomes, &library_files);
        self.save_lock_file(&lock_path, &lock_file)?;
        tracing::info!(path = %lock_path.display(), "wrote lock file");
        self.tracer.trace(
            Verbosity::Normal,
            TraceEvent::ManifestWritten {
                path: lock_path.to_string_lossy().into_owned(),
            },
        );

        let cache = CacheFile {
            version: nuget_schemas::cache_file::CACHE_FILE_VERSION,
            dg_spec_hash: fingerprint.hash,
            success: true,
            project_file_path: project.project_path().to_path_buf(),
            expected_package_files,
            logs: logs.clone(),
        };
        cache_file_io::save(&cache_path, &cache)?;
        tracing::info!(path = %cache_path.display(), "wrote cache file");
        self.tracer.trace(
            Verbosity::Normal,
            TraceEvent::ManifestWritten {
                path: cache_path.to_string_lossy().into_owned(),
            },
        );

        let direct_packages = outcomes
            .values()
            .flat_map(|o| o.direct().map(|n| n.identity.clone()))
            .collect();
        let transitive_packages = outcomes
            .values()
            .flat_map(|o| o.transitive().map(|n| n.identity.clone()))
            .collect();

        Ok(RestoreOutcome {
            cache_hit: false,
            success: true,
            direct_packages,
            transitive_packages,
            logs,
        })
    }

    fn build_lock_file(
        &self,
        project: &dyn ProjectModel,
        outcomes: &IndexMap<String, WalkOutcome>,
        library_files: &HashMap<String, Vec<String>>,
    ) -> LockFile {
        LockFileBuilder::build(project, outcomes, library_files)
    }

    /// Downloads and installs every identity with a bounded pool of worker
    /// threads (spec §5.A), returning one result per `identities` entry in
    /// the same order. Workers pull work off a shared `mpsc` queue and
    /// report back `(index, result)` pairs so the caller can restore the
    /// original ordering despite completion order being nondeterministic.
    fn install_all(
        &self,
        installer: &PackageInstaller,
        identities: &[PackageIdentity],
        packages_folder: &Path,
    ) -> Vec<RestoreResult<InstalledPackage>> {
        if identities.is_empty() {
            return Vec::new();
        }

        let worker_count = MAX_INSTALL_WORKERS.min(identities.len());

        let (work_tx, work_rx) = mpsc::channel::<(usize, &PackageIdentity)>();
        for item in identities.iter().enumerate() {
            work_tx.send(item).expect("receiver is held open by the scope below");
        }
        drop(work_tx);
        let work_rx = Mutex::new(work_rx);

        let (result_tx, result_rx) = mpsc::channel::<(usize, RestoreResult<InstalledPackage>)>();

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let work_rx = &work_rx;
                let result_tx = result_tx.clone();
                scope.spawn(move || loop {
                    let next = work_rx.lock().unwrap().recv();
                    let Ok((index, identity)) = next else { break };
                    let result = if self.cancel.is_cancelled() {
                        Err(RestoreError::Cancelled {
                            reason: self.cancel.reason().unwrap_or_else(|| "restore cancelled".to_string()),
                        })
                    } else {
                        let ctx = ExtractionContext {
                            protocol_version: crate::source_client::ProtocolVersion::V3,
                            force: self.options.force,
                        };
                        self.download(identity)
                            .and_then(|bytes| installer.install(identity, bytes, packages_folder, &ctx))
                    };
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);
        });

        let mut results: Vec<Option<RestoreResult<InstalledPackage>>> = (0..identities.len()).map(|_| None).collect();
        for (index, result) in result_rx {
            results[index] = Some(result);
        }
        results
            .into_iter()
            .map(|r| r.expect("every identity receives exactly one worker result"))
            .collect()
    }

    fn save_lock_file(&self, path: &std::path::Path, lock: &LockFile) -> RestoreResult<()> {
        let json = serde_json::to_vec_pretty(lock).map_err(|e| RestoreError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        nuget_util::atomic::write_atomic(path, &json)
    }

    fn download(&self, identity: &PackageIdentity) -> RestoreResult<crate::source_client::PackageBytes> {
        for source in &self.sources {
            let limiter = self.limiters.bucket_for(source.source());
            limiter.wait(&self.cancel)?;
            let breaker = self.breakers.breaker_for(source.host());
            if breaker.can_execute().is_err() {
                continue;
            }
            match source.download_package(&identity.id, &identity.version.to_string()) {
                Ok(bytes) => {
                    breaker.record_success();
                    return Ok(bytes);
                }
                Err(_) => {
                    breaker.record_failure();
                    continue;
                }
            }
        }
        Err(RestoreError::PackageNotFound {
            id: identity.id.clone(),
            sources: self.sources.iter().map(|s| s.source().to_string()).collect(),
        })
    }

    fn obj_dir(&self, project: &dyn ProjectModel) -> PathBuf {
        project
            .project_path()
            .parent()
            .map(|p| p.join("obj"))
            .unwrap_or_else(|| PathBuf::from("obj"))
    }

    fn packages_folder(&self, project: &dyn ProjectModel) -> PathBuf {
        self.options
            .packages_folder
            .clone()
            .unwrap_or_else(|| project.packages_folder().to_path_buf())
    }

    /// Reconstructs the direct/transitive split from an already-valid lock
    /// file (spec §8's no-op-restore law: a cache hit must report the same
    /// package sets as the walk that produced it, without re-walking).
    fn read_packages_from_lock_file(&self, lock_path: &std::path::Path) -> (Vec<PackageIdentity>, Vec<PackageIdentity>) {
        let Ok(bytes) = std::fs::read(lock_path) else {
            return (Vec::new(), Vec::new());
        };
        let Ok(lock) = serde_json::from_slice::<LockFile>(&bytes) else {
            return (Vec::new(), Vec::new());
        };

        let direct_ids: std::collections::HashSet<String> = lock
            .project_file_dependency_groups
            .get("")
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.split_once(" >= ").map(|(id, _)| lower_id(id)))
            .collect();

        let mut direct = Vec::new();
        let mut transitive = Vec::new();
        for key in lock.libraries.keys() {
            let Some((id, version_str)) = key.rsplit_once('/') else { continue };
            let Ok(version) = version_str.parse() else { continue };
            let identity = PackageIdentity::new(id, version);
            if direct_ids.contains(&lower_id(id)) {
                direct.push(identity);
            } else {
                transitive.push(identity);
            }
        }
        (direct, transitive)
    }
}

fn error_to_log(error: &RestoreError, project_path: PathBuf) -> LogMessage {
    LogMessage::error(error.stable_code(), error.to_string(), project_path)
}

/// A small subset of the error taxonomy aborts the pipeline outright; the
/// rest accumulate as non-fatal logs (spec §7's propagation policy).
fn is_fatal(error: &RestoreError) -> bool {
    matches!(
        error,
        RestoreError::VersionConflict { .. }
            | RestoreError::PackageVersionNotFound { .. }
            | RestoreError::PackageNotFound { .. }
            | RestoreError::OnlyPrereleaseAvailable { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuget_schemas::identity::PackageReference;
    use nuget_util::ident::lower_id;
    use std::path::Path as StdPath;
    use tempfile::tempdir;

    use crate::framework::SimpleFrameworkOps;
    use crate::source_client::{PackageMetadata, ProtocolVersion};

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

    struct PanicExtractor;

    impl Extractor for PanicExtractor {
        fn install(
            &self,
            _identity: &PackageIdentity,
            _bytes: crate::source_client::PackageBytes,
            _destination: &StdPath,
            _ctx: &ExtractionContext,
        ) -> Result<crate::extractor::InstalledPackage, nuget_util::RestoreError> {
            panic!("extractor should not run when every package is already cached");
        }
    }

    struct EmptySource;

    impl SourceClient for EmptySource {
        fn host(&self) -> &str {
            "example.test"
        }
        fn source(&self) -> &str {
            "https://example.test/v3/index.json"
        }
        fn protocol_version(&self) -> ProtocolVersion {
            ProtocolVersion::V3
        }
        fn list_versions(&self, _id: &str) -> Result<Vec<String>, nuget_util::RestoreError> {
            Ok(Vec::new())
        }
        fn get_metadata(&self, _id: &str, _version: &str) -> Result<PackageMetadata, nuget_util::RestoreError> {
            Err(nuget_util::RestoreError::Protocol {
                source_name: self.source().to_string(),
                message: "not found".into(),
            })
        }
        fn download_package(&self, _id: &str, _version: &str) -> Result<crate::source_client::PackageBytes, nuget_util::RestoreError> {
            Err(nuget_util::RestoreError::Protocol {
                source_name: self.source().to_string(),
                message: "not found".into(),
            })
        }
    }

    fn write_fully_cached_package(root: &StdPath, id: &str, version: &str) {
        let dir = root.join(lower_id(id)).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{}.nuspec", lower_id(id))),
            r#"<package><metadata><dependencies></dependencies></metadata></package>"#,
        )
        .unwrap();
        std::fs::write(dir.join(".nupkg.metadata"), "{}").unwrap();
        std::fs::write(dir.join(format!("{}.{}.nupkg.sha512", lower_id(id), version)), "hash").unwrap();
    }

    fn orchestrator_with_no_sources() -> RestoreOrchestrator {
        let panic_extractor: Arc<dyn Extractor> = Arc::new(PanicExtractor);
        RestoreOrchestrator::new(
            Vec::new(),
            Arc::clone(&panic_extractor),
            panic_extractor,
            Arc::new(SimpleFrameworkOps),
            Options::default(),
        )
    }

    #[test]
    fn fresh_restore_of_a_fully_local_package_writes_lock_and_cache_files() {
        let packages = tempdir().unwrap();
        write_fully_cached_package(packages.path(), "A", "1.0.0");

        let project_dir = tempdir().unwrap();
        let project = StubProject {
            path: project_dir.path().join("a.csproj"),
            refs: vec![PackageReference::new("A", "[1.0.0]".parse().unwrap())],
            tfms: vec!["net8.0".to_string()],
            packages_folder: packages.path().to_path_buf(),
        };

        let orchestrator = orchestrator_with_no_sources();
        let outcome = orchestrator.restore(&project).unwrap();

        assert!(outcome.success);
        assert!(!outcome.cache_hit);
        assert_eq!(outcome.direct_packages.len(), 1);
        assert!(project_dir.path().join("obj/project.assets.json").exists());
        assert!(project_dir.path().join("obj/project.nuget.cache").exists());
    }

    #[test]
    fn second_restore_of_an_unchanged_project_is_a_cache_hit() {
        let packages = tempdir().unwrap();
        write_fully_cached_package(packages.path(), "A", "1.0.0");

        let project_dir = tempdir().unwrap();
        let project = StubProject {
            path: project_dir.path().join("a.csproj"),
            refs: vec![PackageReference::new("A", "[1.0.0]".parse().unwrap())],
            tfms: vec!["net8.0".to_string()],
            packages_folder: packages.path().to_path_buf(),
        };

        let orchestrator = orchestrator_with_no_sources();
        orchestrator.restore(&project).unwrap();
        let second = orchestrator.restore(&project).unwrap();

        assert!(second.cache_hit);
        assert!(second.success);
    }

    #[test]
    fn missing_package_with_no_sources_yields_a_failed_but_non_erroring_restore() {
        let packages = tempdir().unwrap();
        let project_dir = tempdir().unwrap();
        let project = StubProject {
            path: project_dir.path().join("a.csproj"),
            refs: vec![PackageReference::new("Nonexistent", "[1.0.0]".parse().unwrap())],
            tfms: vec!["net8.0".to_string()],
            packages_folder: packages.path().to_path_buf(),
        };

        let empty_source: Arc<dyn SourceClient> = Arc::new(EmptySource);
        let panic_extractor: Arc<dyn Extractor> = Arc::new(PanicExtractor);
        let orchestrator = RestoreOrchestrator::new(
            vec![empty_source],
            Arc::clone(&panic_extractor),
            panic_extractor,
            Arc::new(SimpleFrameworkOps),
            Options::default(),
        );

        let outcome = orchestrator.restore(&project).unwrap();
        assert!(!outcome.success);
        assert!(!outcome.logs.is_empty());
        assert!(project_dir.path().join("obj/project.nuget.cache").exists());
        assert!(!project_dir.path().join("obj/project.assets.json").exists());
    }
}
