//! Local-first metadata client (spec §4.7): tries the local cache before
//! ever touching a source, and gates every remote call through the
//! resilience layer (§4.4, §4.5).

use std::sync::Arc;

use nuget_resilience::{CancellationToken, HostBreakers, SourceLimiters};
use nuget_schemas::identity::DependencyGroup;
use nuget_schemas::version::PackageVersion;
use nuget_schemas::version_range::VersionRange;
use nuget_util::errors::SourceVersionInfo;

use crate::local_metadata::LocalMetadataProvider;
use crate::source_client::SourceClient;

pub struct ResolvedPackage {
    pub version: PackageVersion,
    pub groups: Vec<DependencyGroup>,
}

/// What `resolve` returns when no source (local or remote) has anything
/// satisfying the range: enough for the walker to build a
/// `package-version-not-found` or `only-prerelease-available` error.
pub struct NotFound {
    pub version_infos: Vec<SourceVersionInfo>,
    /// True if some source had a version that would have satisfied the
    /// range had it allowed pre-release candidates (spec §7's
    /// `only-prerelease-available` distinction).
    pub only_prerelease_available: bool,
}

pub enum ResolveOutcome {
    Found(ResolvedPackage),
    NotFound(NotFound),
}

pub struct LocalFirstMetadataClient {
    local: LocalMetadataProvider,
    sources: Vec<Arc<dyn SourceClient>>,
    breakers: Arc<HostBreakers>,
    limiters: Arc<SourceLimiters>,
    cancel: CancellationToken,
}

impl LocalFirstMetadataClient {
    pub fn new(
        local: LocalMetadataProvider,
        sources: Vec<Arc<dyn SourceClient>>,
        breakers: Arc<HostBreakers>,
        limiters: Arc<SourceLimiters>,
        cancel: CancellationToken,
    ) -> Self {
        LocalFirstMetadataClient {
            local,
            sources,
            breakers,
            limiters,
            cancel,
        }
    }

    /// Resolves `(id, range)`: local cache first, remote sources in
    /// declaration order on miss. The remote client is never touched for a
    /// purely local restore.
    pub fn resolve(&self, id: &str, range: &VersionRange) -> ResolveOutcome {
        if let Some(hit) = self.local.resolve(id, range) {
            // The on-disk version string always parses; it came from a
            // directory name we already validated while resolving it.
            let version = hit.resolved_version.parse().expect("cached version string is well-formed");
            return ResolveOutcome::Found(ResolvedPackage {
                version,
                groups: hit.groups,
            });
        }

        let mut version_infos = Vec::new();
        let mut only_prerelease_available = false;

        for source in &self.sources {
            if self.cancel.is_cancelled() {
                break;
            }
            let limiter = self.limiters.bucket_for(source.source());
            if limiter.wait(&self.cancel).is_err() {
                break;
            }
            let breaker = self.breakers.breaker_for(source.host());
            if breaker.can_execute().is_err() {
                continue;
            }

            let versions: Vec<PackageVersion> = match source.list_versions(id) {
                Ok(raw) => {
                    breaker.record_success();
                    raw.iter().filter_map(|v| v.parse().ok()).collect()
                }
                Err(_) => {
                    breaker.record_failure();
                    continue;
                }
            };

            let stable: Vec<&PackageVersion> = versions.iter().filter(|v| !v.is_pre_release()).collect();
            let match_candidates: Vec<&PackageVersion> = if range.requests_prerelease() {
                versions.iter().collect()
            } else {
                stable
            };

            if let Some(best) = range.best_match(match_candidates.into_iter()) {
                let version = best.clone();
                let version_str = version.to_string();
                return match source.get_metadata(id, &version_str) {
                    Ok(metadata) => {
                        breaker.record_success();
                        ResolveOutcome::Found(ResolvedPackage {
                            version,
                            groups: metadata.dependency_groups,
                        })
                    }
                    Err(_) => {
                        breaker.record_failure();
                        ResolveOutcome::NotFound(NotFound {
                            version_infos,
                            only_prerelease_available: false,
                        })
                    }
                };
            }

            if !range.requests_prerelease() && range.best_match(versions.iter()).is_some() {
                only_prerelease_available = true;
            }

            version_infos.push(SourceVersionInfo {
                source: source.source().to_string(),
                total_count: versions.len(),
                nearest_version: range.nearest(versions.iter()).map(|v| v.to_string()),
            });
        }

        ResolveOutcome::NotFound(NotFound {
            version_infos,
            only_prerelease_available,
        })
    }
}
