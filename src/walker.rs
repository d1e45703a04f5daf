//! Dependency walker (spec §4.8): resolves a transitive graph from
//! declared roots, one framework at a time, partitioning the flattened
//! result into direct and transitive packages.

use std::collections::{HashMap, HashSet};
use std::sync::{mpsc, Mutex};
use std::thread;

use indexmap::IndexMap;
use nuget_schemas::identity::{DependencyGroup, PackageIdentity, PackageReference};
use nuget_schemas::version_range::VersionRange;
use nuget_util::errors::RestoreError;
use nuget_util::ident::lower_id;

use crate::framework::FrameworkOps;
use crate::metadata_client::{LocalFirstMetadataClient, ResolveOutcome};

/// Upper bound on concurrent metadata fetches per level of the walk (spec
/// §5.A: a bounded worker pool, not one thread per package).
const MAX_METADATA_WORKERS: usize = 8;

/// SDK-owned framework references returned alongside package dependencies;
/// filtered out of the restore graph (spec §4.8).
const FRAMEWORK_REFERENCE_IDS: &[&str] = &[
    "Microsoft.NETCore.App",
    "Microsoft.AspNetCore.App",
    "Microsoft.WindowsDesktop.App",
];

fn is_framework_reference(id: &str) -> bool {
    FRAMEWORK_REFERENCE_IDS.iter().any(|r| r.eq_ignore_ascii_case(id))
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub identity: PackageIdentity,
    pub direct: bool,
    pub parents: Vec<String>,
}

pub struct WalkOutcome {
    /// Keyed by lowercase id; iteration order matches first-discovery order.
    pub nodes: IndexMap<String, GraphNode>,
    pub errors: Vec<RestoreError>,
}

impl WalkOutcome {
    pub fn direct(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(|n| n.direct)
    }

    pub fn transitive(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(|n| !n.direct)
    }
}

struct WorkItem {
    id: String,
    constraint: VersionRange,
    parent: Option<String>,
    direct: bool,
}

pub struct DependencyWalker<'a> {
    metadata_client: &'a LocalFirstMetadataClient,
    framework_ops: &'a dyn FrameworkOps,
    project_path: std::path::PathBuf,
}

impl<'a> DependencyWalker<'a> {
    pub fn new(
        metadata_client: &'a LocalFirstMetadataClient,
        framework_ops: &'a dyn FrameworkOps,
        project_path: std::path::PathBuf,
    ) -> Self {
        DependencyWalker {
            metadata_client,
            framework_ops,
            project_path,
        }
    }

    /// Walks level by level instead of one item at a time: every package
    /// newly seen at the current depth is resolved concurrently (spec
    /// §5.A), then their children become the next level. Merging a
    /// level's results back into `nodes` stays single-threaded so two
    /// roots resolving to the same id (e.g. case-variant spellings) merge
    /// deterministically instead of racing to insert the node twice.
    pub fn walk(&self, roots: &[PackageReference], framework: &str) -> WalkOutcome {
        let mut roots: Vec<&PackageReference> = roots.iter().collect();
        roots.sort_by(|a, b| a.id.cmp(&b.id));

        let mut frontier: Vec<WorkItem> = roots
            .iter()
            .map(|r| WorkItem {
                id: r.id.clone(),
                constraint: r.range.clone(),
                parent: None,
                direct: true,
            })
            .collect();

        let mut nodes: IndexMap<String, GraphNode> = IndexMap::new();
        let mut constraints: HashMap<String, Vec<VersionRange>> = HashMap::new();
        let mut errors = Vec::new();

        while !frontier.is_empty() {
            for item in &frontier {
                constraints.entry(lower_id(&item.id)).or_default().push(item.constraint.clone());
            }

            let mut seen_keys: HashSet<String> = HashSet::new();
            let mut batch_keys: Vec<String> = Vec::new();
            let mut batch_ids: Vec<&str> = Vec::new();
            let mut batch_constraints: Vec<&VersionRange> = Vec::new();
            for item in &frontier {
                let key = lower_id(&item.id);
                if nodes.contains_key(&key) || !seen_keys.insert(key.clone()) {
                    continue;
                }
                batch_keys.push(key);
                batch_ids.push(item.id.as_str());
                batch_constraints.push(&item.constraint);
            }

            let resolved = self.resolve_batch(&batch_ids, &batch_constraints);
            let mut resolved_by_key: HashMap<String, ResolveOutcome> = batch_keys.into_iter().zip(resolved).collect();
            let mut failed_keys: HashSet<String> = HashSet::new();

            let mut next_frontier = Vec::new();
            for item in frontier.drain(..) {
                let key = lower_id(&item.id);

                if let Some(existing) = nodes.get_mut(&key) {
                    if item.constraint.contains(&existing.identity.version) {
                        if let Some(parent) = &item.parent {
                            if !existing.parents.contains(parent) {
                                existing.parents.push(parent.clone());
                            }
                        }
                        existing.direct = existing.direct || item.direct;
                    }
                    // Constraint mismatch against the already-resolved
                    // version; deferred to the post-walk conflict pass.
                    continue;
                }

                if failed_keys.contains(&key) {
                    continue;
                }

                match resolved_by_key.remove(&key) {
                    Some(ResolveOutcome::Found(found)) => {
                        let identity = PackageIdentity::new(item.id.clone(), found.version);
                        let mut parents = Vec::new();
                        if let Some(parent) = &item.parent {
                            parents.push(parent.clone());
                        }
                        nodes.insert(
                            key.clone(),
                            GraphNode {
                                identity,
                                direct: item.direct,
                                parents,
                            },
                        );

                        for dep in self.select_dependencies(&found.groups, framework) {
                            if is_framework_reference(&dep.id) {
                                continue;
                            }
                            let Ok(range) = dep.range.parse::<VersionRange>() else {
                                continue;
                            };
                            next_frontier.push(WorkItem {
                                id: dep.id.clone(),
                                constraint: range,
                                parent: Some(item.id.clone()),
                                direct: false,
                            });
                        }
                    }
                    Some(ResolveOutcome::NotFound(not_found)) => {
                        errors.push(self.not_found_error(&item.id, &item.constraint, not_found));
                        failed_keys.insert(key);
                    }
                    None => {
                        // Same key already failed earlier in this level;
                        // the first occurrence's error already covers it.
                    }
                }
            }

            frontier = next_frontier;
        }

        self.resolve_conflicts(&mut nodes, &constraints, &mut errors);

        WalkOutcome { nodes, errors }
    }

    /// Resolves every distinct `(id, constraint)` pair in a level with a
    /// bounded pool of worker threads, returning one outcome per input in
    /// the same order.
    fn resolve_batch(&self, ids: &[&str], constraints: &[&VersionRange]) -> Vec<ResolveOutcome> {
        if ids.is_empty() {
            return Vec::new();
        }

        let worker_count = MAX_METADATA_WORKERS.min(ids.len());

        let (work_tx, work_rx) = mpsc::channel::<(usize, &str, &VersionRange)>();
        for (index, (id, constraint)) in ids.iter().zip(constraints.iter()).enumerate() {
            work_tx.send((index, *id, *constraint)).expect("receiver is held open by the scope below");
        }
        drop(work_tx);
        let work_rx = Mutex::new(work_rx);

        let (result_tx, result_rx) = mpsc::channel::<(usize, ResolveOutcome)>();

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let work_rx = &work_rx;
                let result_tx = result_tx.clone();
                scope.spawn(move || loop {
                    let next = work_rx.lock().unwrap().recv();
                    let Ok((index, id, constraint)) = next else { break };
                    let outcome = self.metadata_client.resolve(id, constraint);
                    if result_tx.send((index, outcome)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);
        });

        let mut results: Vec<Option<ResolveOutcome>> = (0..ids.len()).map(|_| None).collect();
        for (index, outcome) in result_rx {
            results[index] = Some(outcome);
        }
        results
            .into_iter()
            .map(|r| r.expect("every request receives exactly one worker result"))
            .collect()
    }

    /// Picks the dependency group for `framework`: exact match, else the
    /// nearest compatible group via the framework module, else `any`, else
    /// empty (spec §4.8 step 2c).
    fn select_dependencies<'g>(&self, groups: &'g [DependencyGroup], framework: &str) -> &'g [nuget_schemas::identity::PackageDependency] {
        if let Some(exact) = groups.iter().find(|g| g.target_framework == framework) {
            return &exact.dependencies;
        }
        let candidate_tfms: Vec<&str> = groups
            .iter()
            .filter(|g| !g.is_any())
            .map(|g| g.target_framework.as_str())
            .collect();
        if let Some(nearest) = self.framework_ops.reduce(&candidate_tfms, framework) {
            if let Some(group) = groups.iter().find(|g| g.target_framework == nearest) {
                return &group.dependencies;
            }
        }
        if let Some(any) = groups.iter().find(|g| g.is_any()) {
            return &any.dependencies;
        }
        &[]
    }

    /// Reconciles ids whose constraints diverged during the walk (spec
    /// §4.8 step 3): the already-resolved version survives if it satisfies
    /// every constraint seen; otherwise the walker narrows to the
    /// intersection and re-resolves once, emitting `version-conflict` if
    /// that fails too.
    fn resolve_conflicts(
        &self,
        nodes: &mut IndexMap<String, GraphNode>,
        constraints: &HashMap<String, Vec<VersionRange>>,
        errors: &mut Vec<RestoreError>,
    ) {
        for (key, ranges) in constraints {
            if ranges.len() < 2 {
                continue;
            }
            let Some(node) = nodes.get(key) else { continue };
            if ranges.iter().all(|r| r.contains(&node.identity.version)) {
                continue;
            }

            let intersection = ranges
                .iter()
                .skip(1)
                .try_fold(ranges[0].clone(), |acc, r| acc.intersect(r));

            let id = node.identity.id.clone();
            match intersection {
                None => {
                    errors.push(RestoreError::VersionConflict {
                        id,
                        constraints: ranges.iter().map(|r| r.display_constraint()).collect(),
                    });
                    nodes.shift_remove(key);
                }
                Some(narrowed) => match self.metadata_client.resolve(&id, &narrowed) {
                    ResolveOutcome::Found(found) => {
                        if let Some(node) = nodes.get_mut(key) {
                            node.identity = PackageIdentity::new(id, found.version);
                        }
                    }
                    ResolveOutcome::NotFound(_) => {
                        errors.push(RestoreError::VersionConflict {
                            id,
                            constraints: ranges.iter().map(|r| r.display_constraint()).collect(),
                        });
                        nodes.shift_remove(key);
                    }
                },
            }
        }
    }

    fn not_found_error(
        &self,
        id: &str,
        constraint: &VersionRange,
        not_found: crate::metadata_client::NotFound,
    ) -> RestoreError {
        let crate::metadata_client::NotFound {
            version_infos,
            only_prerelease_available,
        } = not_found;
        if only_prerelease_available {
            RestoreError::OnlyPrereleaseAvailable {
                project_path: self.project_path.clone(),
                id: id.to_string(),
                constraint: constraint.display_constraint(),
                version_infos,
            }
        } else {
            RestoreError::PackageVersionNotFound {
                project_path: self.project_path.clone(),
                id: id.to_string(),
                constraint: constraint.display_constraint(),
                version_infos,
            }
        }
    }
}
