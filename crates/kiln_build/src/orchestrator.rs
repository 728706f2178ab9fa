//! The build orchestrator.
//!
//! Scheduling follows a ready queue seeded with groups that have no
//! dependencies. The calling thread owns all bookkeeping: it hands ready
//! groups to the worker pool and receives completions over a channel, so no
//! scheduler state is shared between threads. A group becomes ready once
//! every dependency has completed successfully. When a group fails, every
//! group that transitively depends on it is marked skipped and never
//! becomes ready.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use kiln_cache::{
    fingerprint_graph, Artifact, ArtifactCache, ComputeError, EntryOrigin, Fingerprint, Resolution,
};
use kiln_common::InternalError;
use kiln_config::SettingsAssignment;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSummary};
use kiln_graph::{GroupIndex, UnitGraph, UnitGroup};
use kiln_source::UnitSet;
use kiln_toolchain::{CompilerFailure, CompilerHandle, ToolchainRegistry};

use crate::error::BuildError;
use crate::options::BuildOptions;
use crate::result::{BuildOutcome, BuildResult, GroupReport, GroupStatus};

/// What a worker reports back for one group.
enum Completion {
    Done {
        artifact: Arc<Artifact>,
        cache_hit: bool,
    },
    Failed(CompilerFailure),
    Collision(Fingerprint),
}

/// Terminal state recorded by the scheduler.
enum Terminal {
    Done {
        artifact: Arc<Artifact>,
        cache_hit: bool,
    },
    Failed(CompilerFailure),
    Skipped {
        failed_dependency: GroupIndex,
    },
}

/// Drives builds against a registry and a cache.
///
/// Holds both by reference; neither is mutated beyond the cache's own
/// interior bookkeeping. One orchestrator can run any number of builds.
pub struct Orchestrator<'a> {
    registry: &'a ToolchainRegistry,
    cache: &'a ArtifactCache,
    options: BuildOptions,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator.
    pub fn new(registry: &'a ToolchainRegistry, cache: &'a ArtifactCache, options: BuildOptions) -> Self {
        Self {
            registry,
            cache,
            options,
        }
    }

    /// Groups `units` under `assignment` and builds the result.
    pub fn build_units(
        &self,
        units: UnitSet,
        assignment: &SettingsAssignment,
    ) -> Result<BuildResult, BuildError> {
        let graph = UnitGraph::build(units, assignment)?;
        self.build(&graph)
    }

    /// Builds every group of `graph`.
    ///
    /// Fails before invoking anything if a group's compiler version is not
    /// registered. Per-group compiler failures do not abort the build; they
    /// show up as `Failed` groups in the result. A fingerprint collision
    /// does abort it, after in-flight work finishes.
    pub fn build(&self, graph: &UnitGraph) -> Result<BuildResult, BuildError> {
        let started = Instant::now();
        let groups = graph.groups();

        let handles = groups
            .iter()
            .map(|g| self.registry.resolve(g.settings().compiler_version()))
            .collect::<Result<Vec<_>, _>>()?;
        let fingerprints = fingerprint_graph(graph);
        let _pins: Vec<_> = fingerprints.iter().map(|fp| self.cache.pin(*fp)).collect();

        let jobs = self.options.effective_jobs();
        tracing::info!(groups = groups.len(), jobs, "starting build");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("kiln-build-{i}"))
            .build()
            .map_err(|e| BuildError::WorkerPool {
                reason: e.to_string(),
            })?;

        let invocations = AtomicUsize::new(0);
        let mut terminals: Vec<Option<Terminal>> = groups.iter().map(|_| None).collect();
        let mut remaining: Vec<usize> = groups.iter().map(|g| g.dependencies().len()).collect();
        let mut ready: BTreeSet<GroupIndex> = groups
            .iter()
            .filter(|g| g.dependencies().is_empty())
            .map(UnitGroup::index)
            .collect();
        let mut collision: Option<(GroupIndex, Fingerprint)> = None;

        let (tx, rx) = mpsc::channel::<(GroupIndex, Completion)>();

        pool.in_place_scope(|scope| {
            let mut running = 0usize;
            loop {
                if collision.is_none() {
                    while let Some(index) = ready.pop_first() {
                        let group = graph.group(index);
                        let handle = &handles[index.index()];
                        let fp = fingerprints[index.index()];
                        let tx = tx.clone();
                        let invocations = &invocations;
                        running += 1;
                        tracing::debug!(group = %group.id(), fingerprint = %fp, "scheduling group");
                        scope.spawn(move |_| {
                            // A panicking job would never report back and stall the loop.
                            let completion = panic::catch_unwind(AssertUnwindSafe(|| {
                                self.compile_group(graph, group, handle, fp, invocations)
                            }))
                            .unwrap_or_else(|_| {
                                Completion::Failed(CompilerFailure::process_error("build worker panicked"))
                            });
                            let _ = tx.send((index, completion));
                        });
                    }
                }
                if running == 0 {
                    break;
                }
                let Ok((index, completion)) = rx.recv() else {
                    break;
                };
                running -= 1;

                match completion {
                    Completion::Done {
                        artifact,
                        cache_hit,
                    } => {
                        terminals[index.index()] = Some(Terminal::Done {
                            artifact,
                            cache_hit,
                        });
                        for &dependent in graph.group(index).dependents() {
                            let count = &mut remaining[dependent.index()];
                            *count -= 1;
                            if *count == 0 && terminals[dependent.index()].is_none() {
                                ready.insert(dependent);
                            }
                        }
                    }
                    Completion::Failed(failure) => {
                        tracing::debug!(group = %graph.group(index).id(), %failure, "group failed");
                        terminals[index.index()] = Some(Terminal::Failed(failure));
                        for dependent in graph.transitive_dependents(index) {
                            let slot = &mut terminals[dependent.index()];
                            if slot.is_none() {
                                *slot = Some(Terminal::Skipped {
                                    failed_dependency: index,
                                });
                            }
                        }
                    }
                    Completion::Collision(fp) => {
                        tracing::error!(group = %graph.group(index).id(), fingerprint = %fp, "fingerprint collision");
                        if collision.is_none() {
                            collision = Some((index, fp));
                        }
                    }
                }
            }
        });

        if let Some((index, fingerprint)) = collision {
            return Err(BuildError::FingerprintCollision {
                group: graph.group(index).id().clone(),
                fingerprint,
            });
        }

        let result = assemble(
            graph,
            &handles,
            &fingerprints,
            terminals,
            invocations.load(Ordering::SeqCst),
        )?;
        tracing::info!(
            outcome = ?result.outcome,
            done = result.groups.iter().filter(|g| g.status.is_done()).count(),
            cache_hits = result.cache_hits(),
            failed = result.failed_count(),
            skipped = result.skipped_count(),
            invocations = result.invocations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );
        Ok(result)
    }

    /// Resolves one group through the cache, invoking its compiler on a miss.
    fn compile_group(
        &self,
        graph: &UnitGraph,
        group: &UnitGroup,
        handle: &CompilerHandle,
        fp: Fingerprint,
        invocations: &AtomicUsize,
    ) -> Completion {
        let origin = EntryOrigin::new(group.id().as_str(), handle.version().to_string());
        let result = self.cache.get_or_compute(fp, &origin, || {
            invocations.fetch_add(1, Ordering::SeqCst);
            self.registry
                .invoke_with_timeout(handle, graph, group, self.timeout())
        });
        match result {
            Ok(resolved) => Completion::Done {
                artifact: resolved.artifact,
                cache_hit: resolved.resolution != Resolution::Computed,
            },
            Err(ComputeError::Failed(failure)) => Completion::Failed(failure),
            Err(ComputeError::Collision { fingerprint }) => Completion::Collision(fingerprint),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.options.timeout.or_else(|| self.registry.timeout())
    }
}

/// Turns the scheduler's terminal states into reports.
fn assemble(
    graph: &UnitGraph,
    handles: &[CompilerHandle],
    fingerprints: &[Fingerprint],
    terminals: Vec<Option<Terminal>>,
    invocations: usize,
) -> Result<BuildResult, BuildError> {
    let mut reports = Vec::with_capacity(terminals.len());
    let mut summary = DiagnosticSummary::default();

    for (group, terminal) in graph.groups().iter().zip(terminals) {
        let terminal = terminal.ok_or_else(|| {
            InternalError::new(format!("group {} never reached a terminal state", group.id()))
        })?;
        let (status, artifact, diagnostics) = match terminal {
            Terminal::Done {
                artifact,
                cache_hit,
            } => {
                let diagnostics = artifact.diagnostics.clone();
                (GroupStatus::Done { cache_hit }, Some(artifact), diagnostics)
            }
            Terminal::Failed(failure) => {
                let kind = failure.kind;
                let diagnostics = failure
                    .into_diagnostics()
                    .into_iter()
                    .map(|d| match d.unit {
                        Some(_) => d,
                        None => d.with_note(format!("while compiling group {}", group.id())),
                    })
                    .collect();
                (GroupStatus::Failed { kind }, None, diagnostics)
            }
            Terminal::Skipped { failed_dependency } => {
                let failed = graph.group(failed_dependency).id().clone();
                let diagnostic = Diagnostic::warning(
                    DiagnosticCode::SKIPPED_GROUP,
                    format!("skipped {} because dependency {failed} failed", group.id()),
                );
                (
                    GroupStatus::SkippedDueToDependencyFailure {
                        failed_dependency: failed,
                    },
                    None,
                    vec![diagnostic],
                )
            }
        };

        for diagnostic in &diagnostics {
            summary.push(diagnostic.clone());
        }
        let index = group.index().index();
        reports.push(GroupReport {
            index: group.index(),
            id: group.id().clone(),
            units: group.unit_ids().cloned().collect(),
            compiler_version: handles[index].version().clone(),
            fingerprint: fingerprints[index],
            status,
            artifact,
            diagnostics,
        });
    }

    let outcome = if summary.has_errors() || reports.iter().any(|r| !r.status.is_done()) {
        BuildOutcome::BuildFailed
    } else {
        BuildOutcome::Succeeded
    };
    Ok(BuildResult {
        groups: reports,
        diagnostics: summary,
        outcome,
        invocations,
    })
}
