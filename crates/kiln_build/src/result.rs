//! Build results.

use std::sync::Arc;

use kiln_cache::{Artifact, Fingerprint};
use kiln_config::CompilerVersion;
use kiln_diagnostics::{Diagnostic, DiagnosticSummary};
use kiln_graph::{GroupId, GroupIndex};
use kiln_source::UnitId;
use kiln_toolchain::FailureKind;

/// Terminal status of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStatus {
    /// Compiled, or served from the cache.
    Done {
        /// `true` if no compiler ran for this group in this build.
        cache_hit: bool,
    },
    /// The compiler failed or reported errors.
    Failed {
        /// Why the invocation failed.
        kind: FailureKind,
    },
    /// Not attempted because a dependency failed.
    SkippedDueToDependencyFailure {
        /// The failed group that caused the skip.
        failed_dependency: GroupId,
    },
}

impl GroupStatus {
    /// Returns `true` for [`GroupStatus::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, GroupStatus::Done { .. })
    }
}

/// Everything the build learned about one group.
#[derive(Debug, Clone)]
pub struct GroupReport {
    /// Arena index in the graph the build ran on.
    pub index: GroupIndex,
    /// The group identifier.
    pub id: GroupId,
    /// Units in the group.
    pub units: Vec<UnitId>,
    /// The compiler version the group was bound to.
    pub compiler_version: CompilerVersion,
    /// The group's fingerprint.
    pub fingerprint: Fingerprint,
    /// Terminal status.
    pub status: GroupStatus,
    /// The artifact, present exactly when the status is `Done`.
    pub artifact: Option<Arc<Artifact>>,
    /// Diagnostics attributed to this group.
    pub diagnostics: Vec<Diagnostic>,
}

/// Overall outcome of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Every group is `Done` and no error was reported.
    Succeeded,
    /// At least one group failed or was skipped.
    BuildFailed,
}

/// The result of [`Orchestrator::build`](crate::Orchestrator::build).
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// One report per group, in topological order.
    pub groups: Vec<GroupReport>,
    /// All diagnostics partitioned by severity.
    pub diagnostics: DiagnosticSummary,
    /// Overall outcome.
    pub outcome: BuildOutcome,
    /// Number of compiler invocations this build performed.
    pub invocations: usize,
}

impl BuildResult {
    /// Returns `true` if the build succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Succeeded
    }

    /// Finds the report for the group with the given identifier.
    pub fn group(&self, id: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.id.as_str() == id)
    }

    /// Finds the report for the group containing `unit`.
    pub fn group_of(&self, unit: &str) -> Option<&GroupReport> {
        self.groups
            .iter()
            .find(|g| g.units.iter().any(|u| u.as_str() == unit))
    }

    /// Artifacts of all `Done` groups, in topological order.
    pub fn artifacts(&self) -> impl Iterator<Item = (&GroupReport, &Arc<Artifact>)> {
        self.groups
            .iter()
            .filter_map(|g| g.artifact.as_ref().map(|a| (g, a)))
    }

    /// Number of groups served from the cache.
    pub fn cache_hits(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Done { cache_hit: true })
            .count()
    }

    /// Number of groups that failed.
    pub fn failed_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Failed { .. }))
            .count()
    }

    /// Number of groups skipped because of a failed dependency.
    pub fn skipped_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::SkippedDueToDependencyFailure { .. }))
            .count()
    }
}
