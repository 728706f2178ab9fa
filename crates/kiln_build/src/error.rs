//! Errors that abort a build.
//!
//! Per-group compiler failures are not errors here: they are reported in the
//! [`BuildResult`](crate::BuildResult). These variants cover problems that
//! make the whole build meaningless.

use kiln_cache::Fingerprint;
use kiln_common::InternalError;
use kiln_graph::{GraphError, GroupId};
use kiln_toolchain::ToolchainError;

/// A build that could not run or could not finish.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A group needs a compiler version that is not registered. Detected
    /// before any compiler is invoked.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// The unit graph could not be built.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A freshly compiled artifact differs from the one already cached under
    /// the same fingerprint.
    #[error("fingerprint collision for group {group}: {fingerprint} already maps to a different artifact")]
    FingerprintCollision {
        /// The group whose artifact collided.
        group: GroupId,
        /// The contested fingerprint.
        fingerprint: Fingerprint,
    },

    /// The worker pool could not be started.
    #[error("could not start worker pool: {reason}")]
    WorkerPool {
        /// Description of the failure.
        reason: String,
    },

    /// An invariant of the scheduler was broken.
    #[error(transparent)]
    Internal(#[from] InternalError),
}
