//! Build orchestration for the Kiln engine.
//!
//! [`Orchestrator::build`] takes a [`UnitGraph`](kiln_graph::UnitGraph),
//! resolves every group's toolchain up front, then compiles groups on a
//! bounded worker pool in dependency order, consulting the
//! [`ArtifactCache`](kiln_cache::ArtifactCache) before every invocation. The
//! result enumerates every group's terminal status together with artifacts
//! and diagnostics.

pub mod error;
pub mod options;
pub mod orchestrator;
pub mod result;

pub use error::BuildError;
pub use options::BuildOptions;
pub use orchestrator::Orchestrator;
pub use result::{BuildOutcome, BuildResult, GroupReport, GroupStatus};
