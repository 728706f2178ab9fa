//! Orchestrator options.

use std::time::Duration;

/// Knobs for one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of concurrent compiler invocations. `0` means the
    /// available parallelism of the machine.
    pub jobs: usize,
    /// Per-invocation timeout. Overrides the registry's own when set.
    pub timeout: Option<Duration>,
}

impl BuildOptions {
    /// Sets the worker count.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The worker count after resolving `0`.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    }
}
