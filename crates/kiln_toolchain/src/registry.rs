//! Version-to-compiler registry and the invocation wrapper.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use kiln_config::CompilerVersion;
use kiln_graph::{UnitGraph, UnitGroup};

use crate::compiler::{Compiler, CompilerHandle, CompilerInput, CompilerOutput};
use crate::failure::{CompilerFailure, FailureKind};

/// Errors from toolchain resolution.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// No compiler is registered for the requested version.
    #[error("no toolchain registered for compiler version {version} (available: {})", list(.available))]
    UnknownToolchain {
        /// The requested version.
        version: CompilerVersion,
        /// Versions that are registered.
        available: Vec<CompilerVersion>,
    },
}

fn list(versions: &[CompilerVersion]) -> String {
    if versions.is_empty() {
        return "none".to_string();
    }
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Maps compiler versions to invokable compilers.
///
/// Several versions may be registered at once; each group in a build is
/// bound to exactly one of them through its settings.
#[derive(Clone, Default)]
pub struct ToolchainRegistry {
    compilers: BTreeMap<CompilerVersion, Arc<dyn Compiler>>,
    timeout: Option<Duration>,
}

impl ToolchainRegistry {
    /// Creates an empty registry with no invocation timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-invocation timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Registers a compiler under its own version, replacing any previous one.
    pub fn register(&mut self, compiler: Arc<dyn Compiler>) {
        let version = compiler.version().clone();
        tracing::debug!(%version, "registered toolchain");
        self.compilers.insert(version, compiler);
    }

    /// Looks up the compiler for a version.
    pub fn resolve(&self, version: &CompilerVersion) -> Result<CompilerHandle, ToolchainError> {
        match self.compilers.get(version) {
            Some(compiler) => Ok(CompilerHandle {
                version: version.clone(),
                compiler: Arc::clone(compiler),
            }),
            None => Err(ToolchainError::UnknownToolchain {
                version: version.clone(),
                available: self.compilers.keys().cloned().collect(),
            }),
        }
    }

    /// Checks that every version in `versions` is registered.
    pub fn ensure_available<'a, I>(&self, versions: I) -> Result<(), ToolchainError>
    where
        I: IntoIterator<Item = &'a CompilerVersion>,
    {
        for version in versions {
            self.resolve(version)?;
        }
        Ok(())
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &CompilerVersion> {
        self.compilers.keys()
    }

    /// Compiles one group of `graph` with the registry's timeout.
    ///
    /// An output carrying error diagnostics is turned into a
    /// [`FailureKind::DiagnosticsOnly`] failure. A compiler that panics is
    /// reported as a process error.
    pub fn invoke(
        &self,
        handle: &CompilerHandle,
        graph: &UnitGraph,
        group: &UnitGroup,
    ) -> Result<CompilerOutput, CompilerFailure> {
        self.invoke_with_timeout(handle, graph, group, self.timeout)
    }

    /// Compiles one group of `graph` with an explicit timeout.
    ///
    /// The compiler sees the group's units plus every unit it imports. With
    /// a timeout the compiler runs on its own thread; on expiry the thread
    /// is abandoned, not cancelled.
    #[tracing::instrument(level = "debug", skip_all, fields(group = %group.id(), version = %handle.version))]
    pub fn invoke_with_timeout(
        &self,
        handle: &CompilerHandle,
        graph: &UnitGraph,
        group: &UnitGroup,
        timeout: Option<Duration>,
    ) -> Result<CompilerOutput, CompilerFailure> {
        let settings = group.settings();
        if settings.compiler_version() != &handle.version {
            return Err(CompilerFailure::process_error(format!(
                "group requires compiler {} but was handed {}",
                settings.compiler_version(),
                handle.version
            )));
        }

        let input = CompilerInput::from_group(graph, group);
        let started = Instant::now();
        tracing::debug!(
            units = input.sources.len(),
            imported = input.dependencies.len(),
            "invoking compiler"
        );

        let result = match timeout {
            Some(limit) => run_with_timeout(Arc::clone(&handle.compiler), input, limit),
            None => run_inline(handle.compiler.as_ref(), &input),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(output) if output.has_errors() => {
                tracing::debug!(elapsed_ms, "compiler reported errors");
                Err(CompilerFailure::diagnostics_only(output.diagnostics))
            }
            Ok(output) => {
                tracing::debug!(elapsed_ms, bytes = output.bytecode.len(), "compiler finished");
                Ok(output)
            }
            Err(failure) => {
                if failure.kind == FailureKind::Timeout {
                    tracing::warn!(elapsed_ms, "compiler timed out");
                } else {
                    tracing::debug!(elapsed_ms, %failure, "compiler failed");
                }
                Err(failure)
            }
        }
    }
}

fn run_inline(
    compiler: &dyn Compiler,
    input: &CompilerInput,
) -> Result<CompilerOutput, CompilerFailure> {
    panic::catch_unwind(AssertUnwindSafe(|| compiler.compile(input)))
        .unwrap_or_else(|payload| Err(CompilerFailure::process_error(panic_message(&*payload))))
}

fn run_with_timeout(
    compiler: Arc<dyn Compiler>,
    input: CompilerInput,
    limit: Duration,
) -> Result<CompilerOutput, CompilerFailure> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("kiln-compiler".to_string())
        .spawn(move || {
            let _ = tx.send(compiler.compile(&input));
        });
    if let Err(e) = spawned {
        return Err(CompilerFailure::process_error(format!(
            "could not start compiler thread: {e}"
        )));
    }

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CompilerFailure::timeout(limit)),
        // The sender is dropped without sending only if `compile` panicked.
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(CompilerFailure::process_error("compiler panicked"))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("compiler panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("compiler panicked: {s}")
    } else {
        "compiler panicked".to_string()
    }
}
