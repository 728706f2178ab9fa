//! Compiler failures.

use std::fmt;
use std::time::Duration;

use kiln_diagnostics::{Diagnostic, DiagnosticCode};

/// Why a compiler invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The invocation exceeded the configured timeout.
    Timeout,
    /// The compiler could not be run, crashed, or produced unreadable output.
    ProcessError,
    /// The compiler ran to completion but reported errors.
    DiagnosticsOnly,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timed out"),
            FailureKind::ProcessError => write!(f, "compiler process failed"),
            FailureKind::DiagnosticsOnly => write!(f, "compilation failed"),
        }
    }
}

/// A failed compiler invocation.
///
/// Carries whatever diagnostics the compiler produced before failing, so a
/// crash halfway through a report still surfaces the messages it got out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CompilerFailure {
    /// The failure category.
    pub kind: FailureKind,
    /// A one-line description.
    pub message: String,
    /// Diagnostics reported by the compiler.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilerFailure {
    /// An invocation that ran past `limit`.
    pub fn timeout(limit: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("no result after {}ms", limit.as_millis()),
            diagnostics: Vec::new(),
        }
    }

    /// A compiler that could not run to completion.
    pub fn process_error(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ProcessError,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    /// A compiler that completed but reported errors.
    pub fn diagnostics_only(diagnostics: Vec<Diagnostic>) -> Self {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            kind: FailureKind::DiagnosticsOnly,
            message: format!(
                "{errors} error{} reported",
                if errors == 1 { "" } else { "s" }
            ),
            diagnostics,
        }
    }

    /// Attaches compiler diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Returns the diagnostics to report for this failure.
    ///
    /// Timeouts and process errors gain a synthesized error diagnostic so
    /// that every failure contributes at least one error to the build.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let synthesized = match self.kind {
            FailureKind::Timeout => Some(DiagnosticCode::TOOLCHAIN_TIMEOUT),
            FailureKind::ProcessError => Some(DiagnosticCode::TOOLCHAIN_PROCESS),
            FailureKind::DiagnosticsOnly if !self.diagnostics.iter().any(Diagnostic::is_error) => {
                Some(DiagnosticCode::COMPILER_ERROR)
            }
            FailureKind::DiagnosticsOnly => None,
        };
        let mut diagnostics = self.diagnostics;
        if let Some(code) = synthesized {
            diagnostics.insert(
                0,
                Diagnostic::error(code, format!("{}: {}", self.kind, self.message)),
            );
        }
        diagnostics
    }
}
