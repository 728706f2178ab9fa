//! Diagnostics partitioned by severity.

use serde::Serialize;

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;

/// Diagnostics from a whole build, partitioned by severity.
///
/// Within each partition the original emission order is preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    /// Error-severity diagnostics.
    pub errors: Vec<Diagnostic>,
    /// Warning-severity diagnostics.
    pub warnings: Vec<Diagnostic>,
    /// Info-severity diagnostics.
    pub infos: Vec<Diagnostic>,
}

impl DiagnosticSummary {
    /// Partitions diagnostics by severity.
    pub fn partition<I: IntoIterator<Item = Diagnostic>>(diags: I) -> Self {
        let mut summary = Self::default();
        for diag in diags {
            summary.push(diag);
        }
        summary
    }

    /// Adds one diagnostic to the matching partition.
    pub fn push(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.errors.push(diag),
            Severity::Warning => self.warnings.push(diag),
            Severity::Info => self.infos.push(diag),
        }
    }

    /// Returns `true` if at least one error is present.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Total number of diagnostics across all severities.
    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.infos.len()
    }

    /// Returns `true` if there are no diagnostics at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all diagnostics, most severe partition first.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.infos.iter())
    }
}
