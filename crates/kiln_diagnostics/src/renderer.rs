//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use kiln_source::UnitSet;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    ///
    /// `units` is consulted for the source line when the diagnostic carries
    /// a unit and position.
    fn render(&self, diag: &Diagnostic, units: &UnitSet) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[E001]: expected ';' but got '}'
///   --> contracts/Token.sol:10:5
///    |
/// 10 |     uint256 total
///    |     ^
///    = note: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let label = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return format!("{label}: {}\n", diag.message);
        }
        let ansi = match diag.severity {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
            Severity::Info => "1;36",
        };
        format!("\x1b[{ansi}m{label}\x1b[0m\x1b[1m: {}\x1b[0m\n", diag.message)
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, units: &UnitSet) -> String {
        let mut out = self.header(diag);

        if let Some(unit_id) = &diag.unit {
            match diag.position {
                Some(pos) => {
                    out.push_str(&format!("  --> {unit_id}:{pos}\n"));
                    let line_text = units.get(unit_id).and_then(|u| u.line_text(pos.line));
                    if let Some(line_text) = line_text {
                        let line_num = pos.line.to_string();
                        let padding = " ".repeat(line_num.len());
                        let col_padding = " ".repeat((pos.column as usize).saturating_sub(1));
                        out.push_str(&format!("{padding} |\n"));
                        out.push_str(&format!("{line_num} | {line_text}\n"));
                        out.push_str(&format!("{padding} | {col_padding}^\n"));
                    }
                }
                None => out.push_str(&format!("  --> {unit_id}\n")),
            }
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        out
    }
}

/// Renders each diagnostic as a single-line JSON object.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic, _units: &UnitSet) -> String {
        // Diagnostic holds only strings, integers, and enums; encoding cannot fail.
        let mut line = serde_json::to_string(diag).unwrap_or_default();
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::DiagnosticCode;
    use kiln_source::{SourcePosition, SourceUnit};

    fn units() -> UnitSet {
        UnitSet::from_units([SourceUnit::new(
            "contracts/Token.sol",
            "contract Token {\n    uint256 total\n}\n",
        )])
        .unwrap()
    }

    #[test]
    fn render_error_with_position() {
        let diag = Diagnostic::error(DiagnosticCode::COMPILER_ERROR, "expected ';'")
            .with_unit("contracts/Token.sol")
            .with_position(SourcePosition::new(2, 5));

        let output = TerminalRenderer::new(false).render(&diag, &units());

        assert!(output.contains("error[E001]: expected ';'"));
        assert!(output.contains("--> contracts/Token.sol:2:5"));
        assert!(output.contains("2 |     uint256 total"));
        assert!(output.contains("  |     ^"));
    }

    #[test]
    fn render_unit_without_position() {
        let diag = Diagnostic::warning(DiagnosticCode::COMPILER_WARNING, "license missing")
            .with_unit("contracts/Token.sol")
            .with_note("add an SPDX identifier");

        let output = TerminalRenderer::new(false).render(&diag, &units());

        assert!(output.contains("warning[W001]: license missing"));
        assert!(output.contains("--> contracts/Token.sol\n"));
        assert!(output.contains("= note: add an SPDX identifier"));
    }

    #[test]
    fn render_without_unit_has_no_location() {
        let diag = Diagnostic::error(DiagnosticCode::TOOLCHAIN_TIMEOUT, "timed out");
        let output = TerminalRenderer::new(false).render(&diag, &UnitSet::new());
        assert!(output.contains("error[T001]: timed out"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn colored_header_has_ansi() {
        let diag = Diagnostic::error(DiagnosticCode::COMPILER_ERROR, "boom");
        let output = TerminalRenderer::new(true).render(&diag, &UnitSet::new());
        assert!(output.contains("\x1b[1;31m"));
    }

    #[test]
    fn json_renderer_single_line() {
        let diag = Diagnostic::error(DiagnosticCode::COMPILER_ERROR, "boom").with_unit("a.sol");
        let output = JsonRenderer.render(&diag, &UnitSet::new());
        assert!(output.ends_with('\n'));
        assert_eq!(output.lines().count(), 1);
        let back: Diagnostic = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(back, diag);
    }
}
