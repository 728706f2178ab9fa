//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Compiler-reported errors, prefixed with `E`.
    Error,
    /// Compiler-reported warnings, prefixed with `W`.
    Warning,
    /// Informational messages, prefixed with `I`.
    Info,
    /// Toolchain invocation problems (timeouts, crashed processes), prefixed with `T`.
    Toolchain,
    /// Build-engine problems (skipped groups, cache issues), prefixed with `K`.
    Engine,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Info => 'I',
            Category::Toolchain => 'T',
            Category::Engine => 'K',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `E101`, `W203`, `T001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Generic compiler error without a more specific code.
    pub const COMPILER_ERROR: DiagnosticCode = DiagnosticCode::new(Category::Error, 1);
    /// Generic compiler warning without a more specific code.
    pub const COMPILER_WARNING: DiagnosticCode = DiagnosticCode::new(Category::Warning, 1);
    /// An import directive names a file that is not part of the project.
    pub const UNRESOLVED_IMPORT: DiagnosticCode = DiagnosticCode::new(Category::Warning, 2);
    /// A settings override names a file that is not part of the project.
    pub const UNMATCHED_OVERRIDE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 3);
    /// Generic compiler info message.
    pub const COMPILER_INFO: DiagnosticCode = DiagnosticCode::new(Category::Info, 1);
    /// A compiler invocation exceeded the configured timeout.
    pub const TOOLCHAIN_TIMEOUT: DiagnosticCode = DiagnosticCode::new(Category::Toolchain, 1);
    /// A compiler process could not be run or crashed.
    pub const TOOLCHAIN_PROCESS: DiagnosticCode = DiagnosticCode::new(Category::Toolchain, 2);
    /// A compiler produced output that could not be decoded.
    pub const TOOLCHAIN_OUTPUT: DiagnosticCode = DiagnosticCode::new(Category::Toolchain, 3);
    /// A group was skipped because one of its dependencies failed.
    pub const SKIPPED_GROUP: DiagnosticCode = DiagnosticCode::new(Category::Engine, 1);

    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
        assert_eq!(Category::Info.prefix(), 'I');
        assert_eq!(Category::Toolchain.prefix(), 'T');
        assert_eq!(Category::Engine.prefix(), 'K');
    }

    #[test]
    fn display_format() {
        let code = DiagnosticCode::new(Category::Error, 101);
        assert_eq!(format!("{code}"), "E101");
        assert_eq!(format!("{}", DiagnosticCode::TOOLCHAIN_TIMEOUT), "T001");
        assert_eq!(format!("{}", DiagnosticCode::SKIPPED_GROUP), "K001");
        assert_eq!(format!("{}", DiagnosticCode::UNMATCHED_OVERRIDE), "W003");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Warning, 42);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
