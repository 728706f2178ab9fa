//! Diagnostic creation, severity management, aggregation, and rendering.
//!
//! This crate provides structured [`Diagnostic`] messages reported by compilers
//! and by the engine itself. The thread-safe [`DiagnosticSink`] accumulates
//! diagnostics from concurrent workers, [`DiagnosticSummary`] partitions them
//! by severity, and [`DiagnosticRenderer`] implementations format them for the
//! terminal or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;
pub mod summary;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
pub use summary::DiagnosticSummary;
