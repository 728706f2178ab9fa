//! Compiler toolchains for the Kiln build engine.
//!
//! A toolchain is an invokable compiler bound to one [`CompilerVersion`]. The
//! engine treats every compiler as an opaque, deterministic function from a
//! source set plus settings to bytecode, interface metadata, and diagnostics.
//! [`ToolchainRegistry`] maps versions to compilers and is the single place
//! the engine invokes them.
//!
//! [`CompilerVersion`]: kiln_config::CompilerVersion

#![warn(missing_docs)]

pub mod compiler;
pub mod failure;
pub mod process;
pub mod registry;

pub use compiler::{Compiler, CompilerHandle, CompilerInput, CompilerOutput};
pub use failure::{CompilerFailure, FailureKind};
pub use process::ProcessCompiler;
pub use registry::{ToolchainError, ToolchainRegistry};
