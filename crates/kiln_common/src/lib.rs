//! Shared foundational types used across the Kiln build engine.
//!
//! This crate provides content hashing (one-shot and streaming) and the common
//! internal-error result type.

#![warn(missing_docs)]

pub mod hash;
pub mod result;

pub use hash::{ContentHash, ContentHasher, ParseHashError};
pub use result::{InternalError, KilnResult};
