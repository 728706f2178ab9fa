//! Source unit model: identifiers, contents, dependency edges, and positions.
//!
//! Source units are owned by the caller and only read by the engine. This
//! crate provides the [`SourceUnit`] value, the path-like [`UnitId`] used to
//! name units and their imports, [`SourcePosition`] for diagnostics, and the
//! [`UnitSet`] collection handed to graph construction.

#![warn(missing_docs)]

pub mod position;
pub mod unit;
pub mod unit_id;
pub mod unit_set;

pub use position::SourcePosition;
pub use unit::SourceUnit;
pub use unit_id::UnitId;
pub use unit_set::{UnitSet, UnitSetError};
