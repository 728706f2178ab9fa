//! Unit graph: import edges, cycle grouping, and topological ordering.
//!
//! [`UnitGraph::build`] collapses every strongly-connected component of the
//! import graph into one [`UnitGroup`] (units in an import cycle must be
//! compiled by a single compiler invocation), checks that each group has one
//! consistent set of settings, and stores the groups in an arena ordered
//! topologically: every group appears after all of its dependencies.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod group;

pub use error::GraphError;
pub use graph::UnitGraph;
pub use group::{GroupId, GroupIndex, UnitGroup};
