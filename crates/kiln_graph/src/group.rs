//! Unit groups: the compilation units the orchestrator schedules.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use kiln_config::Settings;
use kiln_source::{SourceUnit, UnitId};

/// Position of a group in the graph's arena.
///
/// Arena order is topological, so a group's index is always greater than the
/// index of every group it depends on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GroupIndex(u32);

impl GroupIndex {
    /// Creates a group index from a raw arena position.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the arena position as a `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable, human-readable identifier of a group: its lexically smallest unit.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GroupId(UnitId);

impl GroupId {
    /// Creates a group identifier from its representative unit.
    pub fn new(unit: UnitId) -> Self {
        Self(unit)
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A maximal set of source units compiled together, plus their settings.
#[derive(Debug, Clone)]
pub struct UnitGroup {
    pub(crate) index: GroupIndex,
    pub(crate) id: GroupId,
    pub(crate) units: Vec<SourceUnit>,
    pub(crate) settings: Arc<Settings>,
    pub(crate) dependencies: BTreeSet<GroupIndex>,
    pub(crate) dependents: BTreeSet<GroupIndex>,
}

impl UnitGroup {
    /// The group's arena index.
    pub fn index(&self) -> GroupIndex {
        self.index
    }

    /// The group's identifier.
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    /// The group's units, in identifier order.
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    /// Identifiers of the group's units, in identifier order.
    pub fn unit_ids(&self) -> impl Iterator<Item = &UnitId> {
        self.units.iter().map(|u| &u.id)
    }

    /// The settings every unit in the group compiles with.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Groups this group imports from directly.
    pub fn dependencies(&self) -> &BTreeSet<GroupIndex> {
        &self.dependencies
    }

    /// Groups that import from this group directly.
    pub fn dependents(&self) -> &BTreeSet<GroupIndex> {
        &self.dependents
    }

    /// Returns `true` if the group is an import cycle of more than one unit.
    pub fn is_cycle(&self) -> bool {
        self.units.len() > 1
    }
}
