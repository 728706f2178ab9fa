//! An ordered, duplicate-free collection of source units.

use std::collections::BTreeMap;

use crate::unit::SourceUnit;
use crate::unit_id::UnitId;

/// Errors raised while assembling a [`UnitSet`].
#[derive(Debug, thiserror::Error)]
pub enum UnitSetError {
    /// Two units were supplied with the same identifier.
    #[error("duplicate source unit '{0}'")]
    Duplicate(UnitId),
}

/// The set of source units for one build, keyed and iterated by [`UnitId`].
///
/// Iteration is always in lexical identifier order regardless of insertion
/// order, which keeps every downstream computation reproducible.
#[derive(Clone, Debug, Default)]
pub struct UnitSet {
    units: BTreeMap<UnitId, SourceUnit>,
}

impl UnitSet {
    /// Creates an empty unit set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a unit, rejecting duplicate identifiers.
    pub fn insert(&mut self, unit: SourceUnit) -> Result<(), UnitSetError> {
        if self.units.contains_key(&unit.id) {
            return Err(UnitSetError::Duplicate(unit.id));
        }
        self.units.insert(unit.id.clone(), unit);
        Ok(())
    }

    /// Builds a unit set from an iterator of units.
    pub fn from_units<I>(units: I) -> Result<Self, UnitSetError>
    where
        I: IntoIterator<Item = SourceUnit>,
    {
        let mut set = Self::new();
        for unit in units {
            set.insert(unit)?;
        }
        Ok(set)
    }

    /// Looks up a unit by identifier.
    pub fn get(&self, id: &UnitId) -> Option<&SourceUnit> {
        self.units.get(id)
    }

    /// Returns `true` if a unit with this identifier is present.
    pub fn contains(&self, id: &UnitId) -> bool {
        self.units.contains_key(id)
    }

    /// Iterates over units in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    /// Returns the number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the set holds no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_id_order() {
        let set = UnitSet::from_units([
            SourceUnit::new("c.sol", ""),
            SourceUnit::new("a.sol", ""),
            SourceUnit::new("b.sol", ""),
        ])
        .unwrap();
        let ids: Vec<_> = set.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a.sol", "b.sol", "c.sol"]);
    }

    #[test]
    fn rejects_duplicates() {
        let err = UnitSet::from_units([SourceUnit::new("a.sol", "1"), SourceUnit::new("a.sol", "2")])
            .unwrap_err();
        assert!(matches!(err, UnitSetError::Duplicate(id) if id.as_str() == "a.sol"));
    }

    #[test]
    fn lookup() {
        let set = UnitSet::from_units([SourceUnit::new("a.sol", "x")]).unwrap();
        assert!(set.contains(&UnitId::from("a.sol")));
        assert_eq!(set.get(&UnitId::from("a.sol")).unwrap().content, b"x");
        assert!(set.get(&UnitId::from("b.sol")).is_none());
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }
}
