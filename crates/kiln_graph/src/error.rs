//! Configuration errors detected while building the unit graph.

use kiln_source::UnitId;

/// Errors that prevent the unit graph from being built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Units in one import cycle were assigned different settings.
    ///
    /// Cyclic units share one compiler invocation and therefore one set of
    /// settings; this is a configuration error.
    #[error("import cycle between {} is assigned incompatible settings ({})", join(.units), .conflicting.join(" vs "))]
    CycleAcrossIncompatibleSettings {
        /// Every unit in the cycle, in identifier order.
        units: Vec<UnitId>,
        /// Human-readable summaries of the distinct settings involved.
        conflicting: Vec<String>,
    },

    /// A unit depends on an identifier that is not part of the unit set.
    #[error("'{unit}' depends on unknown unit '{dependency}'")]
    UnresolvedDependency {
        /// The importing unit.
        unit: UnitId,
        /// The missing dependency.
        dependency: UnitId,
    },
}

fn join(units: &[UnitId]) -> String {
    units
        .iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cycle() {
        let err = GraphError::CycleAcrossIncompatibleSettings {
            units: vec![UnitId::from("A.sol"), UnitId::from("B.sol")],
            conflicting: vec!["0.8.17 runs=200".to_string(), "0.8.17 runs=300".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "import cycle between A.sol, B.sol is assigned incompatible settings (0.8.17 runs=200 vs 0.8.17 runs=300)"
        );
    }

    #[test]
    fn display_unresolved() {
        let err = GraphError::UnresolvedDependency {
            unit: UnitId::from("A.sol"),
            dependency: UnitId::from("Missing.sol"),
        };
        assert_eq!(err.to_string(), "'A.sol' depends on unknown unit 'Missing.sol'");
    }
}
