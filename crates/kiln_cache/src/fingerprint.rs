//! Group fingerprints.

use std::fmt;
use std::str::FromStr;

use kiln_common::{ContentHash, ContentHasher, ParseHashError};
use kiln_config::Settings;
use kiln_graph::{UnitGraph, UnitGroup};
use kiln_source::SourceUnit;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bumped whenever the hashed layout below changes.
const FINGERPRINT_LAYOUT: u64 = 2;

/// A 128-bit digest of everything that determines a group's compiled output.
///
/// Serialized as 32 lowercase hex digits so it can key JSON maps and name
/// files directly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(ContentHash);

impl Fingerprint {
    /// Wraps a raw content hash.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// The underlying hash.
    pub fn as_hash(&self) -> &ContentHash {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_string();
        write!(f, "Fingerprint({})", &hex[..12])
    }
}

impl FromStr for Fingerprint {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Computes the fingerprint of a group compiled with `settings`.
///
/// Covers the compiler version, the effective optimizer configuration, every
/// auxiliary flag, each unit's identifier and content in identifier order,
/// and the fingerprints of the groups it imports from directly. Since those
/// in turn cover their own imports, a content change anywhere below a group
/// changes the group's fingerprint.
///
/// `dependencies` must be given in [`GroupIndex`](kiln_graph::GroupIndex)
/// order; [`fingerprint_graph`] takes care of that.
pub fn fingerprint(group: &UnitGroup, settings: &Settings, dependencies: &[Fingerprint]) -> Fingerprint {
    let mut units: Vec<&SourceUnit> = group.units().iter().collect();
    units.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = ContentHasher::new();
    hasher.u64_field(FINGERPRINT_LAYOUT);
    hasher.str_field(&settings.compiler_version().to_string());
    match settings.optimizer().effective_runs() {
        Some(runs) => hasher.u64_field(1).u64_field(u64::from(runs)),
        None => hasher.u64_field(0),
    };
    hasher.u64_field(settings.flags().len() as u64);
    for (key, value) in settings.flags() {
        hasher.str_field(key).str_field(value);
    }
    hasher.u64_field(units.len() as u64);
    for unit in units {
        hasher.str_field(unit.id.as_str()).field(&unit.content);
    }
    hasher.u64_field(dependencies.len() as u64);
    for dependency in dependencies {
        hasher.field(dependency.as_hash().as_bytes());
    }
    Fingerprint(hasher.finish())
}

/// Fingerprints every group of `graph` with its own settings.
///
/// The result is indexed by arena position. Arena order is topological, so
/// each group's dependencies are already fingerprinted when it is reached.
pub fn fingerprint_graph(graph: &UnitGraph) -> Vec<Fingerprint> {
    let mut fingerprints: Vec<Fingerprint> = Vec::with_capacity(graph.len());
    for group in graph.groups() {
        let dependencies: Vec<Fingerprint> = group
            .dependencies()
            .iter()
            .map(|dep| fingerprints[dep.index()])
            .collect();
        fingerprints.push(fingerprint(group, group.settings(), &dependencies));
    }
    fingerprints
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{CompilerVersion, OptimizerSettings, SettingsAssignment};
    use kiln_source::UnitSet;

    fn base() -> Settings {
        Settings::new(CompilerVersion::new(0, 8, 17), OptimizerSettings::enabled(200))
    }

    /// Fingerprint of the group containing `a.sol`.
    fn fp_of(units: Vec<SourceUnit>, settings: Settings) -> Fingerprint {
        let graph = UnitGraph::build(
            UnitSet::from_units(units).unwrap(),
            &SettingsAssignment::uniform(settings.clone()),
        )
        .unwrap();
        let group = graph.group_of(&"a.sol".into()).unwrap();
        fingerprint_graph(&graph)[group.index().index()]
    }

    fn cycle(content_a: &str) -> Vec<SourceUnit> {
        vec![
            SourceUnit::new("a.sol", content_a).with_dependency("b.sol"),
            SourceUnit::new("b.sol", "contract B {}").with_dependency("a.sol"),
        ]
    }

    #[test]
    fn independent_of_insertion_order() {
        let forward = cycle("contract A {}");
        let mut backward = cycle("contract A {}");
        backward.reverse();
        assert_eq!(fp_of(forward, base()), fp_of(backward, base()));
    }

    #[test]
    fn content_change_changes_fingerprint() {
        assert_ne!(
            fp_of(cycle("contract A {}"), base()),
            fp_of(cycle("contract A { uint x; }"), base())
        );
    }

    #[test]
    fn runs_change_changes_fingerprint() {
        let s300 = base().with_optimizer(OptimizerSettings::enabled(300));
        assert_ne!(fp_of(cycle("a"), base()), fp_of(cycle("a"), s300));
    }

    #[test]
    fn disabled_optimizer_ignores_runs() {
        let off_200 = base().with_optimizer(OptimizerSettings {
            enabled: false,
            runs: 200,
        });
        let off_999 = base().with_optimizer(OptimizerSettings {
            enabled: false,
            runs: 999,
        });
        assert_eq!(fp_of(cycle("a"), off_200.clone()), fp_of(cycle("a"), off_999));
        assert_ne!(fp_of(cycle("a"), off_200), fp_of(cycle("a"), base()));
    }

    #[test]
    fn version_and_flags_are_covered() {
        let other_version = Settings::new(CompilerVersion::new(0, 8, 19), OptimizerSettings::enabled(200));
        assert_ne!(fp_of(cycle("a"), base()), fp_of(cycle("a"), other_version));

        let flagged = base().with_flag("evmVersion", "paris");
        assert_ne!(fp_of(cycle("a"), base()), fp_of(cycle("a"), flagged));
    }

    #[test]
    fn unit_boundaries_matter() {
        // Same concatenated bytes split differently between two units.
        let left = vec![
            SourceUnit::new("a.sol", "ab").with_dependency("b.sol"),
            SourceUnit::new("b.sol", "c").with_dependency("a.sol"),
        ];
        let right = vec![
            SourceUnit::new("a.sol", "a").with_dependency("b.sol"),
            SourceUnit::new("b.sol", "bc").with_dependency("a.sol"),
        ];
        assert_ne!(fp_of(left, base()), fp_of(right, base()));
    }

    fn chain(content_b: &str) -> Vec<SourceUnit> {
        vec![
            SourceUnit::new("a.sol", "import \"b.sol\"; contract A is B {}").with_dependency("b.sol"),
            SourceUnit::new("b.sol", content_b).with_dependency("c.sol"),
            SourceUnit::new("c.sol", "contract C {}"),
            SourceUnit::new("d.sol", "contract D {}"),
        ]
    }

    #[test]
    fn dependency_change_reaches_importers() {
        let before = chain("contract B is C {}");
        let after = chain("contract B is C { uint y; }");
        assert_ne!(fp_of(before, base()), fp_of(after, base()));
    }

    #[test]
    fn unrelated_change_leaves_group_alone() {
        let mut edited = chain("contract B is C {}");
        edited[3] = SourceUnit::new("d.sol", "contract D { uint z; }");
        assert_eq!(fp_of(chain("contract B is C {}"), base()), fp_of(edited, base()));
    }

    #[test]
    fn graph_fingerprints_follow_arena_order() {
        let graph = UnitGraph::build(
            UnitSet::from_units(chain("contract B is C {}")).unwrap(),
            &SettingsAssignment::uniform(base()),
        )
        .unwrap();
        let fingerprints = fingerprint_graph(&graph);
        assert_eq!(fingerprints.len(), graph.len());

        let b = graph.group_of(&"b.sol".into()).unwrap();
        let c = graph.group_of(&"c.sol".into()).unwrap();
        let expected = fingerprint(b, b.settings(), &[fingerprints[c.index().index()]]);
        assert_eq!(fingerprints[b.index().index()], expected);
        assert_ne!(fingerprints[b.index().index()], fingerprint(b, b.settings(), &[]));
    }

    #[test]
    fn hex_serde() {
        let fp = fp_of(cycle("a"), base());
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{fp}\""));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
        assert!(serde_json::from_str::<Fingerprint>("\"xyz\"").is_err());
    }
}
