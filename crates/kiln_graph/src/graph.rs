//! Strongly-connected-component grouping and topological ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use kiln_config::{Settings, SettingsAssignment};
use kiln_source::{SourceUnit, UnitId, UnitSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::GraphError;
use crate::group::{GroupId, GroupIndex, UnitGroup};

/// The dependency graph of unit groups, stored in topological order.
///
/// Groups are held in an arena; edges are arena indices. Iterating
/// [`groups`](Self::groups) yields every group after all of its dependencies,
/// with ties between independent groups broken by lexical [`GroupId`] order.
#[derive(Debug, Clone)]
pub struct UnitGraph {
    groups: Vec<UnitGroup>,
    unit_to_group: HashMap<UnitId, GroupIndex>,
}

/// A strongly-connected component before it is placed in the arena.
struct Component {
    id: GroupId,
    units: Vec<SourceUnit>,
    settings: Arc<Settings>,
    dependencies: BTreeSet<usize>,
}

impl UnitGraph {
    /// Builds the graph from a unit set and a settings assignment.
    ///
    /// Fails if a unit depends on an identifier outside the set, or if an
    /// import cycle spans units with different settings.
    pub fn build(units: UnitSet, assignment: &SettingsAssignment) -> Result<Self, GraphError> {
        let mut graph: DiGraph<UnitId, ()> = DiGraph::new();
        let mut nodes: BTreeMap<UnitId, NodeIndex> = BTreeMap::new();
        for unit in units.iter() {
            nodes.insert(unit.id.clone(), graph.add_node(unit.id.clone()));
        }
        for unit in units.iter() {
            let from = nodes[&unit.id];
            for dep in &unit.dependencies {
                let to = nodes
                    .get(dep)
                    .ok_or_else(|| GraphError::UnresolvedDependency {
                        unit: unit.id.clone(),
                        dependency: dep.clone(),
                    })?;
                graph.add_edge(from, *to, ());
            }
        }

        let sccs = tarjan_scc(&graph);

        let mut component_of: HashMap<UnitId, usize> = HashMap::with_capacity(units.len());
        let mut members: Vec<Vec<UnitId>> = Vec::with_capacity(sccs.len());
        for (ci, scc) in sccs.iter().enumerate() {
            let mut ids: Vec<UnitId> = scc.iter().map(|n| graph[*n].clone()).collect();
            ids.sort();
            for id in &ids {
                component_of.insert(id.clone(), ci);
            }
            members.push(ids);
        }

        let mut components = Vec::with_capacity(members.len());
        for ids in &members {
            let settings = group_settings(ids, assignment)?;
            let mut dependencies = BTreeSet::new();
            let mut group_units = Vec::with_capacity(ids.len());
            for id in ids {
                // Every id came from `units`, so the lookup cannot miss.
                if let Some(unit) = units.get(id) {
                    for dep in &unit.dependencies {
                        let target = component_of[dep];
                        if members[target][0] != ids[0] {
                            dependencies.insert(target);
                        }
                    }
                    group_units.push(unit.clone());
                }
            }
            components.push(Component {
                id: GroupId::new(ids[0].clone()),
                units: group_units,
                settings,
                dependencies,
            });
        }

        let order = topological_order(&components);
        let graph = Self::from_components(components, &order);
        tracing::debug!(
            units = graph.unit_to_group.len(),
            groups = graph.groups.len(),
            cycles = graph.groups.iter().filter(|g| g.is_cycle()).count(),
            "built unit graph"
        );
        Ok(graph)
    }

    /// Places components in the arena following `order` and rewrites edges
    /// to arena indices.
    fn from_components(components: Vec<Component>, order: &[usize]) -> Self {
        let mut position = vec![0usize; components.len()];
        for (pos, &ci) in order.iter().enumerate() {
            position[ci] = pos;
        }

        let mut slots: Vec<Option<Component>> = components.into_iter().map(Some).collect();
        let mut groups: Vec<UnitGroup> = Vec::with_capacity(slots.len());
        for (pos, &ci) in order.iter().enumerate() {
            let Some(component) = slots[ci].take() else {
                continue;
            };
            let dependencies = component
                .dependencies
                .iter()
                .map(|&d| GroupIndex::from_raw(position[d] as u32))
                .collect();
            groups.push(UnitGroup {
                index: GroupIndex::from_raw(pos as u32),
                id: component.id,
                units: component.units,
                settings: component.settings,
                dependencies,
                dependents: BTreeSet::new(),
            });
        }

        for i in 0..groups.len() {
            let deps: Vec<GroupIndex> = groups[i].dependencies.iter().copied().collect();
            for dep in deps {
                groups[dep.index()].dependents.insert(GroupIndex::from_raw(i as u32));
            }
        }

        let unit_to_group = groups
            .iter()
            .flat_map(|g| g.units.iter().map(move |u| (u.id.clone(), g.index)))
            .collect();

        Self {
            groups,
            unit_to_group,
        }
    }

    /// All groups in topological order.
    pub fn groups(&self) -> &[UnitGroup] {
        &self.groups
    }

    /// Looks up a group by arena index.
    pub fn group(&self, index: GroupIndex) -> &UnitGroup {
        &self.groups[index.index()]
    }

    /// Returns the group containing a unit.
    pub fn group_of(&self, unit: &UnitId) -> Option<&UnitGroup> {
        self.unit_to_group.get(unit).map(|&i| self.group(i))
    }

    /// Every group that depends on `index`, directly or transitively.
    pub fn transitive_dependents(&self, index: GroupIndex) -> BTreeSet<GroupIndex> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<GroupIndex> = self.group(index).dependents.iter().copied().collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.group(next).dependents.iter().copied());
            }
        }
        seen
    }

    /// Every group `index` depends on, directly or transitively.
    pub fn transitive_dependencies(&self, index: GroupIndex) -> BTreeSet<GroupIndex> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<GroupIndex> = self.group(index).dependencies.iter().copied().collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.group(next).dependencies.iter().copied());
            }
        }
        seen
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if the graph has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of units across all groups.
    pub fn unit_count(&self) -> usize {
        self.unit_to_group.len()
    }
}

/// Returns the settings shared by every unit of a component.
fn group_settings(
    ids: &[UnitId],
    assignment: &SettingsAssignment,
) -> Result<Arc<Settings>, GraphError> {
    let first = assignment.settings_for(&ids[0]);
    let mut distinct: Vec<&Arc<Settings>> = vec![first];
    for id in &ids[1..] {
        let s = assignment.settings_for(id);
        if !distinct.iter().any(|d| ***d == **s) {
            distinct.push(s);
        }
    }
    if distinct.len() == 1 {
        return Ok(Arc::clone(first));
    }
    Err(GraphError::CycleAcrossIncompatibleSettings {
        units: ids.to_vec(),
        conflicting: distinct.iter().map(|s| s.to_string()).collect(),
    })
}

/// Kahn's algorithm over components, always releasing the ready component
/// with the smallest identifier first.
fn topological_order(components: &[Component]) -> Vec<usize> {
    let mut remaining: Vec<usize> = components.iter().map(|c| c.dependencies.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    for (ci, c) in components.iter().enumerate() {
        for &d in &c.dependencies {
            dependents[d].push(ci);
        }
    }

    let mut ready: BTreeSet<(&GroupId, usize)> = components
        .iter()
        .enumerate()
        .filter(|(ci, _)| remaining[*ci] == 0)
        .map(|(ci, c)| (&c.id, ci))
        .collect();

    let mut order = Vec::with_capacity(components.len());
    while let Some((_, ci)) = ready.pop_first() {
        order.push(ci);
        for &dep in &dependents[ci] {
            remaining[dep] -= 1;
            if remaining[dep] == 0 {
                ready.insert((&components[dep].id, dep));
            }
        }
    }
    order
}
