//! `kiln plan`: show what a build would do without compiling.

use std::collections::BTreeSet;
use std::error::Error;

use kiln_cache::{fingerprint_graph, Fingerprint};
use kiln_config::CompilerVersion;
use kiln_graph::{UnitGraph, UnitGroup};
use kiln_toolchain::ToolchainRegistry;

use crate::pipeline::{build_registry, load_units, render_diagnostics, resolve_project_root, unmatched_overrides};
use crate::{GlobalArgs, ReportFormat};

/// Runs the `kiln plan` command.
///
/// Prints every group in build order. Returns exit code 1 if any group's
/// compiler version has no configured toolchain, since a build would abort.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;
    let assignment = kiln_config::resolve_assignment(&config)?;
    let mut loaded = load_units(&project_dir, &config)?;
    loaded.warnings.extend(unmatched_overrides(&assignment, &loaded.units));
    render_diagnostics(&loaded.warnings, &loaded.units, ReportFormat::Text, global.color);

    let graph = UnitGraph::build(loaded.units, &assignment)?;
    let registry = build_registry(&config, &project_dir)?;

    let fingerprints = fingerprint_graph(&graph);
    for group in graph.groups() {
        let available = registry.resolve(group.settings().compiler_version()).is_ok();
        let fingerprint = fingerprints[group.index().index()];
        println!("{}", describe_group(&graph, group, fingerprint, available));
    }

    if !global.quiet {
        eprintln!(
            "   {} group(s) from {} unit(s)",
            graph.len(),
            graph.unit_count()
        );
        let versions: Vec<String> = registry.versions().map(|v| v.to_string()).collect();
        eprintln!("   Toolchains: {}", if versions.is_empty() { "none".to_string() } else { versions.join(", ") });
    }
    let missing = missing_versions(&graph, &registry);
    if !missing.is_empty() {
        eprintln!(
            "error: no toolchain configured for compiler version(s) {}",
            missing.join(", ")
        );
        return Ok(1);
    }
    Ok(0)
}

fn describe_group(graph: &UnitGraph, group: &UnitGroup, fingerprint: Fingerprint, available: bool) -> String {
    let mut out = format!(
        "{:>3}  {}  [{}]  {}",
        group.index().index(),
        group.id(),
        group.settings(),
        fingerprint,
    );
    if !available {
        out.push_str("  (no toolchain)");
    }
    if group.is_cycle() {
        let members: Vec<&str> = group.unit_ids().map(|id| id.as_str()).collect();
        out.push_str(&format!("\n       cycle: {}", members.join(", ")));
    }
    if !group.dependencies().is_empty() {
        let after: Vec<String> = group
            .dependencies()
            .iter()
            .map(|&dep| graph.group(dep).id().to_string())
            .collect();
        out.push_str(&format!("\n       after: {}", after.join(", ")));
    }
    out
}

/// Versions required by the graph that the registry cannot serve, ascending.
fn missing_versions(graph: &UnitGraph, registry: &ToolchainRegistry) -> Vec<String> {
    let missing: BTreeSet<&CompilerVersion> = graph
        .groups()
        .iter()
        .map(|g| g.settings().compiler_version())
        .filter(|v| registry.resolve(v).is_err())
        .collect();
    missing.into_iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{OptimizerSettings, Settings, SettingsAssignment};
    use kiln_source::{SourceUnit, UnitSet};

    fn graph() -> UnitGraph {
        let units = UnitSet::from_units([
            SourceUnit::new("a.sol", "contract A {}").with_dependency("b.sol"),
            SourceUnit::new("b.sol", "contract B {}").with_dependency("a.sol"),
            SourceUnit::new("c.sol", "contract C {}").with_dependency("a.sol"),
        ])
        .unwrap();
        let settings = Settings::new(CompilerVersion::new(0, 8, 17), OptimizerSettings::enabled(200));
        UnitGraph::build(units, &SettingsAssignment::uniform(settings)).unwrap()
    }

    #[test]
    fn describes_cycles_and_ordering() {
        let graph = graph();
        let fingerprints = fingerprint_graph(&graph);
        let cycle = &graph.groups()[0];
        let text = describe_group(&graph, cycle, fingerprints[0], true);
        assert!(text.contains("a.sol  [0.8.17 optimizer runs=200]"));
        assert!(text.contains("cycle: a.sol, b.sol"));
        assert!(!text.contains("no toolchain"));

        let dependent = &graph.groups()[1];
        let text = describe_group(&graph, dependent, fingerprints[1], false);
        assert!(text.contains("c.sol"));
        assert!(text.contains(&fingerprints[1].to_string()));
        assert!(text.contains("after: a.sol"));
        assert!(text.contains("(no toolchain)"));
    }

    #[test]
    fn reports_missing_toolchains() {
        let graph = graph();
        let registry = ToolchainRegistry::new();
        assert_eq!(missing_versions(&graph, &registry), vec!["0.8.17"]);
    }
}
