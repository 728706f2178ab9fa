//! `kiln build`: compile a project through the artifact cache.
//!
//! 1. Load `kiln.toml` and resolve per-unit settings
//! 2. Discover source units and link their imports
//! 3. Group units and run the orchestrator with the configured toolchains
//! 4. Report per-group status and diagnostics
//! 5. Write one JSON artifact per compiled group

use std::error::Error;
use std::path::{Path, PathBuf};

use kiln_build::{BuildOptions, BuildResult, GroupReport, GroupStatus, Orchestrator};
use kiln_graph::UnitGraph;
use serde_json::{json, Value};

use crate::pipeline::{
    build_registry, load_units, open_cache, render_diagnostics, resolve_project_root, unmatched_overrides,
};
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln build` command.
///
/// Returns exit code 0 when every group compiled cleanly, 1 otherwise.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;
    let assignment = kiln_config::resolve_assignment(&config)?;

    if !global.quiet {
        if config.project.version.is_empty() {
            eprintln!("   Building {}", config.project.name);
        } else {
            eprintln!("   Building {} v{}", config.project.name, config.project.version);
        }
    }

    let mut loaded = load_units(&project_dir, &config)?;
    loaded.warnings.extend(unmatched_overrides(&assignment, &loaded.units));
    render_diagnostics(&loaded.warnings, &loaded.units, args.format, global.color);
    if loaded.units.is_empty() {
        eprintln!(
            "error: no .{} source files found in {}",
            config.project.extension,
            project_dir.join(&config.project.sources).display()
        );
        return Ok(1);
    }

    let graph = UnitGraph::build(loaded.units.clone(), &assignment)?;
    let registry = build_registry(&config, &project_dir)?;
    let cache = open_cache(&config, &project_dir, !args.no_cache)?;
    let jobs = args.jobs.or(config.build.jobs).unwrap_or(0);

    let result = Orchestrator::new(&registry, &cache, BuildOptions::default().with_jobs(jobs)).build(&graph)?;

    if let Err(e) = cache.save() {
        tracing::warn!(error = %e, "failed to save cache manifest");
    }

    if !global.quiet && args.format == ReportFormat::Text {
        for report in &result.groups {
            eprintln!("{}", status_line(report));
        }
    }
    render_diagnostics(result.diagnostics.iter(), &loaded.units, args.format, global.color);

    let out_dir = project_dir.join(&config.project.out);
    let mut written = 0;
    for (report, _) in result.artifacts() {
        write_artifact(&out_dir, report)?;
        written += 1;
    }

    match args.format {
        ReportFormat::Json => println!("{}", summary_json(&result)),
        ReportFormat::Text if !global.quiet => {
            eprintln!();
            eprintln!(
                "   {} {} group(s): {} compiled, {} cached, {} failed, {} skipped",
                if result.is_success() { "Finished" } else { "Failed" },
                result.groups.len(),
                result.invocations,
                result.cache_hits(),
                result.failed_count(),
                result.skipped_count(),
            );
            eprintln!("   Wrote {written} artifact(s) to {}", out_dir.display());
        }
        ReportFormat::Text => {}
    }

    Ok(if result.is_success() { 0 } else { 1 })
}

/// One right-aligned status line per group, in the style of cargo's output.
fn status_line(report: &GroupReport) -> String {
    match &report.status {
        GroupStatus::Done { cache_hit: false } => {
            format!("   Compiled {} ({})", report.id, report.compiler_version)
        }
        GroupStatus::Done { cache_hit: true } => {
            format!("      Fresh {} ({})", report.id, report.compiler_version)
        }
        GroupStatus::Failed { kind } => format!("     Failed {} ({kind})", report.id),
        GroupStatus::SkippedDueToDependencyFailure { failed_dependency } => {
            format!("    Skipped {} (dependency {failed_dependency} failed)", report.id)
        }
    }
}

/// Where a group's artifact is written: `<out>/<group id>.json`.
pub fn artifact_path(out_dir: &Path, report: &GroupReport) -> PathBuf {
    out_dir.join(format!("{}.json", report.id))
}

fn write_artifact(out_dir: &Path, report: &GroupReport) -> Result<(), Box<dyn Error>> {
    let Some(artifact) = &report.artifact else {
        return Ok(());
    };
    let path = artifact_path(out_dir, report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let interface = serde_json::from_str::<Value>(&artifact.interface)
        .unwrap_or_else(|_| Value::String(artifact.interface.clone()));
    let document = json!({
        "group": report.id.as_str(),
        "units": report.units,
        "compilerVersion": report.compiler_version.to_string(),
        "fingerprint": report.fingerprint.to_string(),
        "bytecode": format!("0x{}", hex::encode(&artifact.bytecode)),
        "interface": interface,
    });
    std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
    tracing::debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

fn summary_json(result: &BuildResult) -> Value {
    let groups: Vec<Value> = result
        .groups
        .iter()
        .map(|report| {
            let (status, detail) = match &report.status {
                GroupStatus::Done { cache_hit } => ("done", json!({ "cacheHit": cache_hit })),
                GroupStatus::Failed { kind } => ("failed", json!({ "kind": kind.to_string() })),
                GroupStatus::SkippedDueToDependencyFailure { failed_dependency } => (
                    "skipped",
                    json!({ "failedDependency": failed_dependency.as_str() }),
                ),
            };
            json!({
                "group": report.id.as_str(),
                "units": report.units,
                "compilerVersion": report.compiler_version.to_string(),
                "fingerprint": report.fingerprint.to_string(),
                "status": status,
                "detail": detail,
            })
        })
        .collect();
    json!({
        "outcome": if result.is_success() { "succeeded" } else { "failed" },
        "invocations": result.invocations,
        "errors": result.diagnostics.errors.len(),
        "warnings": result.diagnostics.warnings.len(),
        "groups": groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kiln_build::BuildOutcome;
    use kiln_cache::{Artifact, Fingerprint};
    use kiln_config::CompilerVersion;
    use kiln_diagnostics::DiagnosticSummary;
    use kiln_graph::{GroupId, GroupIndex};
    use kiln_source::UnitId;
    use kiln_toolchain::FailureKind;

    fn fingerprint() -> Fingerprint {
        "0123456789abcdef0123456789abcdef".parse().unwrap()
    }

    fn report(id: &str, status: GroupStatus) -> GroupReport {
        let artifact = status.is_done().then(|| {
            Arc::new(Artifact {
                fingerprint: fingerprint(),
                bytecode: vec![0x60, 0x80],
                interface: r#"[{"type":"function","name":"total"}]"#.to_string(),
                diagnostics: Vec::new(),
            })
        });
        GroupReport {
            index: GroupIndex::from_raw(0),
            id: GroupId::new(UnitId::new(id)),
            units: vec![UnitId::new(id)],
            compiler_version: CompilerVersion::new(0, 8, 17),
            fingerprint: fingerprint(),
            status,
            artifact,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn status_lines() {
        assert_eq!(
            status_line(&report("a.sol", GroupStatus::Done { cache_hit: false })),
            "   Compiled a.sol (0.8.17)"
        );
        assert_eq!(
            status_line(&report("a.sol", GroupStatus::Done { cache_hit: true })),
            "      Fresh a.sol (0.8.17)"
        );
        let skipped = GroupStatus::SkippedDueToDependencyFailure {
            failed_dependency: GroupId::new(UnitId::new("b.sol")),
        };
        assert_eq!(
            status_line(&report("a.sol", skipped)),
            "    Skipped a.sol (dependency b.sol failed)"
        );
    }

    #[test]
    fn writes_artifact_under_group_path() {
        let tmp = tempfile::tempdir().unwrap();
        let report = report("contracts/Token.sol", GroupStatus::Done { cache_hit: false });
        write_artifact(tmp.path(), &report).unwrap();

        let path = tmp.path().join("contracts/Token.sol.json");
        let written: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["group"], "contracts/Token.sol");
        assert_eq!(written["bytecode"], "0x6080");
        assert_eq!(written["compilerVersion"], "0.8.17");
        assert_eq!(written["interface"][0]["name"], "total");
    }

    #[test]
    fn failed_group_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let report = report(
            "a.sol",
            GroupStatus::Failed {
                kind: FailureKind::Timeout,
            },
        );
        write_artifact(tmp.path(), &report).unwrap();
        assert!(!tmp.path().join("a.sol.json").exists());
    }

    #[test]
    fn summary_reports_outcome_and_groups() {
        let result = BuildResult {
            groups: vec![
                report("a.sol", GroupStatus::Done { cache_hit: true }),
                report(
                    "b.sol",
                    GroupStatus::Failed {
                        kind: FailureKind::ProcessError,
                    },
                ),
            ],
            diagnostics: DiagnosticSummary::default(),
            outcome: BuildOutcome::BuildFailed,
            invocations: 1,
        };
        let summary = summary_json(&result);
        assert_eq!(summary["outcome"], "failed");
        assert_eq!(summary["groups"][0]["detail"]["cacheHit"], true);
        assert_eq!(summary["groups"][1]["status"], "failed");
    }
}
