//! Shared pipeline helpers for CLI commands.
//!
//! Project root resolution, source discovery and import extraction, and the
//! construction of the toolchain registry and artifact cache from
//! `kiln.toml`.

use std::collections::BTreeSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kiln_cache::{ArtifactCache, CacheOptions};
use kiln_config::{CompilerVersion, ProjectConfig, SettingsAssignment, CONFIG_FILE};
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticRenderer, JsonRenderer, TerminalRenderer};
use kiln_source::{SourcePosition, SourceUnit, UnitId, UnitSet};
use kiln_toolchain::{ProcessCompiler, ToolchainRegistry};

use crate::imports::{resolve_import, scan_imports};
use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn Error>> {
    match &global.config {
        Some(config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                Ok(p.parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from(".")))
            } else {
                Ok(p)
            }
        }
        None => find_project_root(&std::env::current_dir()?),
    }
}

/// Recursively collects files with the given extension, sorted by path.
pub fn discover_source_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files = Vec::new();
    walk_dir(dir, extension, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<(), Box<dyn Error>> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, extension, files)?;
        } else if path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    Ok(())
}

/// Source units read from disk plus the warnings raised while linking them.
pub struct LoadedUnits {
    /// Every discovered unit, with resolved import edges.
    pub units: UnitSet,
    /// Unresolved imports, one warning each.
    pub warnings: Vec<Diagnostic>,
}

/// Reads every source file of the project and links their imports.
///
/// Unit identifiers are paths relative to the project root. Imports that do
/// not name a discovered unit are reported as warnings and dropped.
pub fn load_units(project_dir: &Path, config: &ProjectConfig) -> Result<LoadedUnits, Box<dyn Error>> {
    let src_dir = project_dir.join(&config.project.sources);
    let files = if src_dir.is_dir() {
        discover_source_files(&src_dir, &config.project.extension)?
    } else {
        Vec::new()
    };

    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let relative = path.strip_prefix(project_dir).unwrap_or(&path);
        let id = UnitId::new(relative.to_string_lossy().into_owned());
        let content = std::fs::read(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        sources.push((id, content));
    }
    let known: BTreeSet<&UnitId> = sources.iter().map(|(id, _)| id).collect();

    let mut warnings = Vec::new();
    let mut units = Vec::with_capacity(sources.len());
    for (id, content) in &sources {
        let mut unit = SourceUnit::new(id.clone(), content.clone());
        // Invalid UTF-8 is handed to the compiler untouched; only the import
        // scan sees the lossy text.
        for import in scan_imports(&String::from_utf8_lossy(content)) {
            match resolve_import(id, &import.path).filter(|dep| known.contains(dep)) {
                Some(dep) => unit = unit.with_dependency(dep),
                None => warnings.push(
                    Diagnostic::warning(
                        DiagnosticCode::UNRESOLVED_IMPORT,
                        format!("unresolved import \"{}\"", import.path),
                    )
                    .with_unit(id.clone())
                    .with_position(SourcePosition::new(import.line, import.column))
                    .with_note("the import is ignored for build ordering"),
                ),
            }
        }
        units.push(unit);
    }
    tracing::debug!(units = units.len(), unresolved = warnings.len(), "loaded source units");

    Ok(LoadedUnits {
        units: UnitSet::from_units(units)?,
        warnings,
    })
}

/// Warns about `[[overrides]]` entries that name no discovered unit.
///
/// Such an override never applies, so the file it meant to configure
/// compiles with the default settings.
pub fn unmatched_overrides(assignment: &SettingsAssignment, units: &UnitSet) -> Vec<Diagnostic> {
    assignment
        .overridden_units()
        .filter(|id| !units.contains(id))
        .map(|id| {
            Diagnostic::warning(
                DiagnosticCode::UNMATCHED_OVERRIDE,
                format!("override for \"{id}\" matches no source file"),
            )
            .with_note("override paths are relative to the project root")
        })
        .collect()
}

/// Registers one process compiler per `[toolchains]` entry.
///
/// Relative paths with a directory component are resolved against the
/// project root; bare program names are left for the `PATH` lookup. Each
/// compiler kills its child process once `timeout_secs` have passed.
pub fn build_registry(config: &ProjectConfig, project_dir: &Path) -> Result<ToolchainRegistry, Box<dyn Error>> {
    let timeout = config.build.timeout_secs.map(Duration::from_secs);
    let mut registry = ToolchainRegistry::new().with_timeout(timeout);
    for (version, program) in &config.toolchains {
        let version = CompilerVersion::parse(version)?;
        let program = if program.is_relative() && program.components().count() > 1 {
            project_dir.join(program)
        } else {
            program.clone()
        };
        registry.register(Arc::new(ProcessCompiler::new(version, program).with_timeout(timeout)));
    }
    Ok(registry)
}

/// Opens the artifact cache: on disk when enabled, in memory otherwise.
pub fn open_cache(config: &ProjectConfig, project_dir: &Path, use_disk: bool) -> Result<ArtifactCache, Box<dyn Error>> {
    let options = CacheOptions {
        max_entries: config.build.cache.max_entries,
    };
    if use_disk && config.build.cache.enabled {
        Ok(ArtifactCache::persistent(&project_dir.join(&config.build.cache.dir), options)?)
    } else {
        Ok(ArtifactCache::new(options))
    }
}

/// Renders diagnostics: text to stderr, JSON lines to stdout.
pub fn render_diagnostics<'a, I>(diagnostics: I, units: &UnitSet, format: ReportFormat, color: bool)
where
    I: IntoIterator<Item = &'a Diagnostic>,
{
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(color);
            for diag in diagnostics {
                eprintln!("{}", renderer.render(diag, units));
            }
        }
        ReportFormat::Json => {
            for diag in diagnostics {
                print!("{}", JsonRenderer.render(diag, units));
            }
        }
    }
}
