//! Scripted in-process compilers and graph helpers shared by the build tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kiln_cache::{Artifact, ArtifactCache, EntryOrigin, Fingerprint};
use kiln_config::{CompilerVersion, OptimizerSettings, Settings, SettingsAssignment};
use kiln_diagnostics::{Diagnostic, DiagnosticCode};
use kiln_graph::UnitGraph;
use kiln_source::{SourceUnit, UnitSet};
use kiln_toolchain::{Compiler, CompilerFailure, CompilerInput, CompilerOutput, ToolchainRegistry};
use parking_lot::Mutex;

/// Content marker that makes the scripted compiler report an error.
pub const ERROR_MARKER: &str = "#error";
/// Content marker that makes the scripted compiler report a warning.
pub const WARNING_MARKER: &str = "#warn";
/// Content marker that makes the scripted compiler stall for `SLOW_FOR`.
pub const SLOW_MARKER: &str = "#slow";
pub const SLOW_FOR: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// A deterministic compiler whose behavior is driven by markers in the
/// source text. Records every invocation.
pub struct ScriptedCompiler {
    version: CompilerVersion,
    invocations: AtomicUsize,
    delay: Duration,
    log: Mutex<Vec<Event>>,
}

impl ScriptedCompiler {
    pub fn new(version: &str) -> Arc<Self> {
        Self::with_delay(version, Duration::ZERO)
    }

    pub fn with_delay(version: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            version: CompilerVersion::parse(version).unwrap(),
            invocations: AtomicUsize::new(0),
            delay,
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().clone()
    }
}

impl Compiler for ScriptedCompiler {
    fn version(&self) -> &CompilerVersion {
        &self.version
    }

    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerFailure> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let first = input
            .sources
            .keys()
            .next()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();
        self.log.lock().push(Event::Started(first.clone()));

        let mut bytecode = format!(
            "{}|{:?}|",
            input.settings.compiler_version(),
            input.settings.optimizer().effective_runs()
        )
        .into_bytes();
        let mut diagnostics = Vec::new();
        let mut slow = false;
        for (id, content) in &input.sources {
            let text = String::from_utf8_lossy(content);
            if text.contains(ERROR_MARKER) {
                diagnostics.push(
                    Diagnostic::error(DiagnosticCode::COMPILER_ERROR, "undeclared identifier")
                        .with_unit(id.clone()),
                );
            }
            if text.contains(WARNING_MARKER) {
                diagnostics.push(
                    Diagnostic::warning(DiagnosticCode::COMPILER_WARNING, "unused variable")
                        .with_unit(id.clone()),
                );
            }
            slow |= text.contains(SLOW_MARKER);
            bytecode.extend_from_slice(id.as_str().as_bytes());
            bytecode.extend_from_slice(content);
        }
        // Imported code is linked in, but its markers belong to its own group.
        for (id, content) in &input.dependencies {
            bytecode.push(b'+');
            bytecode.extend_from_slice(id.as_str().as_bytes());
            bytecode.extend_from_slice(content);
        }

        if slow {
            thread::sleep(SLOW_FOR);
        } else if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        self.log.lock().push(Event::Finished(first));
        Ok(CompilerOutput {
            bytecode,
            interface: "[]".to_string(),
            diagnostics,
        })
    }
}

/// A compiler that, while compiling `victim`, races it by storing different
/// bytes under the victim's fingerprint. Every other unit compiles normally.
pub struct SquattingCompiler {
    version: CompilerVersion,
    cache: Arc<ArtifactCache>,
    victim: String,
    fingerprint: Fingerprint,
    compiled: Mutex<Vec<String>>,
}

impl SquattingCompiler {
    pub fn new(version: &str, cache: Arc<ArtifactCache>, victim: &str, fingerprint: Fingerprint) -> Arc<Self> {
        Arc::new(Self {
            version: CompilerVersion::parse(version).unwrap(),
            cache,
            victim: victim.to_string(),
            fingerprint,
            compiled: Mutex::new(Vec::new()),
        })
    }

    /// First unit of every group compiled so far, in invocation order.
    pub fn compiled(&self) -> Vec<String> {
        self.compiled.lock().clone()
    }
}

impl Compiler for SquattingCompiler {
    fn version(&self) -> &CompilerVersion {
        &self.version
    }

    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerFailure> {
        let ids: Vec<String> = input.sources.keys().map(|id| id.as_str().to_string()).collect();
        if ids.contains(&self.victim) {
            let squatter = Artifact {
                fingerprint: self.fingerprint,
                bytecode: b"squatter".to_vec(),
                interface: "[]".to_string(),
                diagnostics: Vec::new(),
            };
            self.cache
                .store(squatter, &EntryOrigin::new("squatter", self.version.to_string()))
                .unwrap();
        }
        self.compiled.lock().extend(ids.first().cloned());
        Ok(CompilerOutput {
            bytecode: ids.concat().into_bytes(),
            interface: "[]".to_string(),
            diagnostics: Vec::new(),
        })
    }
}

pub fn settings(version: &str, runs: u32) -> Settings {
    Settings::new(
        CompilerVersion::parse(version).unwrap(),
        OptimizerSettings::enabled(runs),
    )
}

pub fn unit(id: &str, content: &str, deps: &[&str]) -> SourceUnit {
    SourceUnit::new(id, content).with_dependencies(deps.iter().copied())
}

pub fn graph(units: Vec<SourceUnit>, assignment: &SettingsAssignment) -> UnitGraph {
    UnitGraph::build(UnitSet::from_units(units).unwrap(), assignment).unwrap()
}

pub fn uniform_graph(units: Vec<SourceUnit>) -> UnitGraph {
    graph(units, &SettingsAssignment::uniform(settings("0.8.17", 200)))
}

pub fn registry_with<C: Compiler + 'static>(compilers: &[Arc<C>]) -> ToolchainRegistry {
    let mut registry = ToolchainRegistry::new();
    for compiler in compilers {
        registry.register(compiler.clone());
    }
    registry
}
