//! The compiler boundary: inputs, outputs, and the [`Compiler`] trait.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kiln_config::{CompilerVersion, Settings};
use kiln_diagnostics::Diagnostic;
use kiln_graph::{UnitGraph, UnitGroup};
use kiln_source::{SourceUnit, UnitId};
use serde_json::{json, Map, Value};

use crate::failure::CompilerFailure;

/// A compiler for one version.
///
/// Implementations must be deterministic and free of observable side
/// effects: the same input always yields the same output. The engine calls
/// `compile` from worker threads, possibly concurrently for different groups.
pub trait Compiler: Send + Sync {
    /// The version this compiler implements.
    fn version(&self) -> &CompilerVersion;

    /// Compiles one unit group.
    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerFailure>;
}

/// Everything a compiler sees for one group.
///
/// `sources` are the units being compiled. `dependencies` are the units of
/// every group they import from, directly or transitively, supplied so the
/// compiler can resolve imports; they are compiled by their own groups.
#[derive(Debug, Clone)]
pub struct CompilerInput {
    /// Unit contents keyed by unit identifier, in path order.
    pub sources: BTreeMap<UnitId, Vec<u8>>,
    /// Contents of imported units outside the group, in path order.
    pub dependencies: BTreeMap<UnitId, Vec<u8>>,
    /// The settings the group is compiled with.
    pub settings: Arc<Settings>,
}

impl CompilerInput {
    /// Collects the sources of `group` and of everything it imports.
    pub fn from_group(graph: &UnitGraph, group: &UnitGroup) -> Self {
        let sources = collect(group.units());
        let dependencies = graph
            .transitive_dependencies(group.index())
            .into_iter()
            .flat_map(|index| collect(graph.group(index).units()))
            .collect();
        Self {
            sources,
            dependencies,
            settings: Arc::clone(group.settings()),
        }
    }

    /// Renders the input as a standard-JSON style compiler request.
    ///
    /// Imported units are listed under `sources` next to the group's own;
    /// `outputSelection` names only the group's units. Contents that are not
    /// valid UTF-8 are converted lossily. Auxiliary flags are copied into
    /// `settings` verbatim as strings.
    pub fn to_standard_json(&self, language: &str) -> Value {
        let mut sources = Map::new();
        for (id, content) in self.dependencies.iter().chain(&self.sources) {
            sources.insert(
                id.as_str().to_string(),
                json!({ "content": String::from_utf8_lossy(content) }),
            );
        }
        let mut selection = Map::new();
        for id in self.sources.keys() {
            selection.insert(id.as_str().to_string(), json!({ "*": ["*"] }));
        }

        let optimizer = self.settings.optimizer();
        let mut settings = Map::new();
        settings.insert(
            "optimizer".to_string(),
            json!({
                "enabled": optimizer.enabled,
                "runs": optimizer.effective_runs().unwrap_or(0),
            }),
        );
        settings.insert("outputSelection".to_string(), Value::Object(selection));
        for (key, value) in self.settings.flags() {
            settings.insert(key.clone(), Value::String(value.clone()));
        }

        json!({
            "language": language,
            "version": self.settings.compiler_version().to_string(),
            "sources": sources,
            "settings": settings,
        })
    }
}

fn collect(units: &[SourceUnit]) -> BTreeMap<UnitId, Vec<u8>> {
    units
        .iter()
        .map(|u| (u.id.clone(), u.content.clone()))
        .collect()
}

/// A successful compilation.
///
/// `diagnostics` may hold warnings and notes. A compiler that reports any
/// error-severity diagnostic has failed, even if it also produced output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOutput {
    /// The compiled bytecode.
    pub bytecode: Vec<u8>,
    /// Interface metadata as JSON text.
    pub interface: String,
    /// Non-fatal diagnostics reported by the compiler.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilerOutput {
    /// Returns `true` if any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// A resolved toolchain, ready to invoke.
#[derive(Clone)]
pub struct CompilerHandle {
    pub(crate) version: CompilerVersion,
    pub(crate) compiler: Arc<dyn Compiler>,
}

impl CompilerHandle {
    /// The version this handle was resolved for.
    pub fn version(&self) -> &CompilerVersion {
        &self.version
    }
}

impl fmt::Debug for CompilerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerHandle")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::OptimizerSettings;

    fn input(optimizer: OptimizerSettings) -> CompilerInput {
        let settings = Settings::new(CompilerVersion::new(0, 8, 17), optimizer)
            .with_flag("evmVersion", "london");
        let mut sources = BTreeMap::new();
        sources.insert(UnitId::from("b.sol"), b"contract B {}".to_vec());
        sources.insert(UnitId::from("a.sol"), b"contract A {}".to_vec());
        let mut dependencies = BTreeMap::new();
        dependencies.insert(UnitId::from("lib/Math.sol"), b"library Math {}".to_vec());
        CompilerInput {
            sources,
            dependencies,
            settings: Arc::new(settings),
        }
    }

    #[test]
    fn standard_json_layout() {
        let json = input(OptimizerSettings::enabled(200)).to_standard_json("Solidity");
        assert_eq!(json["language"], "Solidity");
        assert_eq!(json["version"], "0.8.17");
        assert_eq!(json["sources"]["a.sol"]["content"], "contract A {}");
        assert_eq!(json["settings"]["optimizer"]["enabled"], true);
        assert_eq!(json["settings"]["optimizer"]["runs"], 200);
        assert_eq!(json["settings"]["evmVersion"], "london");
    }

    #[test]
    fn imported_units_are_sent_but_not_selected() {
        let json = input(OptimizerSettings::enabled(200)).to_standard_json("Solidity");
        assert_eq!(json["sources"]["lib/Math.sol"]["content"], "library Math {}");
        let selection = json["settings"]["outputSelection"].as_object().unwrap();
        let selected: Vec<&str> = selection.keys().map(String::as_str).collect();
        assert_eq!(selected, vec!["a.sol", "b.sol"]);
    }

    #[test]
    fn from_group_collects_transitive_imports() {
        use kiln_config::SettingsAssignment;
        use kiln_source::UnitSet;

        let units = UnitSet::from_units([
            SourceUnit::new("app.sol", "contract App is Token {}").with_dependency("token.sol"),
            SourceUnit::new("token.sol", "contract Token is Base {}").with_dependency("base.sol"),
            SourceUnit::new("base.sol", "contract Base {}"),
            SourceUnit::new("other.sol", "contract Other {}"),
        ])
        .unwrap();
        let settings = Settings::new(CompilerVersion::new(0, 8, 17), OptimizerSettings::enabled(200));
        let graph = UnitGraph::build(units, &SettingsAssignment::uniform(settings)).unwrap();
        let app = graph.group_of(&UnitId::from("app.sol")).unwrap();

        let input = CompilerInput::from_group(&graph, app);
        let sources: Vec<&str> = input.sources.keys().map(UnitId::as_str).collect();
        let dependencies: Vec<&str> = input.dependencies.keys().map(UnitId::as_str).collect();
        assert_eq!(sources, vec!["app.sol"]);
        assert_eq!(dependencies, vec!["base.sol", "token.sol"]);
        assert_eq!(input.settings.compiler_version(), &CompilerVersion::new(0, 8, 17));
    }

    #[test]
    fn disabled_optimizer_sends_zero_runs() {
        let json = input(OptimizerSettings {
            enabled: false,
            runs: 999,
        })
        .to_standard_json("Solidity");
        assert_eq!(json["settings"]["optimizer"]["enabled"], false);
        assert_eq!(json["settings"]["optimizer"]["runs"], 0);
    }

    #[test]
    fn output_error_detection() {
        use kiln_diagnostics::DiagnosticCode;
        let mut output = CompilerOutput::default();
        output
            .diagnostics
            .push(Diagnostic::warning(DiagnosticCode::COMPILER_WARNING, "unused"));
        assert!(!output.has_errors());
        output
            .diagnostics
            .push(Diagnostic::error(DiagnosticCode::COMPILER_ERROR, "bad"));
        assert!(output.has_errors());
    }
}
