//! Per-unit settings assignment: a default plus path-keyed overrides.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kiln_source::UnitId;

use crate::error::ConfigError;
use crate::settings::Settings;
use crate::types::ProjectConfig;
use crate::version::CompilerVersion;

/// Maps every source unit to the settings it compiles with.
///
/// Units without an override use the default settings. Settings are shared
/// behind `Arc` so groups and workers can hold them without copying.
#[derive(Debug, Clone)]
pub struct SettingsAssignment {
    default: Arc<Settings>,
    overrides: BTreeMap<UnitId, Arc<Settings>>,
}

impl SettingsAssignment {
    /// Assigns the same settings to every unit.
    pub fn uniform(settings: Settings) -> Self {
        Self {
            default: Arc::new(settings),
            overrides: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) the override for one unit.
    pub fn with_override(mut self, unit: impl Into<UnitId>, settings: Settings) -> Self {
        self.overrides.insert(unit.into(), Arc::new(settings));
        self
    }

    /// Returns the settings assigned to a unit.
    pub fn settings_for(&self, unit: &UnitId) -> &Arc<Settings> {
        self.overrides.get(unit).unwrap_or(&self.default)
    }

    /// The default settings.
    pub fn default_settings(&self) -> &Arc<Settings> {
        &self.default
    }

    /// Units that carry an override, in identifier order.
    pub fn overridden_units(&self) -> impl Iterator<Item = &UnitId> {
        self.overrides.keys()
    }

    /// Every compiler version referenced by the default or an override.
    pub fn versions(&self) -> BTreeSet<CompilerVersion> {
        std::iter::once(&self.default)
            .chain(self.overrides.values())
            .map(|s| s.compiler_version().clone())
            .collect()
    }
}

/// Resolves the settings assignment described by a project configuration.
pub fn resolve_assignment(config: &ProjectConfig) -> Result<SettingsAssignment, ConfigError> {
    let default =
        Settings::from_raw(&config.compiler).map_err(|source| ConfigError::InvalidSettings {
            context: None,
            source,
        })?;

    let mut assignment = SettingsAssignment::uniform(default);
    for ov in &config.overrides {
        let settings = Settings::from_raw(&ov.apply(&config.compiler)).map_err(|source| {
            ConfigError::InvalidSettings {
                context: Some(ov.path.clone()),
                source,
            }
        })?;
        assignment = assignment.with_override(UnitId::new(ov.path.as_str()), settings);
    }
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;
    use crate::settings::OptimizerSettings;

    #[test]
    fn uniform_assigns_default() {
        let s = Settings::new(CompilerVersion::new(0, 8, 17), OptimizerSettings::enabled(200));
        let a = SettingsAssignment::uniform(s.clone());
        assert_eq!(**a.settings_for(&UnitId::from("any.sol")), s);
        assert_eq!(a.versions().len(), 1);
    }

    #[test]
    fn override_wins_for_its_unit_only() {
        let base = Settings::new(CompilerVersion::new(0, 8, 17), OptimizerSettings::enabled(200));
        let legacy = Settings::new(CompilerVersion::new(0, 7, 6), OptimizerSettings::disabled());
        let a = SettingsAssignment::uniform(base.clone()).with_override("Legacy.sol", legacy.clone());
        assert_eq!(**a.settings_for(&UnitId::from("Legacy.sol")), legacy);
        assert_eq!(**a.settings_for(&UnitId::from("Token.sol")), base);
        let versions: Vec<_> = a.versions().into_iter().map(|v| v.to_string()).collect();
        assert_eq!(versions, vec!["0.7.6", "0.8.17"]);
    }

    #[test]
    fn resolve_from_config() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8.17"
optimizer = { enabled = true, runs = 200 }

[[overrides]]
path = "contracts/Hot.sol"
optimizer = { runs = 10000 }
"#;
        let config = load_config_from_str(toml).unwrap();
        let a = resolve_assignment(&config).unwrap();
        let overridden: Vec<&str> = a.overridden_units().map(UnitId::as_str).collect();
        assert_eq!(overridden, vec!["contracts/Hot.sol"]);
        let hot = a.settings_for(&UnitId::from("contracts/Hot.sol"));
        assert_eq!(hot.optimizer().effective_runs(), Some(10000));
        assert_eq!(hot.compiler_version(), &CompilerVersion::new(0, 8, 17));
        let other = a.settings_for(&UnitId::from("contracts/Token.sol"));
        assert_eq!(other.optimizer().effective_runs(), Some(200));
    }
}
