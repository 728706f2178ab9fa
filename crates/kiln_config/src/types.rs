//! Configuration types deserialized from `kiln.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::settings::RawSettings;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata and source layout.
    pub project: ProjectMeta,
    /// The default compiler settings applied to every unit.
    pub compiler: RawSettings,
    /// Per-unit settings overrides.
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
    /// Installed compiler executables, keyed by version string.
    #[serde(default)]
    pub toolchains: BTreeMap<String, PathBuf>,
    /// Build engine settings (parallelism, timeout, cache).
    #[serde(default)]
    pub build: BuildConfig,
}

/// Project metadata and where to find sources.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
    /// Directory (relative to the project root) holding source units.
    #[serde(default = "default_sources")]
    pub sources: PathBuf,
    /// File extension identifying source units.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Directory (relative to the project root) receiving compiled artifacts.
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_sources() -> PathBuf {
    PathBuf::from("contracts")
}

fn default_extension() -> String {
    "sol".to_string()
}

fn default_out() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Settings override for a single source unit.
///
/// Any field left out falls back to the `[compiler]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideConfig {
    /// Unit identifier (path relative to the project root) the override applies to.
    pub path: String,
    /// Compiler version for this unit.
    pub version: Option<String>,
    /// Optimizer parameters for this unit.
    pub optimizer: Option<OptimizerOverride>,
    /// Extra auxiliary flags, merged over the default flags.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

/// Partial optimizer block used by overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptimizerOverride {
    /// Overrides `enabled` when present.
    pub enabled: Option<bool>,
    /// Overrides `runs` when present.
    pub runs: Option<i64>,
}

impl OverrideConfig {
    /// Applies this override on top of a base raw settings record.
    pub fn apply(&self, base: &RawSettings) -> RawSettings {
        let mut merged = base.clone();
        if let Some(version) = &self.version {
            merged.version = version.clone();
        }
        if let Some(opt) = &self.optimizer {
            if let Some(enabled) = opt.enabled {
                merged.optimizer.enabled = enabled;
            }
            if let Some(runs) = opt.runs {
                merged.optimizer.runs = runs;
            }
        }
        for (key, value) in &self.flags {
            merged.flags.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Build engine configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BuildConfig {
    /// Maximum number of concurrent compiler invocations. Defaults to the
    /// available parallelism of the machine.
    pub jobs: Option<usize>,
    /// Per-invocation timeout in seconds. No timeout when absent.
    pub timeout_secs: Option<u64>,
    /// Artifact cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Artifact cache configuration.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Whether artifacts are cached on disk between builds.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache directory, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Maximum number of cached artifacts; unbounded when absent.
    pub max_entries: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".kiln-cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            max_entries: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RawOptimizer;

    fn base() -> RawSettings {
        RawSettings {
            version: "0.8.17".to_string(),
            optimizer: RawOptimizer {
                enabled: true,
                runs: 200,
            },
            flags: BTreeMap::from([("evmVersion".to_string(), "london".to_string())]),
        }
    }

    #[test]
    fn override_apply_partial() {
        let ov = OverrideConfig {
            path: "contracts/Legacy.sol".to_string(),
            version: Some("0.7.6".to_string()),
            optimizer: Some(OptimizerOverride {
                enabled: None,
                runs: Some(1000),
            }),
            flags: BTreeMap::new(),
        };
        let merged = ov.apply(&base());
        assert_eq!(merged.version, "0.7.6");
        assert!(merged.optimizer.enabled);
        assert_eq!(merged.optimizer.runs, 1000);
        assert_eq!(merged.flags["evmVersion"], "london");
    }

    #[test]
    fn override_flags_merge_over_base() {
        let ov = OverrideConfig {
            path: "a.sol".to_string(),
            version: None,
            optimizer: None,
            flags: BTreeMap::from([
                ("evmVersion".to_string(), "paris".to_string()),
                ("viaIR".to_string(), "true".to_string()),
            ]),
        };
        let merged = ov.apply(&base());
        assert_eq!(merged.version, "0.8.17");
        assert_eq!(merged.flags["evmVersion"], "paris");
        assert_eq!(merged.flags["viaIR"], "true");
    }

    #[test]
    fn cache_config_defaults() {
        let c = CacheConfig::default();
        assert!(c.enabled);
        assert_eq!(c.dir, PathBuf::from(".kiln-cache"));
        assert!(c.max_entries.is_none());
    }
}
