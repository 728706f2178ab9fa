//! The settings model: raw records and their validated, immutable form.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::InvalidSettings;
use crate::version::CompilerVersion;

/// Optimizer run count used when a record omits `runs`.
pub const DEFAULT_OPTIMIZER_RUNS: i64 = 200;

fn default_runs() -> i64 {
    DEFAULT_OPTIMIZER_RUNS
}

/// An unvalidated settings record, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawSettings {
    /// Compiler version string, e.g. `"0.8.17"`.
    pub version: String,
    /// Optimizer block.
    #[serde(default)]
    pub optimizer: RawOptimizer,
    /// Auxiliary flags passed through to the compiler untouched.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

/// An unvalidated optimizer block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawOptimizer {
    /// Whether the optimizer is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Optimizer run count; may be negative here and is rejected on validation.
    #[serde(default = "default_runs")]
    pub runs: i64,
}

impl Default for RawOptimizer {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: DEFAULT_OPTIMIZER_RUNS,
        }
    }
}

/// Validated optimizer parameters.
///
/// `runs` only matters when the optimizer is enabled: a disabled optimizer
/// compares and hashes equal regardless of its stored run count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Whether the optimizer is enabled.
    pub enabled: bool,
    /// Optimizer run count as configured.
    pub runs: u32,
}

impl OptimizerSettings {
    /// An enabled optimizer with the given run count.
    pub fn enabled(runs: u32) -> Self {
        Self {
            enabled: true,
            runs,
        }
    }

    /// A disabled optimizer.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            runs: 0,
        }
    }

    /// The run count that influences compilation: `runs` if enabled, otherwise `None`.
    pub fn effective_runs(&self) -> Option<u32> {
        self.enabled.then_some(self.runs)
    }

    fn from_raw(raw: &RawOptimizer) -> Result<Self, InvalidSettings> {
        if raw.runs < 0 {
            return Err(InvalidSettings::NegativeRuns { runs: raw.runs });
        }
        let runs =
            u32::try_from(raw.runs).map_err(|_| InvalidSettings::RunsOutOfRange { runs: raw.runs })?;
        Ok(Self {
            enabled: raw.enabled,
            runs,
        })
    }
}

impl PartialEq for OptimizerSettings {
    fn eq(&self, other: &Self) -> bool {
        self.effective_runs() == other.effective_runs()
    }
}

impl Eq for OptimizerSettings {}

impl Hash for OptimizerSettings {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.effective_runs().hash(state);
    }
}

/// One immutable compilation configuration.
///
/// Compared by structural equality; two settings that compare equal always
/// produce the same fingerprint for the same sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Settings {
    compiler_version: CompilerVersion,
    optimizer: OptimizerSettings,
    flags: BTreeMap<String, String>,
}

impl Settings {
    /// Creates settings with no auxiliary flags.
    pub fn new(compiler_version: CompilerVersion, optimizer: OptimizerSettings) -> Self {
        Self {
            compiler_version,
            optimizer,
            flags: BTreeMap::new(),
        }
    }

    /// Validates a raw settings record.
    ///
    /// Unknown auxiliary flags are kept as-is and never interpreted.
    pub fn from_raw(raw: &RawSettings) -> Result<Self, InvalidSettings> {
        Ok(Self {
            compiler_version: CompilerVersion::parse(&raw.version)?,
            optimizer: OptimizerSettings::from_raw(&raw.optimizer)?,
            flags: raw.flags.clone(),
        })
    }

    /// Returns a copy of these settings with an extra auxiliary flag.
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of these settings with a different optimizer block.
    pub fn with_optimizer(mut self, optimizer: OptimizerSettings) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// The compiler version these settings bind to.
    pub fn compiler_version(&self) -> &CompilerVersion {
        &self.compiler_version
    }

    /// The optimizer parameters.
    pub fn optimizer(&self) -> &OptimizerSettings {
        &self.optimizer
    }

    /// Auxiliary flags, in key order.
    pub fn flags(&self) -> &BTreeMap<String, String> {
        &self.flags
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compiler_version)?;
        match self.optimizer.effective_runs() {
            Some(runs) => write!(f, " optimizer runs={runs}")?,
            None => f.write_str(" optimizer off")?,
        }
        for (key, value) in &self.flags {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}
