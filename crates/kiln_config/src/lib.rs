//! Settings model and `kiln.toml` project configuration.
//!
//! This crate validates raw settings records into immutable [`Settings`]
//! values, parses the project configuration file into a strongly-typed
//! [`ProjectConfig`], and resolves per-unit settings overrides into a
//! [`SettingsAssignment`].

#![warn(missing_docs)]

pub mod assignment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod types;
pub mod version;

pub use assignment::{resolve_assignment, SettingsAssignment};
pub use error::{ConfigError, InvalidSettings};
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use settings::{OptimizerSettings, RawOptimizer, RawSettings, Settings};
pub use types::*;
pub use version::CompilerVersion;
