//! Error types for settings validation and configuration loading.

/// A raw settings record failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSettings {
    /// The compiler version string is not a semantic version.
    #[error("invalid compiler version '{version}': {reason}")]
    Version {
        /// The rejected version string.
        version: String,
        /// Why the parse failed.
        reason: String,
    },

    /// The optimizer run count is negative.
    #[error("optimizer runs must be non-negative, got {runs}")]
    NegativeRuns {
        /// The rejected run count.
        runs: i64,
    },

    /// The optimizer run count does not fit in 32 bits.
    #[error("optimizer runs {runs} exceeds the maximum of {}", u32::MAX)]
    RunsOutOfRange {
        /// The rejected run count.
        runs: i64,
    },
}

/// Errors that can occur when loading or validating a `kiln.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A compiler settings block failed validation.
    #[error("invalid settings{}: {source}", .context.as_deref().map(|c| format!(" for {c}")).unwrap_or_default())]
    InvalidSettings {
        /// The override path the settings belong to, or `None` for the default block.
        context: Option<String>,
        /// The underlying validation failure.
        source: InvalidSettings,
    },
}
