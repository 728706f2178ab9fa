//! Configuration file loading and validation.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::settings::Settings;
use crate::types::ProjectConfig;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields, numeric bounds, and every settings block.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.compiler.version.trim().is_empty() {
        return Err(ConfigError::MissingField("compiler.version".to_string()));
    }
    if config.build.jobs == Some(0) {
        return Err(ConfigError::ValidationError(
            "build.jobs must be at least 1".to_string(),
        ));
    }
    if config.build.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "build.timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.build.cache.max_entries == Some(0) {
        return Err(ConfigError::ValidationError(
            "build.cache.max_entries must be at least 1".to_string(),
        ));
    }

    Settings::from_raw(&config.compiler).map_err(|source| ConfigError::InvalidSettings {
        context: None,
        source,
    })?;

    let mut seen = BTreeSet::new();
    for ov in &config.overrides {
        if !seen.insert(ov.path.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate override for '{}'",
                ov.path
            )));
        }
        Settings::from_raw(&ov.apply(&config.compiler)).map_err(|source| {
            ConfigError::InvalidSettings {
                context: Some(ov.path.clone()),
                source,
            }
        })?;
    }

    for version in config.toolchains.keys() {
        crate::version::CompilerVersion::parse(version).map_err(|source| {
            ConfigError::InvalidSettings {
                context: Some(format!("toolchain '{version}'")),
                source,
            }
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidSettings;
    use std::path::PathBuf;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8.17"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "token");
        assert_eq!(config.project.sources, PathBuf::from("contracts"));
        assert_eq!(config.project.extension, "sol");
        assert_eq!(config.compiler.version, "0.8.17");
        assert!(!config.compiler.optimizer.enabled);
        assert!(config.overrides.is_empty());
        assert!(config.build.cache.enabled);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "token"
version = "1.2.0"
sources = "src"
extension = "sol"
out = "build"

[compiler]
version = "0.8.17"

[compiler.optimizer]
enabled = true
runs = 200

[compiler.flags]
evmVersion = "london"

[[overrides]]
path = "src/Legacy.sol"
version = "0.7.6"

[[overrides]]
path = "src/Hot.sol"
optimizer = { runs = 10000 }

[toolchains]
"0.8.17" = "/opt/solc/solc-0.8.17"
"0.7.6" = "/opt/solc/solc-0.7.6"

[build]
jobs = 4
timeout_secs = 120

[build.cache]
dir = ".cache/kiln"
max_entries = 512
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.version, "1.2.0");
        assert_eq!(config.project.out, PathBuf::from("build"));
        assert!(config.compiler.optimizer.enabled);
        assert_eq!(config.compiler.optimizer.runs, 200);
        assert_eq!(config.compiler.flags["evmVersion"], "london");
        assert_eq!(config.overrides.len(), 2);
        assert_eq!(config.overrides[1].optimizer.as_ref().unwrap().runs, Some(10000));
        assert_eq!(config.toolchains.len(), 2);
        assert_eq!(config.build.jobs, Some(4));
        assert_eq!(config.build.timeout_secs, Some(120));
        assert_eq!(config.build.cache.max_entries, Some(512));
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""

[compiler]
version = "0.8.17"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "project.name"));
    }

    #[test]
    fn missing_compiler_block_is_parse_error() {
        let toml = r#"
[project]
name = "token"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn bad_version_is_invalid_settings() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSettings {
                context: None,
                source: InvalidSettings::Version { .. }
            }
        ));
    }

    #[test]
    fn negative_runs_is_invalid_settings() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8.17"
optimizer = { enabled = true, runs = -1 }
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSettings {
                source: InvalidSettings::NegativeRuns { runs: -1 },
                ..
            }
        ));
    }

    #[test]
    fn bad_override_names_its_path() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8.17"

[[overrides]]
path = "contracts/Old.sol"
version = "ancient"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        match err {
            ConfigError::InvalidSettings { context, .. } => {
                assert_eq!(context.as_deref(), Some("contracts/Old.sol"));
            }
            other => panic!("expected InvalidSettings, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_override_errors() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8.17"

[[overrides]]
path = "a.sol"

[[overrides]]
path = "a.sol"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_jobs_errors() {
        let toml = r#"
[project]
name = "token"

[compiler]
version = "0.8.17"

[build]
jobs = 0
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"disk\"\n\n[compiler]\nversion = \"0.8.17\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "disk");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
