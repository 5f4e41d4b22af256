//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::BuildConfig;
use std::path::Path;

/// Name of the configuration file inside a build directory.
pub const CONFIG_FILE: &str = "hearth.toml";

/// Loads and validates a `hearth.toml` configuration from a build directory.
pub fn load_config(project_dir: &Path) -> Result<BuildConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `hearth.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<BuildConfig, ConfigError> {
    let config: BuildConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks required fields and that every dependency names a declared module.
fn validate_config(config: &BuildConfig) -> Result<(), ConfigError> {
    if config.target.name.is_empty() {
        return Err(ConfigError::MissingField("target.name".to_string()));
    }
    for (name, rules) in &config.modules {
        if rules.directory.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "modules.{name}.directory"
            )));
        }
        for dep in rules
            .public_dependencies
            .iter()
            .chain(&rules.private_dependencies)
        {
            if dep == name {
                return Err(ConfigError::ValidationError(format!(
                    "module '{name}' lists itself as a dependency"
                )));
            }
            if !config.modules.contains_key(dep) {
                return Err(ConfigError::UnknownModule {
                    module: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}
