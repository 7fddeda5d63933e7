//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ClientConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Environment;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ClientConfig =
            toml::from_str("base_url = \"https://api.example.test\"").unwrap();
        assert_eq!(config.retries.max_retries, 3);
        assert_eq!(config.timeouts.request_ms, 30_000);
        assert_eq!(config.environment, Environment::Development);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_environment_parses_lowercase() {
        let config: ClientConfig = toml::from_str(
            "base_url = \"https://api.example.test\"\nenvironment = \"production\"",
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.demo_auth_allowed());
    }
}
