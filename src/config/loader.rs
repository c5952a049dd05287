//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{GuardConfig, SecretString};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `csrf.secret`.
pub const SECRET_ENV_VAR: &str = "REQUEST_GUARD_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, std::env::var(SECRET_ENV_VAR).ok())
}

/// Parse and validate configuration text, applying the secret override if given.
pub fn parse_config(content: &str, secret_override: Option<String>) -> Result<GuardConfig, ConfigError> {
    let mut config: GuardConfig = toml::from_str(content)?;

    if let Some(secret) = secret_override.filter(|s| !s.is_empty()) {
        config.csrf.secret = Some(SecretString::new(secret));
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
