//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found")]
    NotFound,

    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid config value for '{field}': {hint}")]
    InvalidValue { field: String, hint: String },

    #[error("invalid module pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // figment extraction errors (file syntax, field types, env values)
    #[error("failed to load configuration: {0}")]
    Extraction(String),

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Suggested fix, when one is known.
    pub fn hint(&self) -> Option<&str> {
        match self {
            ConfigError::SchemaValidation { hint, .. } => hint.as_deref(),
            ConfigError::InvalidPattern { .. } => {
                Some("Use an exact module name or 'prefix.*' to match a package and its submodules")
            }
            ConfigError::Extraction(_) => Some("Check kiln.toml syntax and KILN_* environment variables"),
            _ => None,
        }
    }
}
