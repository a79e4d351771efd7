//! Schema validation for loaded configuration (no filesystem checks).

use crate::config::BuildConfig;
use crate::error::{ConfigError, Result};

/// Validate a configuration after all layers have been merged.
///
/// # Example
///
/// ```
/// use kiln_config::{BuildConfig, validate};
///
/// let mut config = BuildConfig::default();
/// validate(&config).unwrap();
///
/// config.layout.extensions.clear();
/// assert!(validate(&config).is_err());
/// ```
pub fn validate(config: &BuildConfig) -> Result<()> {
    if config.layout.package_marker.trim().is_empty() {
        return Err(ConfigError::SchemaValidation {
            message: "layout.package-marker cannot be empty".to_string(),
            hint: Some("Use the file stem that marks a directory as a package, e.g. \"__init__\"".to_string()),
        });
    }

    if config.layout.extensions.is_empty() {
        return Err(ConfigError::SchemaValidation {
            message: "layout.extensions cannot be empty".to_string(),
            hint: Some("List source extensions in preference order, e.g. [\"pyi\", \"py\"]".to_string()),
        });
    }

    for ext in &config.layout.extensions {
        if ext.is_empty() || ext.starts_with('.') {
            return Err(ConfigError::SchemaValidation {
                message: format!("invalid source extension '{ext}'"),
                hint: Some("Write extensions without the leading dot".to_string()),
            });
        }
    }

    if config.max_deferred_rounds == 0 {
        return Err(ConfigError::SchemaValidation {
            message: "max-deferred-rounds must be at least 1".to_string(),
            hint: None,
        });
    }

    if config.target_version.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "target-version".to_string(),
            hint: "target-version names the cache subdirectory and cannot be empty".to_string(),
        });
    }

    for module in &config.prelude {
        if module.is_empty() || module.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "prelude".to_string(),
                hint: format!("'{module}' is not a valid module name"),
            });
        }
    }

    Ok(())
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(BuildConfig::default().validate().is_ok());

        let mut config = BuildConfig::default();
        config.layout.package_marker = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = BuildConfig::default();
        config.layout.extensions = vec![".py".to_string()];
        assert!(config.validate().is_err());

        let config = BuildConfig {
            max_deferred_rounds: 0,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BuildConfig {
            prelude: vec!["builtins..x".to_string()],
            ..BuildConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
