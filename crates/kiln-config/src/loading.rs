use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};

use crate::config::BuildConfig;
use crate::error::{ConfigError, Result};
use crate::validation::validate;

/// Environment variable prefix. `KILN_CACHE_DIR` sets `cache-dir`,
/// `KILN_LAYOUT__PACKAGE_MARKER` sets `layout.package-marker`.
pub const ENV_PREFIX: &str = "KILN_";

impl BuildConfig {
    /// Load configuration from multiple sources.
    /// Priority: environment variables > config file > defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(BuildConfig::default()));

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(env_provider());

        let config: BuildConfig = figment
            .extract()
            .map_err(|e| ConfigError::Extraction(e.to_string()))?;
        validate(&config)?;

        tracing::debug!(
            search_paths = config.search_paths.len(),
            cache_dir = %config.cache_dir.display(),
            incremental = config.incremental,
            "Loaded build configuration"
        );
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults, without environment
    /// variables.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BuildConfig = Figment::new()
            .merge(Serialized::defaults(BuildConfig::default()))
            .merge(Toml::string(content))
            .extract()
            .map_err(|e| ConfigError::Extraction(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            hint: e.to_string(),
        })
    }
}

/// `KILN_*` variables with `__` as the nesting separator and `_` mapped to
/// the `-` of kebab-case keys.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| {
        key.as_str()
            .replace("__", ".")
            .replace('_', "-")
            .into()
    })
}
