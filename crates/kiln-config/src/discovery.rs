//! File-based config discovery
//!
//! Handles finding Kiln configuration files in a project directory.

use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::{ConfigError, Result};

/// Conventional config file name.
pub const CONFIG_FILE: &str = "kiln.toml";

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    /// Create a new config discovery with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find `kiln.toml` in the root directory.
    pub fn find(&self) -> Option<PathBuf> {
        let path = self.root.join(CONFIG_FILE);
        path.is_file().then_some(path)
    }

    /// Load config from the discovered file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<BuildConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        BuildConfig::load(Some(&path))
    }

    /// Load the discovered file, or defaults plus environment when there is
    /// none.
    pub fn load_or_default(&self) -> Result<BuildConfig> {
        match self.find() {
            Some(path) => BuildConfig::load(Some(&path)),
            None => BuildConfig::load(None),
        }
    }
}

/// Discover and load config from the current directory (convenience function)
pub fn discover() -> Result<BuildConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load_or_default()
}
