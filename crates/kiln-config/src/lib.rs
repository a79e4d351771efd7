//! # kiln-config
//!
//! Build configuration for kiln.
//!
//! Configuration is layered with figment: built-in defaults, then an optional
//! `kiln.toml`, then `KILN_*` environment variables. The merged result is
//! validated before it is handed to a build.
//!
//! ```no_run
//! use kiln_config::ConfigDiscovery;
//!
//! let config = ConfigDiscovery::new(".").load_or_default()?;
//! let options = config.options_for("app.models");
//! # Ok::<(), kiln_config::ConfigError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod loading;
pub mod options;
pub mod validation;

pub use config::{BuildConfig, LayoutConfig};
pub use discovery::{CONFIG_FILE, ConfigDiscovery, discover};
pub use error::{ConfigError, Result};
pub use options::{AnalysisOptions, ModuleOverride, ModulePattern, OptionsPatch};
pub use validation::validate;
