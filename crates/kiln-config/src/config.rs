//! Top-level build configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::options::{AnalysisOptions, ModuleOverride, ModulePattern};

/// How modules map onto files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LayoutConfig {
    /// File stem marking a directory as a package (`<marker>.<ext>`).
    pub package_marker: String,
    /// Source extensions without the dot, most preferred first.
    pub extensions: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            package_marker: default_package_marker(),
            extensions: default_extensions(),
        }
    }
}

/// Configuration for one build invocation.
///
/// Keys are kebab-case in `kiln.toml`:
///
/// ```toml
/// search-paths = ["src", "vendor"]
/// cache-dir = ".kiln_cache"
/// exclude = ["tests.*"]
///
/// [options]
/// strict = true
///
/// [[overrides]]
/// pattern = "legacy.*"
/// options = { ignore-errors = true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildConfig {
    /// Directories searched for modules, in priority order.
    pub search_paths: Vec<PathBuf>,
    pub cache_dir: PathBuf,
    /// Read cache records during graph construction.
    pub incremental: bool,
    /// Write cache records after processing.
    pub write_cache: bool,
    /// Namespaces cache records; one cache directory per target.
    pub target_version: String,
    /// Records written by a different tool version are never reused.
    pub tool_version: String,
    pub layout: LayoutConfig,
    /// Modules every other module implicitly depends on.
    pub prelude: Vec<String>,
    /// Modules that are never followed. Imports of them are suppressed
    /// without a diagnostic.
    pub exclude: Vec<ModulePattern>,
    /// Do not report imports that cannot be located.
    pub ignore_missing_imports: bool,
    /// Load fresh modules still queued when the build ends.
    pub load_all_fresh: bool,
    /// Upper bound on deferred type-check rounds per SCC.
    pub max_deferred_rounds: u32,
    pub options: AnalysisOptions,
    /// Per-module option overrides; later entries win.
    pub overrides: Vec<ModuleOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            cache_dir: default_cache_dir(),
            incremental: true,
            write_cache: true,
            target_version: default_target_version(),
            tool_version: default_tool_version(),
            layout: LayoutConfig::default(),
            prelude: Vec::new(),
            exclude: Vec::new(),
            ignore_missing_imports: false,
            load_all_fresh: false,
            max_deferred_rounds: default_max_deferred_rounds(),
            options: AnalysisOptions::default(),
            overrides: Vec::new(),
            log_level: None,
        }
    }
}

impl BuildConfig {
    /// Effective analysis options for `module`.
    pub fn options_for(&self, module: &str) -> AnalysisOptions {
        let mut options = self.options.clone();
        for entry in &self.overrides {
            if entry.pattern.matches(module) {
                entry.options.apply(&mut options);
            }
        }
        options
    }

    pub fn is_excluded(&self, module: &str) -> bool {
        self.exclude.iter().any(|pattern| pattern.matches(module))
    }

    /// Builder-style helpers for programmatic configuration.
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

pub fn default_cache_dir() -> PathBuf {
    PathBuf::from(".kiln_cache")
}

pub fn default_target_version() -> String {
    "3".to_string()
}

pub fn default_tool_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub fn default_package_marker() -> String {
    "__init__".to_string()
}

pub fn default_extensions() -> Vec<String> {
    vec!["pyi".to_string(), "py".to_string()]
}

pub fn default_max_deferred_rounds() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionsPatch;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from(".kiln_cache"));
        assert_eq!(config.target_version, "3");
        assert!(config.incremental);
        assert!(config.write_cache);
        assert!(!config.load_all_fresh);
        assert_eq!(config.layout.package_marker, "__init__");
        assert_eq!(config.layout.extensions, vec!["pyi", "py"]);
        assert_eq!(config.max_deferred_rounds, 20);
    }

    #[test]
    fn test_later_overrides_win() {
        let config = BuildConfig {
            overrides: vec![
                ModuleOverride {
                    pattern: ModulePattern::parse("app.*").unwrap(),
                    options: OptionsPatch {
                        strict: Some(true),
                        ..Default::default()
                    },
                },
                ModuleOverride {
                    pattern: ModulePattern::parse("app.legacy").unwrap(),
                    options: OptionsPatch {
                        strict: Some(false),
                        ignore_errors: Some(true),
                        ..Default::default()
                    },
                },
            ],
            ..BuildConfig::default()
        };

        assert!(config.options_for("app.core").strict);
        let legacy = config.options_for("app.legacy");
        assert!(!legacy.strict);
        assert!(legacy.ignore_errors);
        assert_eq!(config.options_for("other"), AnalysisOptions::default());
    }

    #[test]
    fn test_serialization_uses_kebab_case() {
        let json = serde_json::to_value(BuildConfig::default()).unwrap();
        assert!(json.get("search-paths").is_some());
        assert!(json.get("max-deferred-rounds").is_some());
        assert!(json.get("search_paths").is_none());
        assert!(json.get("log-level").is_none());
    }

    #[test]
    fn test_exclusion() {
        let config = BuildConfig {
            exclude: vec![ModulePattern::parse("tests.*").unwrap()],
            ..BuildConfig::default()
        };
        assert!(config.is_excluded("tests"));
        assert!(config.is_excluded("tests.unit"));
        assert!(!config.is_excluded("testsuite"));
    }
}
