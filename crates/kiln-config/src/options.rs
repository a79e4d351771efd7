//! Analysis options and per-module overrides.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Options handed to the analysis driver for one module.
///
/// Two modules analyzed with different effective options never share a cache
/// record: the options are fingerprinted into every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnalysisOptions {
    pub strict: bool,
    /// Suppress every diagnostic reported for the module.
    pub ignore_errors: bool,
    pub warn_unused_ignores: bool,
    /// Driver-specific boolean flags.
    pub flags: BTreeMap<String, bool>,
}

/// Partial options applied on top of the base options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OptionsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn_unused_ignores: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
}

impl OptionsPatch {
    pub fn apply(&self, options: &mut AnalysisOptions) {
        if let Some(strict) = self.strict {
            options.strict = strict;
        }
        if let Some(ignore_errors) = self.ignore_errors {
            options.ignore_errors = ignore_errors;
        }
        if let Some(warn) = self.warn_unused_ignores {
            options.warn_unused_ignores = warn;
        }
        for (flag, value) in &self.flags {
            options.flags.insert(flag.clone(), *value);
        }
    }
}

/// Module name pattern: an exact dotted name, or `prefix.*` matching the
/// prefix itself and every module below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModulePattern {
    Exact(String),
    Package(String),
}

impl ModulePattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let (name, package) = match pattern.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };
        if name.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if name.contains('*') {
            return Err(invalid("'*' is only allowed as a trailing '.*'"));
        }
        if name.split('.').any(str::is_empty) {
            return Err(invalid("pattern contains an empty component"));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
            return Err(invalid("pattern contains whitespace or a path separator"));
        }

        Ok(if package {
            ModulePattern::Package(name.to_string())
        } else {
            ModulePattern::Exact(name.to_string())
        })
    }

    pub fn matches(&self, module: &str) -> bool {
        match self {
            ModulePattern::Exact(name) => module == name,
            ModulePattern::Package(prefix) => {
                module == prefix
                    || (module.len() > prefix.len()
                        && module.starts_with(prefix.as_str())
                        && module.as_bytes()[prefix.len()] == b'.')
            }
        }
    }
}

impl fmt::Display for ModulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModulePattern::Exact(name) => f.write_str(name),
            ModulePattern::Package(prefix) => write!(f, "{prefix}.*"),
        }
    }
}

impl TryFrom<String> for ModulePattern {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ModulePattern::parse(&value)
    }
}

impl From<ModulePattern> for String {
    fn from(pattern: ModulePattern) -> Self {
        pattern.to_string()
    }
}

/// Options applied to every module matching `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleOverride {
    pub pattern: ModulePattern,
    #[serde(default)]
    pub options: OptionsPatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_package_patterns() {
        let exact = ModulePattern::parse("pkg.mod").unwrap();
        assert!(exact.matches("pkg.mod"));
        assert!(!exact.matches("pkg.mod.sub"));

        let package = ModulePattern::parse("pkg.*").unwrap();
        assert!(package.matches("pkg"));
        assert!(package.matches("pkg.mod.sub"));
        assert!(!package.matches("pkgx"));
        assert_eq!(package.to_string(), "pkg.*");
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in ["", ".*", "a..b", "a.*.b", "*", "a b", "a/b"] {
            assert!(
                matches!(
                    ModulePattern::parse(bad),
                    Err(ConfigError::InvalidPattern { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn patch_overrides_only_set_fields() {
        let mut options = AnalysisOptions {
            strict: true,
            ..Default::default()
        };
        let patch = OptionsPatch {
            ignore_errors: Some(true),
            flags: BTreeMap::from([("extra".to_string(), true)]),
            ..Default::default()
        };
        patch.apply(&mut options);
        assert!(options.strict);
        assert!(options.ignore_errors);
        assert_eq!(options.flags.get("extra"), Some(&true));
    }
}
