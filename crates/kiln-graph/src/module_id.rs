use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dotted module name (`pkg.sub.mod`) used as the graph vertex key.
///
/// The name is stored behind an `Arc<str>` so cloning an id while walking the
/// graph never allocates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId(Arc<str>);

/// Errors that can occur when constructing a [`ModuleId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleIdError {
    #[error("module id is empty")]
    Empty,

    #[error("module id '{0}' contains an empty component")]
    EmptyComponent(String),

    #[error("module id '{id}' contains invalid character {ch:?}")]
    InvalidCharacter { id: String, ch: char },
}

impl ModuleId {
    /// Validate and construct a module id.
    ///
    /// Rejects empty names, empty components (`a..b`, leading or trailing
    /// dots), and characters that cannot appear in a dotted name (path
    /// separators and whitespace).
    pub fn new(name: impl AsRef<str>) -> Result<Self, ModuleIdError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(ModuleIdError::Empty);
        }
        if let Some(ch) = name
            .chars()
            .find(|c| matches!(c, '/' | '\\') || c.is_whitespace())
        {
            return Err(ModuleIdError::InvalidCharacter {
                id: name.to_string(),
                ch,
            });
        }
        if name.split('.').any(str::is_empty) {
            return Err(ModuleIdError::EmptyComponent(name.to_string()));
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dotted components, outermost package first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The immediately enclosing package, if any.
    pub fn parent(&self) -> Option<ModuleId> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| ModuleId(Arc::from(parent)))
    }

    /// All enclosing packages, nearest first (`a.b`, then `a`, for `a.b.c`).
    pub fn ancestors(&self) -> Vec<ModuleId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(parent) = current {
            current = parent.parent();
            ancestors.push(parent);
        }
        ancestors
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleId {
    type Error = ModuleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ModuleId::new(value)
    }
}

impl TryFrom<&str> for ModuleId {
    type Error = ModuleIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ModuleId::new(value)
    }
}

impl From<ModuleId> for String {
    fn from(id: ModuleId) -> Self {
        id.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(ModuleId::new(""), Err(ModuleIdError::Empty));
        assert!(matches!(
            ModuleId::new("a..b"),
            Err(ModuleIdError::EmptyComponent(_))
        ));
        assert!(matches!(
            ModuleId::new(".a"),
            Err(ModuleIdError::EmptyComponent(_))
        ));
        assert!(matches!(
            ModuleId::new("a."),
            Err(ModuleIdError::EmptyComponent(_))
        ));
        assert!(matches!(
            ModuleId::new("a/b"),
            Err(ModuleIdError::InvalidCharacter { ch: '/', .. })
        ));
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let id = ModuleId::new("a.b.c").unwrap();
        let names: Vec<_> = id.ancestors().iter().map(|a| a.to_string()).collect();
        assert_eq!(names, vec!["a.b", "a"]);
        assert_eq!(id.parent().unwrap().as_str(), "a.b");
        assert!(ModuleId::new("top").unwrap().ancestors().is_empty());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let id: ModuleId = serde_json::from_str("\"pkg.mod\"").unwrap();
        assert_eq!(id.as_str(), "pkg.mod");
        assert!(serde_json::from_str::<ModuleId>("\"pkg..mod\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"pkg.mod\"");
    }
}
