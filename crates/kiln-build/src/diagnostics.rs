//! Build diagnostics.

use std::fmt;

use kiln_graph::ModuleId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// An import could not be located.
    MissingImport,
    /// A package enclosing a module could not be located.
    MissingAncestor,
    /// A module failed to parse without stopping the build.
    ParseError,
    /// A cache record could not be written.
    CacheWrite,
    /// Reported by the analysis driver.
    Analysis,
}

/// One message attached to a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub module: Option<ModuleId>,
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            module: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    pub fn in_module(mut self, module: ModuleId) -> Self {
        self.module = Some(module);
        self
    }

    pub fn at_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.module, self.line) {
            (Some(module), Some(line)) => write!(f, "{module}:{line}: ")?,
            (Some(module), None) => write!(f, "{module}: ")?,
            _ => {}
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diag = Diagnostic::error(DiagnosticKind::MissingImport, "Cannot find module 'x'")
            .in_module(ModuleId::new("a.b").unwrap())
            .at_line(Some(3));
        assert_eq!(diag.to_string(), "a.b:3: error: Cannot find module 'x'");

        let bare = Diagnostic::warning(DiagnosticKind::CacheWrite, "disk full");
        assert_eq!(bare.to_string(), "warning: disk full");
        assert!(!bare.is_error());
    }
}
