use std::fmt;

use serde::{Deserialize, Serialize};

/// Strength of an import edge. Lower is stronger.
///
/// The derived `Ord` follows declaration order, so `High < Medium < ... < All`.
/// `All` is a sentinel ceiling meaning "no filtering" and never appears on a
/// real edge.
/// Missing priority entries default to `High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    /// `from x import y`: names are needed during semantic analysis.
    #[default]
    High,
    /// Plain top-level `import x`.
    Medium,
    /// Import inside a function body or otherwise deferred.
    Low,
    /// Import guarded by a static-analysis-only condition.
    ConditionalAnalysisOnly,
    /// Edge added for a module reachable only through another import.
    Indirect,
    /// Ceiling that admits every edge.
    All,
}

impl Priority {
    /// Every level, strongest first.
    pub const LEVELS: [Priority; 6] = [
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::ConditionalAnalysisOnly,
        Priority::Indirect,
        Priority::All,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::ConditionalAnalysisOnly => "conditional-analysis-only",
            Priority::Indirect => "indirect",
            Priority::All => "all",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
