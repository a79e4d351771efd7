#![cfg_attr(docsrs, feature(doc_cfg))]

//! # kiln-build
//!
//! Incremental module builds: graph discovery, cache freshness and SCC
//! scheduling on top of [`kiln_graph`] and [`kiln_config`].
//!
//! A build runs in three phases:
//!
//! 1. **Discovery** ([`ModuleGraphBuilder`](loader)): starting at the roots,
//!    every imported module and enclosing package is located on the search
//!    path and either seeded from a validated cache record or parsed by the
//!    [`AnalysisDriver`].
//! 2. **Decomposition**: the graph is split into strongly connected
//!    components, leaves first.
//! 3. **Processing**: fresh SCCs are loaded from cache only
//!    when something stale depends on them; stale SCCs run through every
//!    [`Pass`] and are written back.
//!
//! Parsing and analysis are delegated to an [`AnalysisDriver`]. The
//! [`ScriptDriver`] is a small reference driver for a line-oriented module
//! language, used throughout the tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kiln_build::runtime::MemoryRuntime;
//! use kiln_build::{Build, ModuleState, RootSpec, ScriptDriver};
//! use kiln_config::BuildConfig;
//! use kiln_graph::ModuleId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(MemoryRuntime::new("/work"));
//! runtime.add_file("/work/src/app.py", "import util\n");
//! runtime.add_file("/work/src/util.py", "def helper():\n    pass\n");
//!
//! let config = BuildConfig::default().with_search_path("src");
//! let mut build = Build::with_runtime(config, runtime);
//! let roots = [RootSpec::new(ModuleId::new("app")?)];
//!
//! let first = build.build(&mut ScriptDriver::new(), &roots)?;
//! assert_eq!(first.state("util"), Some(ModuleState::Rebuilt));
//!
//! let second = build.build(&mut ScriptDriver::new(), &roots)?;
//! assert_eq!(second.state("util"), Some(ModuleState::FreshQueued));
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The library only emits [`tracing`] events. Enable the `logging` feature
//! for `init_logging` helpers that install a subscriber.

pub mod build;
pub mod cache;
pub mod diagnostics;
pub mod driver;
pub mod freshness;
pub mod loader;
pub mod locator;
pub mod result;
pub mod runtime;
mod scheduler;
pub mod script;
pub mod session;

#[cfg(feature = "logging")]
pub mod logging;

pub use build::{Build, build};
pub use cache::{CacheError, CacheStore};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use driver::{
    AnalysisDriver, DependencyExtractor, DriverError, ModuleOutput, ModuleSource, ParseError,
    Pass, PassOutcome,
};
pub use freshness::FreshnessVerdict;
pub use loader::{LoadedGraph, RootSpec};
pub use locator::ModuleLocator;
pub use result::{AnalyzedModule, BuildResult, BuildStats, ModuleState, Origin};
pub use runtime::{FileMetadata, MemoryRuntime, NativeRuntime, Runtime, RuntimeError};
pub use script::ScriptDriver;
pub use session::{BuildSession, SearchPath};

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging, init_logging_from_config, init_logging_from_env};

use kiln_config::ConfigError;
use kiln_graph::{GraphError, ModuleId};

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// The error that ends a build. No partial result is produced.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The same module was given as a root twice.
    #[error("duplicate root module '{0}'")]
    DuplicateModule(ModuleId),

    #[error("cannot find root module '{module}'")]
    RootNotFound { module: ModuleId },

    #[error("cannot find package '{ancestor}' enclosing root module '{module}'")]
    MissingAncestor { module: ModuleId, ancestor: ModuleId },

    /// A parse error that stops the build wherever it occurs.
    #[error("{module}{}: error: {message}", line.map(|l| format!(":{l}")).unwrap_or_default())]
    BlockingError {
        module: ModuleId,
        line: Option<u32>,
        message: String,
    },

    #[error("cannot parse root module '{module}': {message}")]
    RootParseFailed { module: ModuleId, message: String },

    #[error("analysis failed: {0}")]
    Driver(#[from] DriverError),

    #[error("build cancelled")]
    Cancelled,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl BuildError {
    /// The messages to show the user, one per line.
    pub fn messages(&self) -> Vec<String> {
        match self {
            BuildError::Config(err) => {
                let mut messages = vec![err.to_string()];
                messages.extend(err.hint().map(String::from));
                messages
            }
            other => vec![other.to_string()],
        }
    }
}

impl miette::Diagnostic for BuildError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            BuildError::DuplicateModule(_) => "DUPLICATE_MODULE",
            BuildError::RootNotFound { .. } => "ROOT_NOT_FOUND",
            BuildError::MissingAncestor { .. } => "MISSING_ANCESTOR",
            BuildError::BlockingError { .. } => "BLOCKING_ERROR",
            BuildError::RootParseFailed { .. } => "ROOT_PARSE_FAILED",
            BuildError::Driver(_) => "DRIVER_ERROR",
            BuildError::Cancelled => "CANCELLED",
            BuildError::Runtime(_) => "IO_ERROR",
            BuildError::Graph(_) => "GRAPH_ERROR",
            BuildError::Config(_) => "INVALID_CONFIG",
            BuildError::Cache(_) => "CACHE_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            BuildError::RootNotFound { module } => Some(Box::new(format!(
                "Check that '{module}' exists in one of the configured search-paths."
            ))),
            BuildError::MissingAncestor { ancestor, .. } => Some(Box::new(format!(
                "Every package enclosing a root needs a marker file.\nAdd one for '{ancestor}'."
            ))),
            BuildError::DuplicateModule(module) => Some(Box::new(format!(
                "Remove the second occurrence of '{module}' from the roots."
            ))),
            BuildError::Config(err) => err
                .hint()
                .map(|hint| Box::new(hint) as Box<dyn std::fmt::Display>),
            BuildError::Cache(_) => Some(Box::new(
                "The cache directory may be corrupted. Delete it and build again.",
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic as _;

    #[test]
    fn test_error_codes_and_messages() {
        let err = BuildError::BlockingError {
            module: ModuleId::new("pkg.mod").unwrap(),
            line: Some(7),
            message: "invalid syntax".into(),
        };
        assert_eq!(err.to_string(), "pkg.mod:7: error: invalid syntax");
        assert_eq!(err.code().unwrap().to_string(), "BLOCKING_ERROR");
        assert_eq!(err.messages(), vec!["pkg.mod:7: error: invalid syntax"]);

        let err = BuildError::RootNotFound {
            module: ModuleId::new("app").unwrap(),
        };
        assert!(err.help().is_some());
        assert_eq!(err.messages(), vec!["cannot find root module 'app'"]);
    }
}
