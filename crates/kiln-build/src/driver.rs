//! Collaborator interfaces.
//!
//! The orchestrator never parses or analyzes anything itself. A driver turns
//! source text into an opaque [`ParsedModule`], reports its imports, and runs
//! the analysis passes; the orchestrator decides which modules to hand it and
//! in which order.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kiln_config::AnalysisOptions;
use kiln_graph::{CacheMetadata, ImportRecord, ModuleId, ParsedModule};

use crate::diagnostics::Diagnostic;

/// Reports the imports of a parsed module.
pub trait DependencyExtractor {
    /// Imports in source order. The same module may appear several times.
    fn extract(&self, module: &ParsedModule) -> Vec<ImportRecord>;
}

/// Analysis passes, run in this order across every member of an SCC before
/// the next pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {
    SemanticAnalysis,
    SemanticAnalysisFinal,
    TypeCheck,
    /// Repeated while any member reports [`PassOutcome::MoreWork`].
    DeferredTypeCheck,
    Finish,
}

impl Pass {
    pub const SEQUENCE: [Pass; 5] = [
        Pass::SemanticAnalysis,
        Pass::SemanticAnalysisFinal,
        Pass::TypeCheck,
        Pass::DeferredTypeCheck,
        Pass::Finish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Pass::SemanticAnalysis => "semantic-analysis",
            Pass::SemanticAnalysisFinal => "semantic-analysis-final",
            Pass::TypeCheck => "type-check",
            Pass::DeferredTypeCheck => "deferred-type-check",
            Pass::Finish => "finish",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Done,
    /// Only meaningful for [`Pass::DeferredTypeCheck`].
    MoreWork,
}

/// Source handed to [`AnalysisDriver::parse`].
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// `None` for inline text.
    pub path: Option<PathBuf>,
    pub text: Arc<str>,
}

/// A module that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: Option<u32>,
    /// Blocking errors stop the whole build.
    pub blocking: bool,
}

impl ParseError {
    pub fn blocking(message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            message: message.into(),
            line,
            blocking: true,
        }
    }

    pub fn recoverable(message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            message: message.into(),
            line,
            blocking: false,
        }
    }
}

/// A pass, load or serialization failed inside the driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{module}: {message}")]
pub struct DriverError {
    pub module: ModuleId,
    pub message: String,
}

impl DriverError {
    pub fn new(module: ModuleId, message: impl Into<String>) -> Self {
        Self {
            module,
            message: message.into(),
        }
    }
}

/// What a driver produces for a module after its passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutput {
    /// Hash of everything other modules can observe.
    pub interface_hash: String,
    /// Opaque bytes stored in the cache and handed back to
    /// [`AnalysisDriver::load_from_cache`].
    pub payload: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses and analyzes modules on behalf of the scheduler.
pub trait AnalysisDriver: DependencyExtractor {
    fn parse(
        &mut self,
        id: &ModuleId,
        source: &ModuleSource,
        options: &AnalysisOptions,
    ) -> Result<ParsedModule, ParseError>;

    /// Run one pass over one module. `dependencies` are the module's imports
    /// that resolved to modules in the graph; all of them have been loaded
    /// from cache or are being processed in the same SCC.
    fn run_pass(
        &mut self,
        pass: Pass,
        module: &ParsedModule,
        dependencies: &[ModuleId],
    ) -> Result<PassOutcome, DriverError>;

    /// Interface hash, payload and diagnostics of a module whose passes have
    /// all run.
    fn module_output(&mut self, module: &ParsedModule) -> Result<ModuleOutput, DriverError>;

    /// Materialize a fresh module from its cached payload.
    fn load_from_cache(&mut self, meta: &CacheMetadata, payload: &[u8]) -> Result<(), DriverError>;
}
