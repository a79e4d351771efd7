//! Build results.

use std::path::PathBuf;

use indexmap::IndexMap;
use kiln_graph::ModuleId;
use serde::Serialize;

use crate::diagnostics::Diagnostic;

/// Where a module's analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Loaded from a fresh cache record.
    Cache,
    /// Parsed and analyzed in this build.
    Source,
}

/// Final state of every module in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleState {
    /// Fresh and loaded from cache.
    FreshApplied,
    /// Fresh, but never needed by a stale module and left unloaded.
    FreshQueued,
    Rebuilt,
}

/// A module whose analysis is available to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedModule {
    pub id: ModuleId,
    pub path: Option<PathBuf>,
    /// Absent for modules that failed to parse.
    pub interface_hash: Option<String>,
    pub origin: Origin,
    /// Diagnostics of this module are suppressed.
    pub ignore_all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub modules_in_graph: usize,
    pub sccs: usize,
    pub fresh_applied: usize,
    pub rebuilt: usize,
    /// Fresh SCCs still queued when the build ended.
    pub left_in_queue: usize,
    pub nodes_left_in_queue: usize,
    pub cache_writes: usize,
    pub metadata_only_writes: usize,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildResult {
    /// Modules loaded or analyzed, in processing order.
    pub modules: IndexMap<ModuleId, AnalyzedModule>,
    pub states: IndexMap<ModuleId, ModuleState>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: BuildStats,
}

impl BuildResult {
    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.states.get(id).copied()
    }

    pub fn module(&self, id: &str) -> Option<&AnalyzedModule> {
        self.modules.get(id)
    }

    pub fn rebuilt(&self) -> impl Iterator<Item = &ModuleId> {
        self.states
            .iter()
            .filter(|(_, state)| **state == ModuleState::Rebuilt)
            .map(|(id, _)| id)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}
