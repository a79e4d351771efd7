use std::collections::BTreeSet;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{ModuleId, Priority};

/// Freshness record persisted next to each module's analysis payload.
///
/// Written once per successful processing of the module and read back during
/// graph construction to seed a node without parsing it. A record only reaches
/// the graph after it has been validated against the module's current source
/// file and build options; invalid records are dropped and the module is
/// parsed instead.
///
/// Timestamps are milliseconds since the Unix epoch, as reported by the
/// filesystem runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheMetadata {
    pub module_id: ModuleId,
    pub source_path: PathBuf,
    pub source_mtime: u64,
    pub source_size: u64,
    /// Found dependencies in import order. Parallel to `dep_priorities`.
    pub dependency_list: Vec<ModuleId>,
    pub dep_priorities: Vec<Priority>,
    /// Imports that could not be resolved when the record was written.
    /// Parallel to `suppressed_priorities`.
    pub suppressed_list: Vec<ModuleId>,
    pub suppressed_priorities: Vec<Priority>,
    pub child_modules: BTreeSet<ModuleId>,
    pub options_fingerprint: String,
    pub interface_hash: String,
    pub payload_mtime: u64,
    pub payload_location: PathBuf,
    pub tool_version: String,
    /// The module was analyzed with errors suppressed after a non-blocking
    /// parse failure.
    pub ignore_all: bool,
}

impl CacheMetadata {
    /// Parallel lists line up.
    pub fn is_well_formed(&self) -> bool {
        self.dependency_list.len() == self.dep_priorities.len()
            && self.suppressed_list.len() == self.suppressed_priorities.len()
    }

    /// Priority of every recorded import, found or suppressed.
    pub fn priorities(&self) -> FxHashMap<ModuleId, Priority> {
        self.dependency_list
            .iter()
            .zip(&self.dep_priorities)
            .chain(self.suppressed_list.iter().zip(&self.suppressed_priorities))
            .map(|(id, priority)| (id.clone(), *priority))
            .collect()
    }
}
