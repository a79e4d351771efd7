use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{CacheMetadata, ModuleId, Priority};

/// One import statement as reported by a dependency extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub priority: Priority,
    pub module: ModuleId,
    pub line: u32,
}

impl ImportRecord {
    pub fn new(priority: Priority, module: ModuleId, line: u32) -> Self {
        Self {
            priority,
            module,
            line,
        }
    }
}

/// Opaque parse result owned by the analysis driver.
///
/// The orchestrator never looks inside the tree; it only hands it back to the
/// driver that produced it. Drivers recover their concrete type with
/// [`ParsedModule::tree`].
#[derive(Clone)]
pub struct ParsedModule {
    id: ModuleId,
    tree: Arc<dyn Any + Send + Sync>,
}

impl ParsedModule {
    pub fn new<T: Any + Send + Sync>(id: ModuleId, tree: T) -> Self {
        Self {
            id,
            tree: Arc::new(tree),
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Downcast the tree to the driver's concrete type.
    pub fn tree<T: Any>(&self) -> Option<&T> {
        self.tree.downcast_ref::<T>()
    }
}

impl fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedModule")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Where a node's contents came from.
#[derive(Debug, Clone)]
pub enum NodeSource {
    /// Seeded from a validated cache record without parsing.
    FromCache(CacheMetadata),
    /// Parsed from source. `written` holds the record this build wrote after
    /// processing the module, once it has been written.
    FromParse {
        parsed: ParsedModule,
        written: Option<CacheMetadata>,
    },
    /// Source failed to parse with a non-blocking error. The module stays in
    /// the graph with errors suppressed but carries no tree.
    Unparsable { reason: String },
}

impl NodeSource {
    pub fn parsed(parsed: ParsedModule) -> Self {
        NodeSource::FromParse {
            parsed,
            written: None,
        }
    }

    /// The record backing this node: the validated one it was seeded from, or
    /// the one written for it during this build.
    pub fn meta(&self) -> Option<&CacheMetadata> {
        match self {
            NodeSource::FromCache(meta) => Some(meta),
            NodeSource::FromParse { written, .. } => written.as_ref(),
            NodeSource::Unparsable { .. } => None,
        }
    }

    pub fn parsed_module(&self) -> Option<&ParsedModule> {
        match self {
            NodeSource::FromParse { parsed, .. } => Some(parsed),
            _ => None,
        }
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self, NodeSource::FromCache(_))
    }
}

/// A module in the build graph.
///
/// Edges are stored on the importer: `dependencies` are imports that resolved
/// to a module in the graph, `suppressed` are imports that did not (or that
/// policy excludes). Ancestor packages are tracked separately and never form
/// SCC edges.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub id: ModuleId,
    /// `None` for a root given as inline text.
    pub path: Option<PathBuf>,
    /// Discovery sequence number, assigned once.
    pub order: usize,
    pub is_root: bool,
    pub dependencies: Vec<ModuleId>,
    pub suppressed: Vec<ModuleId>,
    /// Enclosing packages, nearest first.
    pub ancestors: Vec<ModuleId>,
    pub priorities: FxHashMap<ModuleId, Priority>,
    /// Line of the first import of each dependency.
    pub dep_lines: FxHashMap<ModuleId, u32>,
    /// Submodules of this package that are present in the graph.
    pub child_modules: BTreeSet<ModuleId>,
    pub source: NodeSource,
    /// Interface hash from the last record on disk, validated or not. A
    /// rebuilt interface is compared against it.
    pub interface_hash: Option<String>,
    /// Source file size in bytes, when known.
    pub source_size: Option<u64>,
    /// Inline source text for roots given as text.
    pub inline_source: Option<Arc<str>>,
    pub is_interface_fresh: bool,
    pub ignore_all: bool,
}

impl ModuleNode {
    /// Create a new node builder with sensible defaults.
    ///
    /// A node seeded from a cache record takes its edges, child modules,
    /// interface hash and size from the record.
    pub fn builder(id: ModuleId, order: usize, source: NodeSource) -> ModuleNodeBuilder {
        let ancestors = id.ancestors();
        let mut node = Self {
            id,
            path: None,
            order,
            is_root: false,
            dependencies: Vec::new(),
            suppressed: Vec::new(),
            ancestors,
            priorities: FxHashMap::default(),
            dep_lines: FxHashMap::default(),
            child_modules: BTreeSet::new(),
            source,
            interface_hash: None,
            source_size: None,
            inline_source: None,
            is_interface_fresh: true,
            ignore_all: false,
        };
        if let NodeSource::FromCache(meta) = &node.source {
            let meta = meta.clone();
            node.interface_hash = Some(meta.interface_hash.clone());
            node.source_size = Some(meta.source_size);
            node.ignore_all = meta.ignore_all;
            node.apply_meta_edges(&meta);
        }
        ModuleNodeBuilder { node }
    }

    pub fn meta(&self) -> Option<&CacheMetadata> {
        self.source.meta()
    }

    /// Priority of the edge to `dep`; missing entries count as `High`.
    pub fn priority(&self, dep: &ModuleId) -> Priority {
        self.priorities.get(dep).copied().unwrap_or_default()
    }

    /// Replace the node's edges with a deduplicated view of `imports`.
    ///
    /// The first occurrence of a module fixes its position and line; its
    /// priority is the strongest seen across all occurrences. Self-imports
    /// are dropped. Every import starts out as a dependency; the graph
    /// builder moves the ones it cannot locate into `suppressed`.
    pub fn apply_imports(&mut self, imports: &[ImportRecord]) {
        self.dependencies.clear();
        self.suppressed.clear();
        self.priorities.clear();
        self.dep_lines.clear();
        for import in imports {
            if import.module == self.id {
                continue;
            }
            self.priorities
                .entry(import.module.clone())
                .and_modify(|p| *p = (*p).min(import.priority))
                .or_insert(import.priority);
            if !self.dep_lines.contains_key(&import.module) {
                self.dep_lines.insert(import.module.clone(), import.line);
                self.dependencies.push(import.module.clone());
            }
        }
    }

    /// Seed edges from a cache record.
    pub fn apply_meta_edges(&mut self, meta: &CacheMetadata) {
        self.dependencies = meta.dependency_list.clone();
        self.suppressed = meta.suppressed_list.clone();
        self.priorities = meta.priorities();
        self.dep_lines.clear();
        self.child_modules = meta.child_modules.clone();
    }

    /// Add an implicit dependency unless the node already has an edge to it.
    pub fn add_implicit_dependency(&mut self, dep: ModuleId, priority: Priority) {
        if dep == self.id || self.dependencies.contains(&dep) || self.suppressed.contains(&dep) {
            return;
        }
        self.priorities.insert(dep.clone(), priority);
        self.dependencies.push(dep);
    }

    /// Move `dep` from `dependencies` to `suppressed`.
    pub fn suppress(&mut self, dep: &ModuleId) {
        if let Some(pos) = self.dependencies.iter().position(|d| d == dep) {
            let dep = self.dependencies.remove(pos);
            if !self.suppressed.contains(&dep) {
                self.suppressed.push(dep);
            }
        }
    }

    /// Move `dep` from `suppressed` back to `dependencies`.
    pub fn unsuppress(&mut self, dep: &ModuleId) -> bool {
        match self.suppressed.iter().position(|d| d == dep) {
            Some(pos) => {
                let dep = self.suppressed.remove(pos);
                self.dependencies.push(dep);
                true
            }
            None => false,
        }
    }

    /// The node's submodule set no longer matches the one recorded in its
    /// cache record.
    pub fn has_new_submodules(&self) -> bool {
        self.meta()
            .is_some_and(|meta| meta.child_modules != self.child_modules)
    }

    /// Current edges match the cache record exactly (same set, same order).
    pub fn edges_match_meta(&self) -> bool {
        self.meta().is_some_and(|meta| {
            meta.dependency_list == self.dependencies && meta.child_modules == self.child_modules
        })
    }

    /// Freshness of the node on its own, ignoring its dependencies.
    pub fn is_fresh(&self) -> bool {
        self.is_interface_fresh && self.edges_match_meta()
    }

    pub fn mark_interface_stale(&mut self) {
        self.is_interface_fresh = false;
    }
}

/// Builder for [`ModuleNode`].
#[derive(Debug)]
pub struct ModuleNodeBuilder {
    node: ModuleNode,
}

impl ModuleNodeBuilder {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.node.path = Some(path.into());
        self
    }

    pub fn root(mut self, is_root: bool) -> Self {
        self.node.is_root = is_root;
        self
    }

    pub fn source_size(mut self, size: u64) -> Self {
        self.node.source_size = Some(size);
        self
    }

    pub fn inline_source(mut self, text: impl Into<Arc<str>>) -> Self {
        self.node.inline_source = Some(text.into());
        self
    }

    /// Interface hash of a record that failed validation.
    pub fn interface_hash(mut self, hash: Option<String>) -> Self {
        self.node.interface_hash = hash;
        self
    }

    pub fn ignore_all(mut self, ignore_all: bool) -> Self {
        self.node.ignore_all = ignore_all;
        self
    }

    /// Add a dependency edge with the given priority.
    pub fn dependency(mut self, dep: ModuleId, priority: Priority) -> Self {
        self.node.add_implicit_dependency(dep, priority);
        self
    }

    pub fn build(self) -> ModuleNode {
        self.node
    }
}
