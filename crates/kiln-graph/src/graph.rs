use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::{GraphError, ModuleId, ModuleNode, Priority, Result};

/// Insertion-ordered arena of module nodes keyed by [`ModuleId`].
///
/// The graph only grows while it is being built. Afterwards the scheduler
/// mutates node freshness flags, edge corrections and node sources in place;
/// nodes are never removed.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: IndexMap<ModuleId, ModuleNode, FxBuildHasher>,
    next_order: usize,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &ModuleId) -> Option<&mut ModuleNode> {
        self.nodes.get_mut(id)
    }

    /// Like [`get`](Self::get) but reports a missing node as an error.
    pub fn node(&self, id: &ModuleId) -> Result<&ModuleNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownModule(id.clone()))
    }

    pub fn node_mut(&mut self, id: &ModuleId) -> Result<&mut ModuleNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownModule(id.clone()))
    }

    /// Reserve the next discovery sequence number.
    pub fn next_order(&mut self) -> usize {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    /// Insert a node. Ids are unique for the lifetime of the graph.
    pub fn insert(&mut self, node: ModuleNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateModule(node.id));
        }
        self.next_order = self.next_order.max(node.order + 1);
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.nodes.keys()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    /// Discovery order of `id`, or `usize::MAX` when it is not in the graph.
    pub fn order_of(&self, id: &ModuleId) -> usize {
        self.nodes.get(id).map_or(usize::MAX, |node| node.order)
    }

    /// Dependencies of `id` that stay inside `subset` and are strictly
    /// weaker-than-ceiling edges. Dependencies missing from the graph are
    /// skipped.
    pub fn filtered_dependencies(
        &self,
        id: &ModuleId,
        subset: &FxHashSet<ModuleId>,
        ceiling: Priority,
    ) -> Vec<ModuleId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.dependencies
            .iter()
            .filter(|dep| subset.contains(*dep) && node.priority(dep) < ceiling)
            .cloned()
            .collect()
    }

    /// Modules that list `id` among their dependencies, in insertion order.
    pub fn dependents(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.nodes
            .values()
            .filter(|node| node.dependencies.contains(id))
            .map(|node| node.id.clone())
            .collect()
    }
}
