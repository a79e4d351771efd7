mod ordering_tests;
mod smoke_tests;

use crate::{ModuleGraph, ModuleId, ModuleNode, NodeSource, ParsedModule, Priority};

pub(crate) fn id(name: &str) -> ModuleId {
    ModuleId::new(name).unwrap()
}

/// Build a graph from `(module, [(dependency, priority)])` pairs. Modules are
/// discovered in the order given.
pub(crate) fn graph_from(spec: &[(&str, &[(&str, Priority)])]) -> ModuleGraph {
    let mut graph = ModuleGraph::new();
    for (order, (name, deps)) in spec.iter().enumerate() {
        let mut builder = ModuleNode::builder(
            id(name),
            order,
            NodeSource::parsed(ParsedModule::new(id(name), ())),
        );
        for (dep, priority) in deps.iter() {
            builder = builder.dependency(id(dep), *priority);
        }
        graph.insert(builder.build()).unwrap();
    }
    graph
}

pub(crate) fn names(ids: &[ModuleId]) -> Vec<&str> {
    ids.iter().map(ModuleId::as_str).collect()
}
