//! Smoke tests for kiln-graph.
//!
//! Fast, deterministic checks of graph invariants and SCC decomposition on
//! small hand-built graphs. Randomized coverage lives in property_tests.rs.

use super::{graph_from, id, names};
use crate::scc::decompose;
use crate::{GraphDump, GraphError, ModuleNode, NodeSource, ParsedModule, Priority};

use Priority::*;

#[test]
fn test_duplicate_insert_is_rejected() {
    let mut graph = graph_from(&[("a", &[])]);
    let again = ModuleNode::builder(
        id("a"),
        7,
        NodeSource::parsed(ParsedModule::new(id("a"), ())),
    )
    .build();
    assert!(matches!(
        graph.insert(again),
        Err(GraphError::DuplicateModule(dup)) if dup == id("a")
    ));
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_next_order_continues_after_inserted_nodes() {
    let mut graph = graph_from(&[("a", &[]), ("b", &[])]);
    assert_eq!(graph.next_order(), 2);
    assert_eq!(graph.next_order(), 3);
}

#[test]
fn test_unknown_module_query() {
    let graph = graph_from(&[("a", &[])]);
    assert!(matches!(
        graph.node(&id("zzz")),
        Err(GraphError::UnknownModule(_))
    ));
}

#[test]
fn test_dependents_are_reverse_edges() {
    let graph = graph_from(&[("a", &[("c", High)]), ("b", &[("c", Low)]), ("c", &[])]);
    assert_eq!(names(&graph.dependents(&id("c"))), vec!["a", "b"]);
    assert!(graph.dependents(&id("a")).is_empty());
}

#[test]
fn test_acyclic_graph_gives_singletons_leaves_first() {
    let graph = graph_from(&[
        ("main", &[("util", Medium), ("models", High)]),
        ("models", &[("util", High)]),
        ("util", &[]),
    ]);
    let ids: Vec<_> = graph.ids().cloned().collect();
    let sccs = decompose(&graph, &ids, All);

    assert!(sccs.iter().all(|scc| scc.len() == 1));
    let flat: Vec<_> = sccs.iter().map(|scc| scc.members()[0].clone()).collect();
    assert_eq!(names(&flat), vec!["util", "models", "main"]);
}

#[test]
fn test_edges_to_modules_outside_subset_are_ignored() {
    let graph = graph_from(&[("a", &[("b", High)]), ("b", &[("a", High)]), ("c", &[])]);
    let sccs = decompose(&graph, &[id("a"), id("c")], All);
    assert_eq!(sccs.len(), 2);
    assert!(sccs.iter().all(|scc| scc.len() == 1));
}

#[test]
fn test_ceiling_filters_weak_edges() {
    let graph = graph_from(&[("a", &[("b", Medium)]), ("b", &[("a", Low)])]);
    let ids: Vec<_> = graph.ids().cloned().collect();

    assert_eq!(decompose(&graph, &ids, All).len(), 1);

    let split = decompose(&graph, &ids, Low);
    assert_eq!(split.len(), 2);
    assert_eq!(names(split[0].members()), vec!["b"]);
    assert_eq!(names(split[1].members()), vec!["a"]);
}

#[test]
fn test_dependency_missing_from_graph_is_skipped() {
    let graph = graph_from(&[("a", &[("ghost", High)])]);
    let sccs = decompose(&graph, &[id("a")], All);
    assert_eq!(sccs.len(), 1);
}

#[test]
fn test_ready_layer_prefers_latest_discovered() {
    // `top` depends on three independent leaves discovered in order l1, l2, l3.
    let graph = graph_from(&[
        ("top", &[("l1", High), ("l2", High), ("l3", High)]),
        ("l1", &[]),
        ("l2", &[]),
        ("l3", &[]),
    ]);
    let ids: Vec<_> = graph.ids().cloned().collect();
    let flat: Vec<_> = decompose(&graph, &ids, All)
        .iter()
        .flat_map(|scc| scc.members().to_vec())
        .collect();
    assert_eq!(names(&flat), vec!["l3", "l2", "l1", "top"]);
}

#[test]
fn test_dump_reports_inter_scc_edges_with_strongest_priority() {
    let mut graph = graph_from(&[
        ("app", &[("lib", Medium), ("lib.core", Low)]),
        ("lib", &[("lib.core", High)]),
        ("lib.core", &[("lib", Medium)]),
    ]);
    graph.get_mut(&id("lib")).unwrap().source_size = Some(10);
    graph.get_mut(&id("lib.core")).unwrap().source_size = Some(32);

    let dump = GraphDump::from_graph(&graph);
    assert_eq!(dump.sccs.len(), 2);

    let cycle = &dump.sccs[0];
    assert_eq!(cycle.size, 42);
    assert!(cycle.dependencies.is_empty());

    let app = &dump.sccs[1];
    assert_eq!(names(&app.members), vec!["app"]);
    assert_eq!(app.dependencies.get(&0), Some(&Medium));

    let json = dump.to_json().unwrap();
    assert!(json.contains("\"lib.core\""));
    let dot = dump.to_dot();
    assert!(dot.starts_with("digraph SccGraph {"));
    assert!(dot.contains("scc1 -> scc0 [label=\"medium\"]"));
}
