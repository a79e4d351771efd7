//! SCC freshness decisions.

use std::fmt;

use kiln_graph::{ModuleGraph, ModuleId, Scc};
use rustc_hash::FxHashSet;

/// Whether an SCC can be loaded from cache, and if not, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreshnessVerdict {
    Fresh,
    /// Members whose own record is missing, invalid or no longer matches.
    InherentlyStale { members: Vec<ModuleId> },
    /// Dependencies outside the SCC whose interface changed in this build.
    StaleDeps { deps: Vec<ModuleId> },
    /// Imports recorded as unresolvable that now resolve.
    ChangedSuppression { ids: Vec<ModuleId> },
    /// A dependency's payload is newer than the oldest member payload.
    OutOfDate { by_millis: u64 },
}

impl FreshnessVerdict {
    pub fn is_fresh(&self) -> bool {
        matches!(self, FreshnessVerdict::Fresh)
    }
}

fn join(ids: &[ModuleId]) -> String {
    ids.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for FreshnessVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessVerdict::Fresh => f.write_str("fresh"),
            FreshnessVerdict::InherentlyStale { members } => {
                write!(f, "inherently stale ({})", join(members))
            }
            FreshnessVerdict::StaleDeps { deps } => {
                write!(f, "stale due to deps ({})", join(deps))
            }
            FreshnessVerdict::ChangedSuppression { ids } => {
                write!(f, "stale due to changed suppression ({})", join(ids))
            }
            FreshnessVerdict::OutOfDate { by_millis } => {
                write!(f, "out of date by {by_millis} ms")
            }
        }
    }
}

/// Decide whether `scc` is fresh.
///
/// Checks run in order and the first failure wins: every member fresh on its
/// own, every outside dependency still interface-fresh, no recorded
/// suppression now resolving, and no outside dependency payload newer than
/// the oldest member payload.
pub fn scc_verdict(graph: &ModuleGraph, scc: &Scc) -> FreshnessVerdict {
    let members: Vec<_> = scc.iter().filter_map(|id| graph.get(id)).collect();

    let stale: Vec<ModuleId> = members
        .iter()
        .filter(|node| !node.is_fresh())
        .map(|node| node.id.clone())
        .collect();
    if !stale.is_empty() {
        return FreshnessVerdict::InherentlyStale { members: stale };
    }

    let mut seen = FxHashSet::default();
    let mut deps: Vec<&ModuleId> = members
        .iter()
        .flat_map(|node| node.dependencies.iter())
        .filter(|dep| !scc.contains(dep) && graph.contains(dep))
        .filter(|dep| seen.insert(*dep))
        .collect();
    deps.sort_by_key(|dep| graph.order_of(dep));

    let stale_deps: Vec<ModuleId> = deps
        .iter()
        .filter(|dep| graph.get(dep).is_some_and(|node| !node.is_interface_fresh))
        .map(|dep| (*dep).clone())
        .collect();
    if !stale_deps.is_empty() {
        return FreshnessVerdict::StaleDeps { deps: stale_deps };
    }

    let resolved: Vec<ModuleId> = members
        .iter()
        .filter_map(|node| node.meta())
        .flat_map(|meta| meta.suppressed_list.iter())
        .filter(|id| graph.contains(id))
        .cloned()
        .collect();
    if !resolved.is_empty() {
        return FreshnessVerdict::ChangedSuppression { ids: resolved };
    }

    let oldest_member = members
        .iter()
        .filter_map(|node| node.meta())
        .map(|meta| meta.payload_mtime)
        .min();
    let newest_dep = deps
        .iter()
        .filter_map(|dep| graph.get(dep).and_then(|node| node.meta()))
        .map(|meta| meta.payload_mtime)
        .max();
    if let (Some(oldest), Some(newest)) = (oldest_member, newest_dep) {
        if oldest < newest {
            return FreshnessVerdict::OutOfDate {
                by_millis: newest - oldest,
            };
        }
    }

    FreshnessVerdict::Fresh
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use kiln_graph::{CacheMetadata, ModuleNode, NodeSource, ParsedModule, Priority, decompose};

    use super::*;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(name).unwrap()
    }

    fn meta(name: &str, deps: &[&str], suppressed: &[&str], payload_mtime: u64) -> CacheMetadata {
        CacheMetadata {
            module_id: id(name),
            source_path: PathBuf::from(format!("/src/{name}.py")),
            source_mtime: 1,
            source_size: 1,
            dependency_list: deps.iter().map(|d| id(d)).collect(),
            dep_priorities: deps.iter().map(|_| Priority::High).collect(),
            suppressed_list: suppressed.iter().map(|d| id(d)).collect(),
            suppressed_priorities: suppressed.iter().map(|_| Priority::High).collect(),
            child_modules: BTreeSet::new(),
            options_fingerprint: String::new(),
            interface_hash: format!("{name}-hash"),
            payload_mtime,
            payload_location: PathBuf::from(format!("/cache/{name}.data.bin")),
            tool_version: String::new(),
            ignore_all: false,
        }
    }

    fn cached(graph: &mut ModuleGraph, meta: CacheMetadata) {
        let order = graph.next_order();
        let node = ModuleNode::builder(meta.module_id.clone(), order, NodeSource::FromCache(meta)).build();
        graph.insert(node).unwrap();
    }

    fn scc_of(graph: &ModuleGraph, name: &str) -> Scc {
        let ids: Vec<_> = graph.ids().cloned().collect();
        decompose(graph, &ids, Priority::All)
            .into_iter()
            .find(|scc| scc.contains(&id(name)))
            .unwrap()
    }

    #[test]
    fn test_all_cached_is_fresh() {
        let mut graph = ModuleGraph::new();
        cached(&mut graph, meta("b", &[], &[], 10));
        cached(&mut graph, meta("a", &["b"], &[], 20));
        assert_eq!(scc_verdict(&graph, &scc_of(&graph, "a")), FreshnessVerdict::Fresh);
    }

    #[test]
    fn test_parsed_member_is_inherently_stale() {
        let mut graph = ModuleGraph::new();
        let order = graph.next_order();
        let parsed = NodeSource::parsed(ParsedModule::new(id("a"), ()));
        graph
            .insert(ModuleNode::builder(id("a"), order, parsed).build())
            .unwrap();
        assert_eq!(
            scc_verdict(&graph, &scc_of(&graph, "a")),
            FreshnessVerdict::InherentlyStale {
                members: vec![id("a")]
            }
        );
    }

    #[test]
    fn test_interface_stale_dependency() {
        let mut graph = ModuleGraph::new();
        cached(&mut graph, meta("b", &[], &[], 10));
        cached(&mut graph, meta("a", &["b"], &[], 20));
        graph.get_mut(&id("b")).unwrap().mark_interface_stale();
        let verdict = scc_verdict(&graph, &scc_of(&graph, "a"));
        assert_eq!(verdict, FreshnessVerdict::StaleDeps { deps: vec![id("b")] });
        assert_eq!(verdict.to_string(), "stale due to deps (b)");
    }

    #[test]
    fn test_resolved_suppression() {
        let mut graph = ModuleGraph::new();
        cached(&mut graph, meta("a", &[], &["x"], 20));
        cached(&mut graph, meta("x", &[], &[], 10));
        assert_eq!(
            scc_verdict(&graph, &scc_of(&graph, "a")),
            FreshnessVerdict::ChangedSuppression { ids: vec![id("x")] }
        );
    }

    #[test]
    fn test_newer_dependency_payload() {
        let mut graph = ModuleGraph::new();
        cached(&mut graph, meta("b", &[], &[], 30));
        cached(&mut graph, meta("a", &["b"], &[], 20));
        assert_eq!(
            scc_verdict(&graph, &scc_of(&graph, "a")),
            FreshnessVerdict::OutOfDate { by_millis: 10 }
        );
    }
}
