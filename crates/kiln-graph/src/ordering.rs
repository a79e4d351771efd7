use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::scc::{Scc, decompose};
use crate::{ModuleGraph, ModuleId, Priority};

/// Processing order for the members of one SCC.
///
/// Import cycles are broken at their weakest edges first: when the
/// intra-component edges below `ceiling` carry more than one distinct
/// priority, the weakest priority present becomes the new ceiling, the
/// component is re-decomposed without those edges, and each sub-component is
/// ordered recursively. Once only one priority remains, members are ordered
/// by descending discovery order. Each recursion lowers the ceiling, so the
/// depth is bounded by the number of priority levels.
pub fn order_within_scc(graph: &ModuleGraph, scc: &Scc, ceiling: Priority) -> Vec<ModuleId> {
    if scc.len() == 1 {
        return scc.members().to_vec();
    }

    let members = scc.member_set();
    let mut spread = BTreeSet::new();
    for id in scc {
        let Some(node) = graph.get(id) else {
            continue;
        };
        for dep in &node.dependencies {
            if !members.contains(dep) {
                continue;
            }
            let priority = node.priority(dep);
            if priority < ceiling {
                spread.insert(priority);
            }
        }
    }

    let weakest = match spread.last() {
        Some(&weakest) if spread.len() > 1 => weakest,
        _ => {
            let mut ordered = scc.members().to_vec();
            ordered.sort_by_key(|id| Reverse(graph.order_of(id)));
            return ordered;
        }
    };

    decompose(graph, scc.members(), weakest)
        .iter()
        .flat_map(|sub| order_within_scc(graph, sub, weakest))
        .collect()
}
