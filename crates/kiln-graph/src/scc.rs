//! Strongly-connected-component decomposition.
//!
//! Tarjan's algorithm runs over the dependency edges of a vertex subset with
//! an explicit frame stack, so deep import chains cannot overflow the native
//! stack. The resulting components are then ordered leaves first by a layered
//! topological sort of the component DAG.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{ModuleGraph, ModuleId, Priority};

/// A strongly connected component of the filtered dependency graph.
///
/// Members are kept sorted by discovery order so iteration is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scc {
    members: Vec<ModuleId>,
}

impl Scc {
    pub fn members(&self) -> &[ModuleId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Components are never empty; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.members.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleId> {
        self.members.iter()
    }

    pub fn member_set(&self) -> FxHashSet<ModuleId> {
        self.members.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a Scc {
    type Item = &'a ModuleId;
    type IntoIter = std::slice::Iter<'a, ModuleId>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

/// Decompose `subset` of the graph into SCCs, dependencies before dependents.
///
/// Only edges `u -> v` with `v` in `subset` and `priority(u, v) < ceiling` are
/// considered; ancestor relationships never form edges. Every vertex of
/// `subset` lands in exactly one component, singletons included. Among
/// components that become ready at the same time, the one whose earliest
/// member was discovered last comes first.
pub fn decompose(graph: &ModuleGraph, subset: &[ModuleId], ceiling: Priority) -> Vec<Scc> {
    let mut vertices: Vec<ModuleId> = subset.to_vec();
    vertices.sort_by_key(|id| (graph.order_of(id), id.clone()));
    vertices.dedup();

    let index_of: FxHashMap<&ModuleId, usize> =
        vertices.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let members: FxHashSet<ModuleId> = vertices.iter().cloned().collect();
    let adjacency: Vec<Vec<usize>> = vertices
        .iter()
        .map(|id| {
            graph
                .filtered_dependencies(id, &members, ceiling)
                .iter()
                .filter_map(|dep| index_of.get(dep).copied())
                .collect()
        })
        .collect();

    let components = tarjan(&adjacency);
    let layered = topological_layers(&components, &adjacency, |c| {
        components[c]
            .iter()
            .map(|&v| graph.order_of(&vertices[v]))
            .min()
            .unwrap_or(usize::MAX)
    });

    layered
        .into_iter()
        .map(|c| {
            let mut members: Vec<usize> = components[c].clone();
            members.sort_unstable();
            Scc {
                members: members.into_iter().map(|v| vertices[v].clone()).collect(),
            }
        })
        .collect()
}

const UNVISITED: usize = usize::MAX;

/// Iterative Tarjan over a dense adjacency list.
///
/// Returns components in the order Tarjan completes them, which is a reverse
/// topological order of the component DAG.
fn tarjan(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();
    // (vertex, next edge to explore)
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = adjacency[v].get(frame.1) {
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

/// Order components so each comes after every component it depends on.
///
/// Components are released in layers: everything whose dependencies are all
/// emitted becomes ready at once, and a ready layer is sorted by descending
/// `min_order`.
fn topological_layers(
    components: &[Vec<usize>],
    adjacency: &[Vec<usize>],
    min_order: impl Fn(usize) -> usize,
) -> Vec<usize> {
    let mut component_of = vec![0; adjacency.len()];
    for (c, members) in components.iter().enumerate() {
        for &v in members {
            component_of[v] = c;
        }
    }

    let mut pending = vec![0usize; components.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    for (c, members) in components.iter().enumerate() {
        let mut deps: FxHashSet<usize> = FxHashSet::default();
        for &v in members {
            for &w in &adjacency[v] {
                let d = component_of[w];
                if d != c {
                    deps.insert(d);
                }
            }
        }
        pending[c] = deps.len();
        for d in deps {
            dependents[d].push(c);
        }
    }

    let mut ordered = Vec::with_capacity(components.len());
    let mut ready: Vec<usize> = (0..components.len()).filter(|&c| pending[c] == 0).collect();
    while !ready.is_empty() {
        ready.sort_by_key(|&c| std::cmp::Reverse(min_order(c)));
        let mut next = Vec::new();
        for &c in &ready {
            for &d in &dependents[c] {
                pending[d] -= 1;
                if pending[d] == 0 {
                    next.push(d);
                }
            }
        }
        ordered.append(&mut ready);
        ready = next;
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarjan_finds_cycle_and_singletons() {
        // 0 -> 1 -> 2 -> 0, 2 -> 3
        let adjacency = vec![vec![1], vec![2], vec![0, 3], vec![]];
        let mut components = tarjan(&adjacency);
        for c in &mut components {
            c.sort_unstable();
        }
        assert_eq!(components, vec![vec![3], vec![0, 1, 2]]);
    }

    #[test]
    fn tarjan_handles_deep_chains_without_recursion() {
        let n = 100_000;
        let adjacency: Vec<Vec<usize>> = (0..n)
            .map(|i| if i + 1 < n { vec![i + 1] } else { vec![] })
            .collect();
        let components = tarjan(&adjacency);
        assert_eq!(components.len(), n);
        assert_eq!(components[0], vec![n - 1]);
    }

    #[test]
    fn layers_release_leaves_first() {
        // 0 -> 1, 0 -> 2, both leaves; 2 discovered later than 1.
        let adjacency = vec![vec![1, 2], vec![], vec![]];
        let components = vec![vec![1], vec![2], vec![0]];
        let order = topological_layers(&components, &adjacency, |c| components[c][0]);
        assert_eq!(order, vec![1, 0, 2]);
    }
}
