//! Structured description of a graph's SCC decomposition.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ordering::order_within_scc;
use crate::scc::{Scc, decompose};
use crate::{GraphError, ModuleGraph, ModuleId, Priority, Result};

/// SCCs of a graph in processing order, with sizes and inter-SCC edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDump {
    pub sccs: Vec<SccDump>,
}

/// One SCC in a [`GraphDump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SccDump {
    /// Position of the SCC in processing order.
    pub id: usize,
    /// Members in within-SCC processing order.
    pub members: Vec<ModuleId>,
    /// Source size of each member in bytes (0 when unknown).
    pub sizes: IndexMap<ModuleId, u64>,
    /// Sum of `sizes`.
    pub size: u64,
    /// Strongest edge priority from this SCC to each SCC it depends on.
    pub dependencies: BTreeMap<usize, Priority>,
}

/// Helper to escape labels for DOT format.
fn escape_label(label: &str) -> String {
    label.replace('"', "\\\"")
}

impl GraphDump {
    /// Decompose the whole graph and describe the result.
    pub fn from_graph(graph: &ModuleGraph) -> Self {
        let ids: Vec<ModuleId> = graph.ids().cloned().collect();
        Self::from_sccs(graph, &decompose(graph, &ids, Priority::All))
    }

    /// Describe an existing SCC list, keeping its order.
    pub fn from_sccs(graph: &ModuleGraph, sccs: &[Scc]) -> Self {
        let mut scc_of: BTreeMap<&ModuleId, usize> = BTreeMap::new();
        for (i, scc) in sccs.iter().enumerate() {
            for id in scc {
                scc_of.insert(id, i);
            }
        }

        let dumps = sccs
            .iter()
            .enumerate()
            .map(|(i, scc)| {
                let members = order_within_scc(graph, scc, Priority::All);
                let mut sizes = IndexMap::new();
                let mut dependencies: BTreeMap<usize, Priority> = BTreeMap::new();
                for id in &members {
                    let Some(node) = graph.get(id) else {
                        continue;
                    };
                    sizes.insert(id.clone(), node.source_size.unwrap_or(0));
                    for dep in &node.dependencies {
                        let Some(&target) = scc_of.get(dep) else {
                            continue;
                        };
                        if target == i {
                            continue;
                        }
                        let priority = node.priority(dep);
                        dependencies
                            .entry(target)
                            .and_modify(|p| *p = (*p).min(priority))
                            .or_insert(priority);
                    }
                }
                SccDump {
                    id: i,
                    size: sizes.values().sum(),
                    members,
                    sizes,
                    dependencies,
                }
            })
            .collect();

        GraphDump { sccs: dumps }
    }

    /// Export the dump to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Export the SCC DAG as DOT format for visualization.
    pub fn to_dot(&self) -> String {
        let mut output = String::from("digraph SccGraph {\n");
        for scc in &self.sccs {
            let names: Vec<&str> = scc.members.iter().map(ModuleId::as_str).collect();
            output.push_str(&format!(
                "    scc{} [label=\"{}\\n{} bytes\"];\n",
                scc.id,
                escape_label(&names.join(", ")),
                scc.size
            ));
        }
        for scc in &self.sccs {
            for (target, priority) in &scc.dependencies {
                output.push_str(&format!(
                    "    scc{} -> scc{} [label=\"{}\"];\n",
                    scc.id, target, priority
                ));
            }
        }
        output.push_str("}\n");
        output
    }
}
