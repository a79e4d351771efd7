//! # kiln-graph
//!
//! Pure data structures and algorithms for incremental module builds.
//!
//! This crate holds the module dependency graph and everything that can be
//! computed from it without touching the filesystem: strongly connected
//! component decomposition, processing order within import cycles, and a
//! serializable description of the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ModuleGraph                  │
//! │   (IndexMap arena, insertion-ordered)        │
//! └─────────────────────┬────────────────────────┘
//!                       │
//!           ┌───────────┼────────────┐
//!           ▼           ▼            ▼
//!     ┌──────────┐ ┌──────────┐ ┌───────────────┐
//!     │ModuleNode│ │ Priority │ │ CacheMetadata │
//!     │ (vertex) │ │ (edge)   │ │ (freshness)   │
//!     └──────────┘ └──────────┘ └───────────────┘
//!                       │
//!                       ▼
//!     ┌──────────────────────────────────────────┐
//!     │ scc::decompose → ordering::order_within_scc│
//!     └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln_graph::{ModuleGraph, ModuleId, ModuleNode, NodeSource, ParsedModule, Priority};
//! use kiln_graph::scc::decompose;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let a = ModuleId::new("a")?;
//! let b = ModuleId::new("b")?;
//!
//! let mut graph = ModuleGraph::new();
//! for (order, (id, dep)) in [(&a, &b), (&b, &a)].into_iter().enumerate() {
//!     let source = NodeSource::parsed(ParsedModule::new(id.clone(), ()));
//!     graph.insert(
//!         ModuleNode::builder(id.clone(), order, source)
//!             .dependency(dep.clone(), Priority::High)
//!             .build(),
//!     )?;
//! }
//!
//! let sccs = decompose(&graph, &[a.clone(), b.clone()], Priority::All);
//! assert_eq!(sccs.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Determinism
//!
//! Every traversal is keyed by the node's discovery `order`, never by hash
//! iteration, so identical inputs always produce identical SCC lists and
//! processing orders.

pub mod dump;
mod error;
mod graph;
mod meta;
pub mod module_id;
mod node;
pub mod ordering;
pub mod priority;
pub mod scc;

pub use dump::{GraphDump, SccDump};
pub use error::{GraphError, Result};
pub use graph::ModuleGraph;
pub use meta::CacheMetadata;
pub use module_id::{ModuleId, ModuleIdError};
pub use node::{ImportRecord, ModuleNode, ModuleNodeBuilder, NodeSource, ParsedModule};
pub use ordering::order_within_scc;
pub use priority::Priority;
pub use scc::{Scc, decompose};

#[cfg(test)]
mod tests;
