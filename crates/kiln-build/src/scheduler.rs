//! SCC processing.
//!
//! SCCs arrive leaves first. Fresh SCCs are only queued; their cached
//! payloads are loaded the moment a stale SCC needs them, which keeps builds
//! where nothing changed from touching payloads at all. Stale SCCs are parsed
//! where needed, run through every pass and written back to the cache.
//! Modules that reported diagnostics get no record, so the next build
//! processes them again and reports the same diagnostics.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use kiln_graph::{
    CacheMetadata, ModuleGraph, ModuleId, NodeSource, ParsedModule, Priority, Scc,
    order_within_scc,
};

use crate::build::BuildContext;
use crate::cache::{CacheError, WriteRequest};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::driver::{AnalysisDriver, ModuleOutput, Pass, PassOutcome};
use crate::freshness::scc_verdict;
use crate::loader::{apply_parsed, missing_import, parse_module};
use crate::result::{AnalyzedModule, BuildResult, ModuleState, Origin};
use crate::{BuildError, Result};

fn describe(ids: &[ModuleId]) -> String {
    ids.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(" ")
}

/// Newest recorded payload among the dependencies of `members` that lie
/// outside them.
fn newest_outside_payload(graph: &ModuleGraph, members: &[ModuleId]) -> Option<u64> {
    members
        .iter()
        .filter_map(|id| graph.get(id))
        .flat_map(|node| node.dependencies.iter())
        .filter(|dep| !members.contains(dep))
        .filter_map(|dep| graph.get(dep).and_then(|node| node.meta()))
        .map(|meta| meta.payload_mtime)
        .max()
}

/// A parsed SCC member ready for the passes.
struct Member {
    parsed: ParsedModule,
    dependencies: Vec<ModuleId>,
}

pub(crate) struct ProcessingScheduler<'a> {
    ctx: &'a BuildContext,
    driver: &'a mut dyn AnalysisDriver,
    graph: &'a mut ModuleGraph,
    cancel: Option<&'a AtomicBool>,
    fresh_queue: VecDeque<Vec<ModuleId>>,
    result: BuildResult,
}

impl<'a> ProcessingScheduler<'a> {
    pub(crate) fn new(
        ctx: &'a BuildContext,
        driver: &'a mut dyn AnalysisDriver,
        graph: &'a mut ModuleGraph,
        cancel: Option<&'a AtomicBool>,
    ) -> Self {
        Self {
            ctx,
            driver,
            graph,
            cancel,
            fresh_queue: VecDeque::new(),
            result: BuildResult::default(),
        }
    }

    /// Process `sccs`, which must be in dependency order.
    pub(crate) fn run(mut self, sccs: &[Scc], diagnostics: Vec<Diagnostic>) -> Result<BuildResult> {
        self.result.diagnostics = diagnostics;
        self.result.stats.modules_in_graph = self.graph.len();
        self.result.stats.sccs = sccs.len();

        for scc in sccs {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::info!("Build cancelled");
                return Err(BuildError::Cancelled);
            }

            let ordered = order_within_scc(self.graph, scc, Priority::All);
            let verdict = scc_verdict(self.graph, scc);
            if verdict.is_fresh() {
                tracing::debug!("Queuing fresh SCC ({})", describe(&ordered));
                for id in &ordered {
                    self.result.states.insert(id.clone(), ModuleState::FreshQueued);
                }
                self.fresh_queue.push_back(ordered);
            } else {
                self.flush_fresh()?;
                tracing::info!(
                    "Processing SCC of size {} ({}) as {verdict}",
                    ordered.len(),
                    describe(&ordered)
                );
                self.process_stale(&ordered)?;
            }
        }

        if self.ctx.config.load_all_fresh {
            self.flush_fresh()?;
        }
        self.result.stats.left_in_queue = self.fresh_queue.len();
        self.result.stats.nodes_left_in_queue = self.fresh_queue.iter().map(Vec::len).sum();
        if !self.fresh_queue.is_empty() {
            tracing::debug!(
                sccs = self.result.stats.left_in_queue,
                modules = self.result.stats.nodes_left_in_queue,
                "Fresh SCCs left unloaded"
            );
        }
        Ok(self.result)
    }

    /// Load every queued fresh SCC from cache, oldest first.
    fn flush_fresh(&mut self) -> Result<()> {
        while let Some(ordered) = self.fresh_queue.pop_front() {
            tracing::debug!("Loading fresh SCC ({})", describe(&ordered));
            for id in ordered {
                let node = self.graph.node(&id)?;
                let meta = node.meta().ok_or(CacheError::CacheMiss)?;
                let payload = self.ctx.store.load_payload(meta)?;
                self.driver.load_from_cache(meta, &payload)?;

                let module = AnalyzedModule {
                    id: id.clone(),
                    path: node.path.clone(),
                    interface_hash: Some(meta.interface_hash.clone()),
                    origin: Origin::Cache,
                    ignore_all: node.ignore_all,
                };
                self.result.modules.insert(id.clone(), module);
                self.result.states.insert(id, ModuleState::FreshApplied);
                self.result.stats.fresh_applied += 1;
            }
        }
        Ok(())
    }

    fn process_stale(&mut self, ordered: &[ModuleId]) -> Result<()> {
        for id in ordered {
            if self.graph.node(id)?.source.is_from_cache() {
                self.reparse(id)?;
            }
        }

        // unparsable modules have nothing to offer their importers
        let graph = &*self.graph;
        let available = |dep: &&ModuleId| {
            graph
                .get(dep)
                .is_some_and(|node| !matches!(node.source, NodeSource::Unparsable { .. }))
        };
        let members: Vec<Member> = ordered
            .iter()
            .filter_map(|id| graph.get(id))
            .filter_map(|node| {
                node.source.parsed_module().map(|parsed| Member {
                    parsed: parsed.clone(),
                    dependencies: node.dependencies.iter().filter(available).cloned().collect(),
                })
            })
            .collect();
        self.run_passes(&members)?;

        let newest_dependency_payload = newest_outside_payload(self.graph, ordered);
        for id in ordered {
            self.finish_module(id, newest_dependency_payload)?;
        }
        Ok(())
    }

    /// Parse a member that was seeded from cache and resolve its imports
    /// against the graph.
    fn reparse(&mut self, id: &ModuleId) -> Result<()> {
        let node = self.graph.node(id)?;
        let path = node.path.clone();
        let inline = node.inline_source.clone();
        let is_root = node.is_root;

        let parsed = parse_module(
            self.ctx,
            self.driver,
            id,
            path.as_deref(),
            inline.as_ref(),
            is_root,
        )?;
        let node = self.graph.node_mut(id)?;
        let warning = apply_parsed(self.ctx, node, parsed);
        self.result.diagnostics.extend(warning);

        let graph = &*self.graph;
        let missing: Vec<ModuleId> = graph
            .node(id)?
            .dependencies
            .iter()
            .filter(|dep| !graph.contains(dep))
            .cloned()
            .collect();
        let node = self.graph.node_mut(id)?;
        for dep in &missing {
            node.suppress(dep);
            if self.ctx.config.is_excluded(dep.as_str()) {
                continue;
            }
            if let Some(diag) = missing_import(self.ctx, node, dep) {
                self.result.diagnostics.push(diag);
            }
        }
        Ok(())
    }

    fn run_passes(&mut self, members: &[Member]) -> Result<()> {
        for pass in [Pass::SemanticAnalysis, Pass::SemanticAnalysisFinal, Pass::TypeCheck] {
            for member in members {
                self.driver
                    .run_pass(pass, &member.parsed, &member.dependencies)?;
            }
        }

        let max_rounds = self.ctx.config.max_deferred_rounds;
        let mut pending: Vec<&Member> = members.iter().collect();
        let mut round = 0;
        while !pending.is_empty() && round < max_rounds {
            round += 1;
            let mut more = Vec::new();
            for member in pending {
                let outcome = self.driver.run_pass(
                    Pass::DeferredTypeCheck,
                    &member.parsed,
                    &member.dependencies,
                )?;
                if outcome == PassOutcome::MoreWork {
                    more.push(member);
                }
            }
            pending = more;
        }
        if !pending.is_empty() {
            tracing::debug!(
                rounds = round,
                modules = pending.len(),
                "Deferred type checking stopped at the round limit"
            );
        }

        for member in members {
            self.driver
                .run_pass(Pass::Finish, &member.parsed, &member.dependencies)?;
        }
        Ok(())
    }

    /// Collect a processed member's output, compare its interface and write
    /// its cache record.
    fn finish_module(
        &mut self,
        id: &ModuleId,
        newest_dependency_payload: Option<u64>,
    ) -> Result<()> {
        let node = self.graph.node(id)?;
        let path = node.path.clone();

        let Some(parsed) = node.source.parsed_module().cloned() else {
            // unparsable: nothing to compare or cache
            let ignore_all = node.ignore_all;
            self.graph.node_mut(id)?.mark_interface_stale();
            self.record_rebuilt(id, path, None, ignore_all);
            return Ok(());
        };

        let output = self.driver.module_output(&parsed)?;
        let node = self.graph.node(id)?;
        let ignore_all = node.ignore_all;
        if !ignore_all {
            self.result
                .diagnostics
                .extend(output.diagnostics.iter().cloned().map(|mut diag| {
                    diag.module.get_or_insert_with(|| id.clone());
                    diag
                }));
        }

        let unchanged = node.interface_hash.as_deref() == Some(output.interface_hash.as_str());
        if unchanged {
            tracing::trace!(module = %id, "Interface is unchanged");
        } else {
            tracing::trace!(module = %id, "Interface has changed");
            self.graph.node_mut(id)?.mark_interface_stale();
        }

        // a record would hide this build's diagnostics on the next one
        let written = if self.has_diagnostics(id) {
            tracing::debug!(module = %id, "Not caching a module with diagnostics");
            self.graph.node_mut(id)?.mark_interface_stale();
            self.discard_record(id)?;
            None
        } else {
            self.write_cache(id, &output, unchanged, newest_dependency_payload)?
        };
        let node = self.graph.node_mut(id)?;
        node.source = NodeSource::FromParse { parsed, written };
        node.interface_hash = Some(output.interface_hash.clone());

        self.record_rebuilt(id, path, Some(output.interface_hash), ignore_all);
        Ok(())
    }

    fn has_diagnostics(&self, id: &ModuleId) -> bool {
        self.result.diagnostics.iter().any(|diag| {
            diag.module.as_ref() == Some(id) && diag.kind != DiagnosticKind::CacheWrite
        })
    }

    /// Remove whatever record `id` has on disk.
    fn discard_record(&self, id: &ModuleId) -> Result<()> {
        let node = self.graph.node(id)?;
        if let Some(path) = &node.path {
            if let Err(err) = self.ctx.store.remove(id, path) {
                tracing::trace!(module = %id, error = %err, "Failed to remove stale cache record");
            }
        }
        Ok(())
    }

    fn record_rebuilt(
        &mut self,
        id: &ModuleId,
        path: Option<PathBuf>,
        interface_hash: Option<String>,
        ignore_all: bool,
    ) {
        let module = AnalyzedModule {
            id: id.clone(),
            path,
            interface_hash,
            origin: Origin::Source,
            ignore_all,
        };
        self.result.modules.insert(id.clone(), module);
        self.result.states.insert(id.clone(), ModuleState::Rebuilt);
        self.result.stats.rebuilt += 1;
    }

    /// Write the record of a processed module. Failures are reported and the
    /// stale record is removed so the next build processes the module again.
    fn write_cache(
        &mut self,
        id: &ModuleId,
        output: &ModuleOutput,
        interface_unchanged: bool,
        newest_dependency_payload: Option<u64>,
    ) -> Result<Option<CacheMetadata>> {
        if !self.ctx.config.write_cache {
            return Ok(None);
        }
        let node = self.graph.node(id)?;
        let Some(path) = node.path.clone() else {
            return Ok(None);
        };
        if node.inline_source.is_some() {
            return Ok(None);
        }

        let edges = |ids: &[ModuleId]| -> Vec<(ModuleId, Priority)> {
            ids.iter().map(|dep| (dep.clone(), node.priority(dep))).collect()
        };
        let request = WriteRequest {
            module_id: id,
            source_path: &path,
            dependencies: edges(&node.dependencies),
            suppressed: edges(&node.suppressed),
            child_modules: node.child_modules.clone(),
            options_fingerprint: self.ctx.fingerprint(id)?,
            interface_hash: output.interface_hash.clone(),
            payload: &output.payload,
            reuse_payload: interface_unchanged,
            newest_dependency_payload,
            ignore_all: node.ignore_all,
        };

        match self.ctx.store.write(request) {
            Ok(outcome) => {
                self.result.stats.cache_writes += 1;
                if !outcome.payload_written {
                    self.result.stats.metadata_only_writes += 1;
                }
                Ok(Some(outcome.meta))
            }
            Err(err) => {
                tracing::warn!(module = %id, error = %err, "Failed to write cache record");
                self.result.diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::CacheWrite,
                        format!("Cannot write cache record: {err}"),
                    )
                    .in_module(id.clone()),
                );
                self.discard_record(id)?;
                Ok(None)
            }
        }
    }
}
