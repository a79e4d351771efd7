//! Module graph construction.
//!
//! Breadth-first discovery from the roots. Each newly seen module is either
//! seeded from a validated cache record or parsed, and its imports and
//! enclosing packages are queued in turn. Once the queue drains, packages
//! whose set of submodules no longer matches their record are reparsed and
//! their imports discovered as well, until nothing changes.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_graph::{
    ImportRecord, ModuleGraph, ModuleId, ModuleNode, NodeSource, ParsedModule, Priority,
};

use crate::build::BuildContext;
use crate::cache::CacheError;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::driver::{AnalysisDriver, ModuleSource, ParseError};
use crate::runtime::absolutize;
use crate::session::BuildSession;
use crate::{BuildError, Result};

/// A module to build from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub id: ModuleId,
    /// Explicit source file. Located on the search path when absent.
    pub path: Option<PathBuf>,
    /// Inline source. Takes precedence over the file and bypasses the cache.
    pub text: Option<String>,
}

impl RootSpec {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            path: None,
            text: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Outcome of handing a module's source to the driver.
pub(crate) enum Parsed {
    Module {
        parsed: ParsedModule,
        imports: Vec<ImportRecord>,
    },
    /// Non-blocking failure on a non-root module.
    Failed(ParseError),
}

/// Read and parse a module. Blocking errors and root parse failures end the
/// build.
pub(crate) fn parse_module(
    ctx: &BuildContext,
    driver: &mut dyn AnalysisDriver,
    id: &ModuleId,
    path: Option<&Path>,
    inline: Option<&Arc<str>>,
    is_root: bool,
) -> Result<Parsed> {
    let text: Arc<str> = match (inline, path) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => {
            let bytes = ctx.runtime.read_file(path)?;
            String::from_utf8(bytes)
                .map_err(|_| BuildError::BlockingError {
                    module: id.clone(),
                    line: None,
                    message: "source is not valid UTF-8".to_string(),
                })?
                .into()
        }
        (None, None) => {
            return Err(BuildError::RootNotFound {
                module: id.clone(),
            });
        }
    };

    let options = ctx.config.options_for(id.as_str());
    let source = ModuleSource {
        path: path.map(Path::to_path_buf),
        text,
    };
    tracing::debug!(module = %id, "Parsing");
    match driver.parse(id, &source, &options) {
        Ok(parsed) => {
            let imports = driver.extract(&parsed);
            Ok(Parsed::Module { parsed, imports })
        }
        Err(err) if err.blocking => Err(BuildError::BlockingError {
            module: id.clone(),
            line: err.line,
            message: err.message,
        }),
        Err(err) if is_root => Err(BuildError::RootParseFailed {
            module: id.clone(),
            message: err.message,
        }),
        Err(err) => Ok(Parsed::Failed(err)),
    }
}

/// Install a parse outcome on `node`, replacing its edges. Returns the
/// warning for a failed parse.
pub(crate) fn apply_parsed(
    ctx: &BuildContext,
    node: &mut ModuleNode,
    parsed: Parsed,
) -> Option<Diagnostic> {
    match parsed {
        Parsed::Module { parsed, imports } => {
            node.apply_imports(&imports);
            for prelude in &ctx.prelude {
                node.add_implicit_dependency(prelude.clone(), Priority::High);
            }
            node.source = NodeSource::parsed(parsed);
            node.ignore_all = ctx.config.options_for(node.id.as_str()).ignore_errors;
            None
        }
        Parsed::Failed(err) => {
            node.apply_imports(&[]);
            node.source = NodeSource::Unparsable {
                reason: err.message.clone(),
            };
            node.ignore_all = true;
            Some(
                Diagnostic::warning(
                    DiagnosticKind::ParseError,
                    format!("{}; errors in this module are ignored", err.message),
                )
                .in_module(node.id.clone())
                .at_line(err.line),
            )
        }
    }
}

/// Diagnostic for an import that could not be located, unless policy hides
/// it.
pub(crate) fn missing_import(
    ctx: &BuildContext,
    importer: &ModuleNode,
    dep: &ModuleId,
) -> Option<Diagnostic> {
    if ctx.config.ignore_missing_imports || importer.ignore_all {
        return None;
    }
    Some(
        Diagnostic::warning(
            DiagnosticKind::MissingImport,
            format!("Cannot find implementation or library stub for module named '{dep}'"),
        )
        .in_module(importer.id.clone())
        .at_line(importer.dep_lines.get(dep).copied()),
    )
}

/// A discovered graph and the diagnostics found on the way.
#[derive(Debug)]
pub struct LoadedGraph {
    pub graph: ModuleGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Breadth-first graph discovery.
pub(crate) struct ModuleGraphBuilder<'a> {
    ctx: &'a BuildContext,
    session: &'a mut BuildSession,
    driver: &'a mut dyn AnalysisDriver,
    graph: ModuleGraph,
    queue: VecDeque<ModuleId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ModuleGraphBuilder<'a> {
    pub(crate) fn new(
        ctx: &'a BuildContext,
        session: &'a mut BuildSession,
        driver: &'a mut dyn AnalysisDriver,
    ) -> Self {
        Self {
            ctx,
            session,
            driver,
            graph: ModuleGraph::new(),
            queue: VecDeque::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn build(mut self, roots: &[RootSpec]) -> Result<LoadedGraph> {
        for (i, root) in roots.iter().enumerate() {
            if roots[..i].iter().any(|other| other.id == root.id) {
                return Err(BuildError::DuplicateModule(root.id.clone()));
            }
        }
        for root in roots {
            let node = self.load_root(root)?;
            self.insert(node)?;
        }

        loop {
            while let Some(id) = self.queue.pop_front() {
                self.process(&id)?;
            }

            let changed: Vec<ModuleId> = self
                .graph
                .nodes()
                .filter(|node| node.has_new_submodules())
                .map(|node| node.id.clone())
                .collect();
            if changed.is_empty() {
                break;
            }
            for id in changed {
                tracing::debug!(module = %id, "Submodules changed; reparsing");
                self.reparse(&id)?;
                self.queue.push_back(id);
            }
        }

        tracing::debug!(modules = self.graph.len(), "Module graph complete");
        Ok(LoadedGraph {
            graph: self.graph,
            diagnostics: self.diagnostics,
        })
    }

    fn insert(&mut self, node: ModuleNode) -> Result<()> {
        let id = node.id.clone();
        self.graph.insert(node)?;
        self.queue.push_back(id);
        Ok(())
    }

    fn locate(&mut self, id: &ModuleId) -> Option<PathBuf> {
        self.ctx
            .locator
            .find(self.session, id, &self.ctx.search_path)
    }

    fn load_root(&mut self, root: &RootSpec) -> Result<ModuleNode> {
        let not_found = || BuildError::RootNotFound {
            module: root.id.clone(),
        };
        let path = match (&root.path, &root.text) {
            (Some(path), text) => {
                let path = absolutize(self.ctx.runtime.as_ref(), path)?;
                if text.is_none() && !self.ctx.runtime.exists(&path) {
                    return Err(not_found());
                }
                Some(path)
            }
            (None, Some(_)) => None,
            (None, None) => Some(self.locate(&root.id).ok_or_else(not_found)?),
        };
        let text = root.text.as_deref().map(Arc::<str>::from);
        self.load_node(&root.id, path, text, true)
    }

    /// Create the node for `id`, from cache when its record validates.
    fn load_node(
        &mut self,
        id: &ModuleId,
        path: Option<PathBuf>,
        text: Option<Arc<str>>,
        is_root: bool,
    ) -> Result<ModuleNode> {
        let order = self.graph.next_order();
        let mut prior_hash = None;

        if text.is_none() && self.ctx.config.incremental {
            if let Some(path) = &path {
                let fingerprint = self.ctx.fingerprint(id)?;
                match self.ctx.store.read_metadata(id, path) {
                    Ok(meta) => match self.ctx.store.validate(&meta, path, &fingerprint) {
                        Ok(()) => {
                            tracing::debug!(module = %id, "Seeded from cache");
                            return Ok(ModuleNode::builder(
                                id.clone(),
                                order,
                                NodeSource::FromCache(meta),
                            )
                            .path(path.clone())
                            .root(is_root)
                            .build());
                        }
                        Err(reason) => {
                            tracing::trace!(module = %id, %reason, "Cache record is stale");
                            prior_hash = Some(meta.interface_hash);
                        }
                    },
                    Err(CacheError::CacheMiss) => {
                        tracing::trace!(module = %id, "No cache record");
                    }
                    Err(err) => {
                        tracing::trace!(module = %id, error = %err, "Ignoring unreadable cache record");
                    }
                }
            }
        }

        let parsed = parse_module(
            self.ctx,
            self.driver,
            id,
            path.as_deref(),
            text.as_ref(),
            is_root,
        )?;

        let placeholder = NodeSource::Unparsable {
            reason: String::new(),
        };
        let mut builder = ModuleNode::builder(id.clone(), order, placeholder)
            .root(is_root)
            .interface_hash(prior_hash);
        if let Some(path) = &path {
            builder = builder.path(path.clone());
            if let Ok(stat) = self.ctx.runtime.metadata(path) {
                builder = builder.source_size(stat.size);
            }
        }
        if let Some(text) = text {
            builder = builder.inline_source(text);
        }
        let mut node = builder.build();

        if let Some(warning) = apply_parsed(self.ctx, &mut node, parsed) {
            self.diagnostics.push(warning);
        }
        Ok(node)
    }

    fn load_dependency(&mut self, id: &ModuleId) -> Result<Option<ModuleNode>> {
        match self.locate(id) {
            Some(path) => self.load_node(id, Some(path), None, false).map(Some),
            None => Ok(None),
        }
    }

    fn process(&mut self, id: &ModuleId) -> Result<()> {
        let node = self.graph.node(id)?;
        let ancestors = node.ancestors.clone();
        let dependencies = node.dependencies.clone();
        let suppressed = node.suppressed.clone();
        let is_root = node.is_root;
        let from_cache = node.source.is_from_cache();

        for ancestor in &ancestors {
            if !self.graph.contains(ancestor) {
                match self.load_dependency(ancestor)? {
                    Some(node) => self.insert(node)?,
                    None if is_root => {
                        return Err(BuildError::MissingAncestor {
                            module: id.clone(),
                            ancestor: ancestor.clone(),
                        });
                    }
                    None => {
                        if !self.ctx.config.ignore_missing_imports {
                            self.diagnostics.push(
                                Diagnostic::warning(
                                    DiagnosticKind::MissingAncestor,
                                    format!("Cannot find package '{ancestor}'"),
                                )
                                .in_module(id.clone()),
                            );
                        }
                        continue;
                    }
                }
            }
            self.graph
                .node_mut(ancestor)?
                .child_modules
                .insert(id.clone());
        }

        for dep in &dependencies {
            if self.graph.contains(dep) {
                continue;
            }
            if self.ctx.config.is_excluded(dep.as_str()) {
                self.graph.node_mut(id)?.suppress(dep);
                continue;
            }
            match self.load_dependency(dep)? {
                Some(node) => self.insert(node)?,
                None => {
                    let importer = self.graph.node_mut(id)?;
                    importer.suppress(dep);
                    // the cached importer is stale now and reports it once reparsed
                    if !from_cache {
                        if let Some(diag) = missing_import(self.ctx, importer, dep) {
                            self.diagnostics.push(diag);
                        }
                    }
                }
            }
        }

        for dep in &suppressed {
            if self.ctx.config.is_excluded(dep.as_str()) {
                continue;
            }
            if !self.graph.contains(dep) {
                match self.load_dependency(dep)? {
                    Some(node) => self.insert(node)?,
                    None => continue,
                }
            }
            tracing::debug!(module = %id, dependency = %dep, "Previously missing import resolved");
            self.graph.node_mut(id)?.unsuppress(dep);
        }
        Ok(())
    }

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
        node.mark_interface_stale();
        self.diagnostics.extend(warning);
        Ok(())
    }
}
