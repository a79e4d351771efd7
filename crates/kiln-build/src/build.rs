//! Build entry points.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use kiln_config::BuildConfig;
use kiln_graph::{GraphDump, GraphError, ModuleId, Priority, decompose};

use crate::cache::{CacheResult, CacheStore, options_fingerprint};
use crate::driver::AnalysisDriver;
use crate::loader::{LoadedGraph, ModuleGraphBuilder, RootSpec};
use crate::locator::ModuleLocator;
use crate::result::BuildResult;
use crate::runtime::{NativeRuntime, Runtime, absolutize};
use crate::scheduler::ProcessingScheduler;
use crate::session::{BuildSession, SearchPath};
use crate::Result;

/// Everything derived from the configuration once per build.
#[derive(Debug)]
pub(crate) struct BuildContext {
    pub config: BuildConfig,
    pub runtime: Arc<dyn Runtime>,
    pub locator: ModuleLocator,
    pub store: CacheStore,
    pub search_path: SearchPath,
    pub prelude: Vec<ModuleId>,
}

impl BuildContext {
    pub(crate) fn new(config: &BuildConfig, runtime: Arc<dyn Runtime>) -> Result<Self> {
        config.validate()?;

        let search_path = config
            .search_paths
            .iter()
            .map(|dir| absolutize(runtime.as_ref(), dir))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let prelude = config
            .prelude
            .iter()
            .map(ModuleId::new)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(GraphError::from)?;

        Ok(Self {
            locator: ModuleLocator::new(runtime.clone(), config.layout.clone()),
            store: CacheStore::from_config(runtime.clone(), config)?,
            search_path: SearchPath::new(search_path),
            prelude,
            config: config.clone(),
            runtime,
        })
    }

    /// Fingerprint recorded in and checked against the record of `id`.
    pub(crate) fn fingerprint(&self, id: &ModuleId) -> CacheResult<String> {
        options_fingerprint(&self.config.options_for(id.as_str()), &self.prelude)
    }
}

/// An incremental build over one filesystem.
///
/// A `Build` can be run repeatedly; each run rediscovers the graph, reuses
/// whatever cache records are still valid and rewrites the rest.
///
/// ```rust,no_run
/// use kiln_build::{Build, RootSpec, ScriptDriver};
/// use kiln_config::BuildConfig;
/// use kiln_graph::ModuleId;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BuildConfig::default().with_search_path("src");
/// let mut driver = ScriptDriver::new();
/// let result = Build::new(config).build(&mut driver, &[RootSpec::new(ModuleId::new("app")?)])?;
/// for diagnostic in &result.diagnostics {
///     eprintln!("{diagnostic}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Build {
    config: BuildConfig,
    runtime: Arc<dyn Runtime>,
    session: BuildSession,
    cancel: Option<Arc<AtomicBool>>,
}

impl Build {
    /// Build against the native filesystem.
    pub fn new(config: BuildConfig) -> Self {
        Self::with_runtime(config, Arc::new(NativeRuntime::new()))
    }

    pub fn with_runtime(config: BuildConfig, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            config,
            runtime,
            session: BuildSession::new(),
            cancel: None,
        }
    }

    /// Stop before the next SCC once `flag` is set.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Discover the graph from `roots`, then load or rebuild every module.
    pub fn build(
        &mut self,
        driver: &mut dyn AnalysisDriver,
        roots: &[RootSpec],
    ) -> Result<BuildResult> {
        let ctx = BuildContext::new(&self.config, self.runtime.clone())?;
        tracing::info!(roots = roots.len(), "Starting build");

        let LoadedGraph {
            mut graph,
            diagnostics,
        } = self.load_graph(&ctx, driver, roots)?;
        let ids: Vec<ModuleId> = graph.ids().cloned().collect();
        let sccs = decompose(&graph, &ids, Priority::All);
        tracing::debug!(modules = ids.len(), sccs = sccs.len(), "Decomposed module graph");

        let result = ProcessingScheduler::new(&ctx, driver, &mut graph, self.cancel.as_deref())
            .run(&sccs, diagnostics)?;
        tracing::info!(
            rebuilt = result.stats.rebuilt,
            fresh = result.stats.fresh_applied,
            unloaded = result.stats.nodes_left_in_queue,
            "Build finished"
        );
        Ok(result)
    }

    /// Discover the graph from `roots` and describe its SCCs without
    /// processing anything.
    pub fn dump_graph(
        &mut self,
        driver: &mut dyn AnalysisDriver,
        roots: &[RootSpec],
    ) -> Result<GraphDump> {
        let ctx = BuildContext::new(&self.config, self.runtime.clone())?;
        let LoadedGraph { graph, .. } = self.load_graph(&ctx, driver, roots)?;
        let ids: Vec<ModuleId> = graph.ids().cloned().collect();
        let sccs = decompose(&graph, &ids, Priority::All);
        Ok(GraphDump::from_sccs(&graph, &sccs))
    }

    fn load_graph(
        &mut self,
        ctx: &BuildContext,
        driver: &mut dyn AnalysisDriver,
        roots: &[RootSpec],
    ) -> Result<LoadedGraph> {
        self.session.reset();
        ModuleGraphBuilder::new(ctx, &mut self.session, driver).build(roots)
    }
}

/// Run a single build against the native filesystem.
pub fn build(
    config: BuildConfig,
    driver: &mut dyn AnalysisDriver,
    roots: &[RootSpec],
) -> Result<BuildResult> {
    Build::new(config).build(driver, roots)
}
