#![allow(dead_code)]

use std::sync::Arc;

use kiln_build::runtime::MemoryRuntime;
use kiln_build::{Build, BuildError, BuildResult, RootSpec, ScriptDriver};
use kiln_config::BuildConfig;
use kiln_graph::ModuleId;

pub fn id(name: &str) -> ModuleId {
    ModuleId::new(name).unwrap()
}

pub fn ids(names: &[&str]) -> Vec<ModuleId> {
    names.iter().map(|name| id(name)).collect()
}

pub fn roots(names: &[&str]) -> Vec<RootSpec> {
    names.iter().map(|name| RootSpec::new(id(name))).collect()
}

/// A source tree under `/work/src` on an in-memory filesystem, built with a
/// fresh driver on every run.
pub struct Project {
    pub runtime: Arc<MemoryRuntime>,
    pub config: BuildConfig,
}

impl Project {
    pub fn new() -> Self {
        Self {
            runtime: Arc::new(MemoryRuntime::new("/work")),
            config: BuildConfig::default().with_search_path("src"),
        }
    }

    /// Write `src/<path>`.
    pub fn file(&self, path: &str, text: &str) -> &Self {
        self.runtime.add_file(format!("/work/src/{path}"), text);
        self
    }

    pub fn remove(&self, path: &str) {
        self.runtime.remove(format!("/work/src/{path}"));
    }

    pub fn try_build(&self, roots: &[RootSpec]) -> Result<(BuildResult, ScriptDriver), BuildError> {
        let mut driver = ScriptDriver::new();
        let mut build = Build::with_runtime(self.config.clone(), self.runtime.clone());
        let result = build.build(&mut driver, roots)?;
        Ok((result, driver))
    }

    pub fn build(&self, names: &[&str]) -> (BuildResult, ScriptDriver) {
        self.try_build(&roots(names)).unwrap()
    }
}
