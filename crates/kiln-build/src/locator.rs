//! Module id → source file resolution.
//!
//! For `a.b.c` and each search directory `base`, in search path order:
//!
//! ```text
//! base/a/b/c/<marker>.<ext>   package form, preferred
//! base/a/b/c.<ext>            module form
//! ```
//!
//! Extensions are tried in configured order, so a stub (`pyi`) shadows a
//! plain source (`py`) in the same directory. A candidate is only accepted
//! when every containing package (`base/a`, `base/a/b`) has a marker file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::LayoutConfig;
use kiln_graph::ModuleId;
use rustc_hash::FxHashSet;

use crate::runtime::Runtime;
use crate::session::{BuildSession, SearchPath};

/// Resolves module ids to source files.
#[derive(Debug, Clone)]
pub struct ModuleLocator {
    runtime: Arc<dyn Runtime>,
    layout: LayoutConfig,
}

impl ModuleLocator {
    pub fn new(runtime: Arc<dyn Runtime>, layout: LayoutConfig) -> Self {
        Self { runtime, layout }
    }

    /// Locate `id` on `search_path`. Positive and negative results are
    /// memoized in `session`.
    pub fn find(
        &self,
        session: &mut BuildSession,
        id: &ModuleId,
        search_path: &SearchPath,
    ) -> Option<PathBuf> {
        if let Some(hit) = session.cached_lookup(id, search_path) {
            return hit;
        }
        let found = self.find_uncached(session, id, search_path);
        match &found {
            Some(path) => tracing::trace!(module = %id, path = %path.display(), "Located module"),
            None => tracing::trace!(module = %id, "Module not found on search path"),
        }
        session.store_lookup(id, search_path, found.clone());
        found
    }

    /// Whether `path` names a package marker file.
    pub fn is_package_file(&self, path: &Path) -> bool {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem == self.layout.package_marker)
    }

    fn find_uncached(
        &self,
        session: &mut BuildSession,
        id: &ModuleId,
        search_path: &SearchPath,
    ) -> Option<PathBuf> {
        let components: Vec<&str> = id.components().collect();
        let (last, packages) = components.split_last()?;

        for base in search_path.dirs() {
            let mut dir = base.clone();
            dir.extend(packages.iter());
            if self.listing(session, &dir).is_none() {
                continue;
            }

            let package_dir = dir.join(last);
            let candidates = self
                .marker_names()
                .map(|name| package_dir.join(name))
                .chain(
                    self.layout
                        .extensions
                        .iter()
                        .map(|ext| dir.join(format!("{last}.{ext}"))),
                );

            for candidate in candidates {
                if self.file_exists(session, &candidate)
                    && self.packages_have_markers(session, base, packages)
                {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn marker_names(&self) -> impl Iterator<Item = String> + '_ {
        self.layout
            .extensions
            .iter()
            .map(|ext| format!("{}.{ext}", self.layout.package_marker))
    }

    /// Every directory between `base` and the module holds a marker file.
    fn packages_have_markers(
        &self,
        session: &mut BuildSession,
        base: &Path,
        packages: &[&str],
    ) -> bool {
        let mut dir = base.to_path_buf();
        for package in packages {
            dir.push(package);
            let Some(listing) = self.listing(session, &dir) else {
                return false;
            };
            if !self.marker_names().any(|name| listing.contains(&name)) {
                return false;
            }
        }
        true
    }

    fn file_exists(&self, session: &mut BuildSession, path: &Path) -> bool {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return false;
        };
        self.listing(session, parent)
            .is_some_and(|listing| listing.contains(name))
    }

    fn listing(&self, session: &mut BuildSession, dir: &Path) -> Option<Arc<FxHashSet<String>>> {
        if let Some(cached) = session.cached_listing(dir) {
            return cached;
        }
        let listing = self
            .runtime
            .read_dir(dir)
            .ok()
            .map(|names| Arc::new(names.into_iter().collect::<FxHashSet<_>>()));
        session.store_listing(dir.to_path_buf(), listing.clone());
        listing
    }
}
