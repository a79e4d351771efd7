//! Per-build lookup caches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_graph::ModuleId;
use rustc_hash::{FxHashMap, FxHashSet};

/// Ordered list of directories searched for modules.
///
/// Cheap to clone and usable as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchPath(Arc<[PathBuf]>);

impl SearchPath {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self(dirs.into_iter().collect())
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lookup state scoped to one build invocation.
///
/// Module lookups and directory listings are memoized here. Nothing in the
/// session outlives a build unless the caller keeps the session around; the
/// builder resets it on entry, so a new build always sees the filesystem as
/// it is now.
#[derive(Debug, Default)]
pub struct BuildSession {
    lookups: FxHashMap<(ModuleId, SearchPath), Option<PathBuf>>,
    listings: FxHashMap<PathBuf, Option<Arc<FxHashSet<String>>>>,
    lookup_hits: usize,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached lookup and listing.
    pub fn reset(&mut self) {
        self.lookups.clear();
        self.listings.clear();
        self.lookup_hits = 0;
    }

    pub(crate) fn cached_lookup(
        &mut self,
        id: &ModuleId,
        search_path: &SearchPath,
    ) -> Option<Option<PathBuf>> {
        let hit = self
            .lookups
            .get(&(id.clone(), search_path.clone()))
            .cloned();
        if hit.is_some() {
            self.lookup_hits += 1;
        }
        hit
    }

    pub(crate) fn store_lookup(
        &mut self,
        id: &ModuleId,
        search_path: &SearchPath,
        result: Option<PathBuf>,
    ) {
        self.lookups
            .insert((id.clone(), search_path.clone()), result);
    }

    /// Cached listing of `dir`: `Some(None)` records a directory that does
    /// not exist, `None` means the directory was never listed.
    pub(crate) fn cached_listing(&self, dir: &Path) -> Option<Option<Arc<FxHashSet<String>>>> {
        self.listings.get(dir).cloned()
    }

    pub(crate) fn store_listing(&mut self, dir: PathBuf, listing: Option<Arc<FxHashSet<String>>>) {
        self.listings.insert(dir, listing);
    }

    /// Number of memoized module lookups.
    pub fn cached_lookups(&self) -> usize {
        self.lookups.len()
    }

    /// Number of lookups answered from the cache since the last reset.
    pub fn lookup_hits(&self) -> usize {
        self.lookup_hits
    }

    pub fn cached_listings(&self) -> usize {
        self.listings.len()
    }
}
