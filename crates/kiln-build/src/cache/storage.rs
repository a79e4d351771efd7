//! Record storage on top of the [`Runtime`] filesystem.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::BuildConfig;
use kiln_graph::{CacheMetadata, ModuleId, Priority};

use super::key::CachePaths;
use super::serialize::PayloadEnvelope;
use super::{CacheError, CacheResult};
use crate::runtime::{Runtime, RuntimeError, absolutize, write_atomic};

/// Everything needed to write one module's record.
#[derive(Debug, Clone)]
pub struct WriteRequest<'a> {
    pub module_id: &'a ModuleId,
    pub source_path: &'a Path,
    pub dependencies: Vec<(ModuleId, Priority)>,
    pub suppressed: Vec<(ModuleId, Priority)>,
    pub child_modules: BTreeSet<ModuleId>,
    pub options_fingerprint: String,
    pub interface_hash: String,
    pub payload: &'a [u8],
    /// Keep the payload already on disk when there is one. Only valid when
    /// the module's interface is unchanged.
    pub reuse_payload: bool,
    /// Newest payload mtime among the module's dependencies outside its SCC.
    /// An existing payload older than this is rewritten, otherwise the record
    /// would be out of date as soon as it is written.
    pub newest_dependency_payload: Option<u64>,
    pub ignore_all: bool,
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub meta: CacheMetadata,
    /// False when only the metadata file was rewritten.
    pub payload_written: bool,
}

/// Reads and writes per-module cache records.
#[derive(Debug, Clone)]
pub struct CacheStore {
    runtime: Arc<dyn Runtime>,
    root: PathBuf,
    package_marker: String,
    tool_version: String,
}

impl CacheStore {
    /// `root` is the directory for one target version.
    pub fn new(
        runtime: Arc<dyn Runtime>,
        root: impl Into<PathBuf>,
        package_marker: impl Into<String>,
        tool_version: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            root: root.into(),
            package_marker: package_marker.into(),
            tool_version: tool_version.into(),
        }
    }

    /// Store rooted at `<cache-dir>/<target-version>`.
    pub fn from_config(runtime: Arc<dyn Runtime>, config: &BuildConfig) -> CacheResult<Self> {
        let cache_dir = absolutize(runtime.as_ref(), &config.cache_dir)?;
        let root = cache_dir.join(&config.target_version);
        Ok(Self::new(
            runtime,
            root,
            config.layout.package_marker.clone(),
            config.tool_version.clone(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub(crate) fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    /// Record locations for `id`, whose source lives at `source_path`.
    pub fn paths(&self, id: &ModuleId, source_path: &Path) -> CachePaths {
        let is_package = source_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem == self.package_marker);
        CachePaths::new(&self.root, id, is_package, &self.package_marker)
    }

    /// Read the structural record for `id` without validating it against the
    /// source.
    pub fn read_metadata(&self, id: &ModuleId, source_path: &Path) -> CacheResult<CacheMetadata> {
        let paths = self.paths(id, source_path);
        let data = match self.runtime.read_file(&paths.meta) {
            Ok(data) => data,
            Err(RuntimeError::FileNotFound(_)) => return Err(CacheError::CacheMiss),
            Err(e) => return Err(e.into()),
        };
        let meta: CacheMetadata = serde_json::from_slice(&data)
            .map_err(|e| CacheError::Corrupted(format!("{}: {e}", paths.meta.display())))?;

        if meta.module_id != *id {
            return Err(CacheError::Corrupted(format!(
                "record for '{}' stored under '{id}'",
                meta.module_id
            )));
        }
        if !meta.is_well_formed() {
            return Err(CacheError::Corrupted(format!(
                "dependency and priority lists of '{id}' differ in length"
            )));
        }
        Ok(meta)
    }

    /// Write the payload (unless it can be reused) and then the record.
    ///
    /// The record is written last, so a record on disk always points at a
    /// complete payload.
    pub fn write(&self, request: WriteRequest<'_>) -> CacheResult<WriteOutcome> {
        let paths = self.paths(request.module_id, request.source_path);
        let source = self.runtime.metadata(request.source_path)?;

        if let Some(parent) = paths.meta.parent() {
            self.runtime.create_dir(parent, true)?;
        }

        let existing_payload = if request.reuse_payload {
            self.runtime
                .metadata(&paths.data)
                .ok()
                .and_then(|m| m.modified)
                .filter(|mtime| {
                    request
                        .newest_dependency_payload
                        .is_none_or(|newest| *mtime >= newest)
                })
        } else {
            None
        };
        let (payload_mtime, payload_written) = match existing_payload {
            Some(mtime) => (mtime, false),
            None => {
                let envelope =
                    PayloadEnvelope::new(request.module_id.as_str(), request.payload.to_vec());
                write_atomic(self.runtime.as_ref(), &paths.data, &envelope.encode()?)?;
                (self.runtime.metadata(&paths.data)?.mtime(), true)
            }
        };

        let (dependency_list, dep_priorities) = request.dependencies.into_iter().unzip();
        let (suppressed_list, suppressed_priorities) = request.suppressed.into_iter().unzip();
        let meta = CacheMetadata {
            module_id: request.module_id.clone(),
            source_path: request.source_path.to_path_buf(),
            source_mtime: source.mtime(),
            source_size: source.size,
            dependency_list,
            dep_priorities,
            suppressed_list,
            suppressed_priorities,
            child_modules: request.child_modules,
            options_fingerprint: request.options_fingerprint,
            interface_hash: request.interface_hash,
            payload_mtime,
            payload_location: paths.data.clone(),
            tool_version: self.tool_version.clone(),
            ignore_all: request.ignore_all,
        };
        let json = serde_json::to_vec_pretty(&meta)?;
        write_atomic(self.runtime.as_ref(), &paths.meta, &json)?;

        tracing::trace!(
            module = %meta.module_id,
            payload_written,
            "Wrote cache record"
        );
        Ok(WriteOutcome {
            meta,
            payload_written,
        })
    }

    /// Load and unwrap the payload a validated record points at.
    pub fn load_payload(&self, meta: &CacheMetadata) -> CacheResult<Vec<u8>> {
        let data = self.runtime.read_file(&meta.payload_location)?;
        let envelope = PayloadEnvelope::decode(&data, meta.module_id.as_str())?;
        Ok(envelope.bytes)
    }

    /// Delete the record of `id` so the next build processes it again. A
    /// missing record is not an error.
    pub fn remove(&self, id: &ModuleId, source_path: &Path) -> CacheResult<()> {
        let paths = self.paths(id, source_path);
        match self.runtime.remove_file(&paths.meta) {
            Ok(()) | Err(RuntimeError::FileNotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
