//! Record validation.
//!
//! A record is only trusted when it still describes the module's current
//! source file, was produced by this tool version under the module's current
//! options, and still points at its payload.

use std::fmt;
use std::path::Path;

use kiln_graph::CacheMetadata;

use super::storage::CacheStore;

/// Why a structurally valid record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    PathMismatch,
    ToolVersion { recorded: String },
    OptionsChanged,
    PayloadMissing,
    PayloadMtime { recorded: u64, actual: u64 },
    SourceMissing,
    SizeChanged { recorded: u64, actual: u64 },
    MtimeChanged { recorded: u64, actual: u64 },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::PathMismatch => f.write_str("source path changed"),
            StaleReason::ToolVersion { recorded } => {
                write!(f, "written by tool version {recorded}")
            }
            StaleReason::OptionsChanged => f.write_str("options changed"),
            StaleReason::PayloadMissing => f.write_str("payload missing"),
            StaleReason::PayloadMtime { recorded, actual } => {
                write!(f, "payload mtime {actual} differs from recorded {recorded}")
            }
            StaleReason::SourceMissing => f.write_str("source file missing"),
            StaleReason::SizeChanged { recorded, actual } => {
                write!(f, "source size {actual} differs from recorded {recorded}")
            }
            StaleReason::MtimeChanged { recorded, actual } => {
                write!(f, "source mtime {actual} differs from recorded {recorded}")
            }
        }
    }
}

impl CacheStore {
    /// Check `meta` against the module's current state.
    ///
    /// `source_path` must be absolute; `fingerprint` is the fingerprint of the
    /// module's effective options for this build.
    pub fn validate(
        &self,
        meta: &CacheMetadata,
        source_path: &Path,
        fingerprint: &str,
    ) -> Result<(), StaleReason> {
        if meta.source_path != source_path {
            return Err(StaleReason::PathMismatch);
        }
        if meta.tool_version != self.tool_version() {
            return Err(StaleReason::ToolVersion {
                recorded: meta.tool_version.clone(),
            });
        }
        if meta.options_fingerprint != fingerprint {
            return Err(StaleReason::OptionsChanged);
        }

        let payload = self
            .runtime()
            .metadata(&meta.payload_location)
            .map_err(|_| StaleReason::PayloadMissing)?;
        if payload.mtime() != meta.payload_mtime {
            return Err(StaleReason::PayloadMtime {
                recorded: meta.payload_mtime,
                actual: payload.mtime(),
            });
        }

        let source = self
            .runtime()
            .metadata(source_path)
            .map_err(|_| StaleReason::SourceMissing)?;
        if source.size != meta.source_size {
            return Err(StaleReason::SizeChanged {
                recorded: meta.source_size,
                actual: source.size,
            });
        }
        if source.mtime() != meta.source_mtime {
            return Err(StaleReason::MtimeChanged {
                recorded: meta.source_mtime,
                actual: source.mtime(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use kiln_graph::ModuleId;

    use super::*;
    use crate::cache::WriteRequest;
    use crate::runtime::MemoryRuntime;

    fn setup() -> (Arc<MemoryRuntime>, CacheStore, CacheMetadata) {
        let runtime = Arc::new(MemoryRuntime::default());
        runtime.add_file("/src/m.py", "def f(): pass\n");
        let store = CacheStore::new(runtime.clone(), "/cache/3", "__init__", "1.0");
        let module = ModuleId::new("m").unwrap();
        let meta = store
            .write(WriteRequest {
                module_id: &module,
                source_path: Path::new("/src/m.py"),
                dependencies: Vec::new(),
                suppressed: Vec::new(),
                child_modules: BTreeSet::new(),
                options_fingerprint: "fp".into(),
                interface_hash: "h".into(),
                payload: b"p",
                reuse_payload: false,
                newest_dependency_payload: None,
                ignore_all: false,
            })
            .unwrap()
            .meta;
        (runtime, store, meta)
    }

    #[test]
    fn test_fresh_record_validates() {
        let (_runtime, store, meta) = setup();
        assert_eq!(store.validate(&meta, Path::new("/src/m.py"), "fp"), Ok(()));
    }

    #[test]
    fn test_identity_checks() {
        let (runtime, store, meta) = setup();
        assert_eq!(
            store.validate(&meta, Path::new("/other/m.py"), "fp"),
            Err(StaleReason::PathMismatch)
        );
        assert_eq!(
            store.validate(&meta, Path::new("/src/m.py"), "other"),
            Err(StaleReason::OptionsChanged)
        );

        let newer = CacheStore::new(runtime, "/cache/3", "__init__", "2.0");
        assert!(matches!(
            newer.validate(&meta, Path::new("/src/m.py"), "fp"),
            Err(StaleReason::ToolVersion { .. })
        ));
    }

    #[test]
    fn test_source_edits_invalidate() {
        let (runtime, store, meta) = setup();
        runtime.touch("/src/m.py");
        assert!(matches!(
            store.validate(&meta, Path::new("/src/m.py"), "fp"),
            Err(StaleReason::MtimeChanged { .. })
        ));

        runtime.add_file("/src/m.py", "def f(): return 1\n");
        assert!(matches!(
            store.validate(&meta, Path::new("/src/m.py"), "fp"),
            Err(StaleReason::SizeChanged { .. })
        ));

        runtime.remove("/src/m.py");
        assert_eq!(
            store.validate(&meta, Path::new("/src/m.py"), "fp"),
            Err(StaleReason::SourceMissing)
        );
    }

    #[test]
    fn test_payload_checks() {
        let (runtime, store, meta) = setup();
        runtime.touch(&meta.payload_location);
        assert!(matches!(
            store.validate(&meta, Path::new("/src/m.py"), "fp"),
            Err(StaleReason::PayloadMtime { .. })
        ));

        runtime.remove(&meta.payload_location);
        assert_eq!(
            store.validate(&meta, Path::new("/src/m.py"), "fp"),
            Err(StaleReason::PayloadMissing)
        );
    }
}
