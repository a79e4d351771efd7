//! Cache file naming and option fingerprints.

use std::path::{Path, PathBuf};

use blake3::Hasher;
use kiln_config::AnalysisOptions;
use kiln_graph::ModuleId;

use super::CacheResult;

/// Bumped whenever the fingerprint input changes shape.
const FINGERPRINT_VERSION: u32 = 2;

/// BLAKE3 hex digest of the canonical JSON form of `options` followed by the
/// prelude modules.
///
/// Options serialize with sorted maps, so equal options always produce equal
/// fingerprints. The prelude is part of every module's edges, so changing it
/// changes every fingerprint.
pub fn options_fingerprint(
    options: &AnalysisOptions,
    prelude: &[ModuleId],
) -> CacheResult<String> {
    let mut hasher = Hasher::new();
    hasher.update(&FINGERPRINT_VERSION.to_le_bytes());
    hasher.update(&serde_json::to_vec(options)?);
    for module in prelude {
        hasher.update(b"\0");
        hasher.update(module.as_str().as_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Locations of one module's cache files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub meta: PathBuf,
    pub data: PathBuf,
}

impl CachePaths {
    /// Paths for `id` under `root`. Packages store their record inside a
    /// directory named after the package.
    pub fn new(root: &Path, id: &ModuleId, is_package: bool, package_marker: &str) -> Self {
        let mut base = root.to_path_buf();
        base.extend(id.components());
        if is_package {
            base.push(package_marker);
        }
        let stem = base.as_os_str().to_os_string();

        let with_suffix = |suffix: &str| {
            let mut name = stem.clone();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            meta: with_suffix(".meta.json"),
            data: with_suffix(".data.bin"),
        }
    }
}
