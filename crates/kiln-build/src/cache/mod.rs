//! Per-module build cache.
//!
//! Each processed module leaves two files under
//! `<cache-dir>/<target-version>/`:
//!
//! - `a/b/c.meta.json`: the [`CacheMetadata`] freshness record
//! - `a/b/c.data.bin`: the driver's payload in a versioned envelope
//!
//! Package modules nest one level deeper (`a/b/c/<marker>.meta.json`) so a
//! package and a same-named module never share a record.
//!
//! Records are read during graph construction and trusted only after
//! [`CacheStore::validate`] accepts them; any failure to read or validate a
//! record is a cache miss, never an error.
//!
//! [`CacheMetadata`]: kiln_graph::CacheMetadata

pub mod key;
pub mod serialize;
pub mod storage;
pub mod validate;

pub use key::{CachePaths, options_fingerprint};
pub use serialize::{CACHE_FORMAT_VERSION, PayloadEnvelope};
pub use storage::{CacheStore, WriteOutcome, WriteRequest};
pub use validate::StaleReason;

use crate::runtime::RuntimeError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error types for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache entry not found.
    #[error("cache miss")]
    CacheMiss,

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Filesystem error while reading or writing a record.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Cache version mismatch.
    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Cache corrupted.
    #[error("cache corrupted: {0}")]
    Corrupted(String),

    /// Invalid data in cache.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}
