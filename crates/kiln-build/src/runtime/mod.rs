//! Platform runtime abstraction for kiln
//!
//! This module defines the `Runtime` trait that abstracts filesystem access.
//! Everything the build reads or writes (sources, directory listings, cache
//! records) goes through it, so a build can run against the real filesystem
//! or an in-memory one.

pub mod memory;
pub mod native;

use std::path::{Path, PathBuf};

pub use memory::MemoryRuntime;
pub use native::NativeRuntime;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

/// File metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Whether this is a file
    pub is_file: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

impl FileMetadata {
    /// Modification time, or 0 when the platform does not report one.
    pub fn mtime(&self) -> u64 {
        self.modified.unwrap_or(0)
    }
}

/// Platform runtime trait
///
/// All operations are synchronous; a build is a single sequential pass and
/// never overlaps I/O.
///
/// # Example
///
/// ```rust,ignore
/// use kiln_build::runtime::{Runtime, RuntimeResult, RuntimeError};
///
/// #[derive(Debug)]
/// struct MyRuntime;
///
/// impl Runtime for MyRuntime {
///     fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
///         // Platform-specific implementation
///     }
///
///     // ... implement other methods
/// }
/// ```
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read a file from the filesystem
    fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Write a file to the filesystem, replacing any existing content
    fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    /// Atomically replace `to` with `from`
    fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()>;

    /// Get file metadata
    fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory
    fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Remove a file
    fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Names of the entries of a directory
    fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>>;

    /// Get the current working directory
    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}

/// Make `path` absolute against the runtime's working directory and remove
/// `.`/`..` components.
pub fn absolutize(runtime: &dyn Runtime, path: &Path) -> RuntimeResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path_clean::clean(path));
    }
    Ok(path_clean::clean(runtime.get_cwd()?.join(path)))
}

/// Write `content` next to `path` and rename it into place, so readers never
/// observe a partially written file.
pub fn write_atomic(runtime: &dyn Runtime, path: &Path, content: &[u8]) -> RuntimeResult<()> {
    let mut tmp_name = path
        .file_name()
        .ok_or_else(|| RuntimeError::Other(format!("not a file path: {}", path.display())))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    runtime.write_file(&tmp, content)?;
    runtime.rename(&tmp, path)
}
