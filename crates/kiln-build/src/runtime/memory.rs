//! In-memory filesystem runtime.
//!
//! Timestamps come from a logical clock that advances on every write, so two
//! writes never share an mtime and freshness decisions are reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: u64,
}

#[derive(Debug, Default)]
struct MemoryFs {
    files: BTreeMap<PathBuf, MemoryFile>,
    dirs: BTreeSet<PathBuf>,
    clock: u64,
    writes: Vec<PathBuf>,
}

impl MemoryFs {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn ensure_dirs(&mut self, dir: &Path) {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }
}

/// Runtime backed by an in-memory tree of files.
#[derive(Debug)]
pub struct MemoryRuntime {
    cwd: PathBuf,
    fs: Mutex<MemoryFs>,
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new("/work")
    }
}

impl MemoryRuntime {
    /// Create an empty filesystem whose working directory is `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        let cwd = path_clean::clean(cwd.into());
        let mut fs = MemoryFs::default();
        fs.ensure_dirs(&cwd);
        Self {
            cwd,
            fs: Mutex::new(fs),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path_clean::clean(path)
        } else {
            path_clean::clean(self.cwd.join(path))
        }
    }

    /// Create or replace a file, creating missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        let path = self.resolve(path.as_ref());
        let mut fs = self.fs.lock();
        if let Some(parent) = path.parent() {
            fs.ensure_dirs(parent);
        }
        let modified = fs.tick();
        fs.files.insert(
            path,
            MemoryFile {
                content: content.as_ref().to_vec(),
                modified,
            },
        );
    }

    /// Bump a file's mtime without changing its content.
    pub fn touch(&self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        let mut fs = self.fs.lock();
        let modified = fs.tick();
        match fs.files.get_mut(&path) {
            Some(file) => {
                file.modified = modified;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        self.fs.lock().files.remove(&path).is_some()
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = self.resolve(path.as_ref());
        self.fs.lock().files.get(&path).map(|f| f.content.clone())
    }

    pub fn mtime(&self, path: impl AsRef<Path>) -> Option<u64> {
        let path = self.resolve(path.as_ref());
        self.fs.lock().files.get(&path).map(|f| f.modified)
    }

    /// Every file under `dir`, sorted.
    pub fn files_under(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = self.resolve(dir.as_ref());
        self.fs
            .lock()
            .files
            .keys()
            .filter(|p| p.starts_with(&dir))
            .cloned()
            .collect()
    }

    /// Paths written through [`Runtime::write_file`], in order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.fs.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.fs.lock().writes.clear();
    }
}

impl Runtime for MemoryRuntime {
    fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.resolve(path);
        self.fs
            .lock()
            .files
            .get(&path)
            .map(|f| f.content.clone())
            .ok_or(RuntimeError::FileNotFound(path))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = self.resolve(path);
        let mut fs = self.fs.lock();
        let parent_exists = path.parent().is_none_or(|p| fs.is_dir(p));
        if !parent_exists {
            return Err(RuntimeError::FileNotFound(path));
        }
        if fs.is_dir(&path) {
            return Err(RuntimeError::Io(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let modified = fs.tick();
        fs.writes.push(path.clone());
        fs.files.insert(
            path,
            MemoryFile {
                content: content.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        let mut fs = self.fs.lock();
        let file = fs
            .files
            .remove(&from)
            .ok_or_else(|| RuntimeError::FileNotFound(from.clone()))?;
        fs.files.insert(to, file);
        Ok(())
    }

    fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = self.resolve(path);
        let fs = self.fs.lock();
        if let Some(file) = fs.files.get(&path) {
            return Ok(FileMetadata {
                size: file.content.len() as u64,
                is_dir: false,
                is_file: true,
                modified: Some(file.modified),
            });
        }
        if fs.is_dir(&path) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(RuntimeError::FileNotFound(path))
    }

    fn exists(&self, path: &Path) -> bool {
        let path = self.resolve(path);
        let fs = self.fs.lock();
        fs.files.contains_key(&path) || fs.is_dir(&path)
    }

    fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let path = self.resolve(path);
        let mut fs = self.fs.lock();
        if fs.files.contains_key(&path) {
            return Err(RuntimeError::Io(format!("{} is a file", path.display())));
        }
        if !recursive {
            let parent_exists = path.parent().is_none_or(|p| fs.is_dir(p));
            if !parent_exists {
                return Err(RuntimeError::FileNotFound(path));
            }
        }
        fs.ensure_dirs(&path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = self.resolve(path);
        match self.fs.lock().files.remove(&path) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::FileNotFound(path)),
        }
    }

    fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let path = self.resolve(path);
        let fs = self.fs.lock();
        if !fs.is_dir(&path) {
            return Err(RuntimeError::FileNotFound(path));
        }
        let child_name = |p: &PathBuf| -> Option<String> {
            (p.parent() == Some(path.as_path()))
                .then(|| p.file_name().and_then(|n| n.to_str()).map(String::from))
                .flatten()
        };
        let mut names: BTreeSet<String> = fs.files.keys().filter_map(child_name).collect();
        names.extend(fs.dirs.iter().filter_map(child_name));
        Ok(names.into_iter().collect())
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::write_atomic;

    #[test]
    fn test_clock_advances_on_every_write() {
        let runtime = MemoryRuntime::default();
        runtime.add_file("src/a.py", "x");
        let first = runtime.mtime("src/a.py").unwrap();
        runtime.add_file("src/a.py", "y");
        let second = runtime.mtime("src/a.py").unwrap();
        assert!(second > first);

        assert!(runtime.touch("/work/src/a.py"));
        assert!(runtime.mtime("src/a.py").unwrap() > second);
        assert_eq!(runtime.contents("src/a.py").unwrap(), b"y");
    }

    #[test]
    fn test_write_requires_parent_directory() {
        let runtime = MemoryRuntime::default();
        let err = runtime
            .write_file(Path::new("/work/missing/a.bin"), b"1")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));

        runtime
            .create_dir(Path::new("/work/missing"), true)
            .unwrap();
        write_atomic(&runtime, Path::new("/work/missing/a.bin"), b"1").unwrap();
        assert!(runtime.exists(Path::new("/work/missing/a.bin")));
        assert!(!runtime.exists(Path::new("/work/missing/a.bin.tmp")));
    }

    #[test]
    fn test_read_dir_lists_files_and_directories() {
        let runtime = MemoryRuntime::default();
        runtime.add_file("/lib/pkg/__init__.py", "");
        runtime.add_file("/lib/pkg/sub/mod.py", "");
        runtime.add_file("/lib/top.py", "");

        assert_eq!(
            runtime.read_dir(Path::new("/lib")).unwrap(),
            vec!["pkg".to_string(), "top.py".to_string()]
        );
        assert_eq!(
            runtime.read_dir(Path::new("/lib/pkg")).unwrap(),
            vec!["__init__.py".to_string(), "sub".to_string()]
        );
        assert!(runtime.read_dir(Path::new("/nope")).is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_cwd() {
        let runtime = MemoryRuntime::new("/home/me");
        runtime.add_file("a/../b.py", "b");
        assert!(runtime.exists(Path::new("/home/me/b.py")));
        assert_eq!(runtime.get_cwd().unwrap(), PathBuf::from("/home/me"));
    }

    #[test]
    fn test_metadata() {
        let runtime = MemoryRuntime::default();
        runtime.add_file("m.py", "abc");
        let meta = runtime.metadata(Path::new("m.py")).unwrap();
        assert!(meta.is_file);
        assert_eq!(meta.size, 3);
        assert!(runtime.metadata(Path::new("/work")).unwrap().is_dir);
        assert!(runtime.metadata(Path::new("zzz")).is_err());
    }
}
