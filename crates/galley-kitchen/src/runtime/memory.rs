//! In-memory runtime for tests and virtual projects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: u64,
}

/// Files kept in a map; directories exist implicitly through their files.
///
/// Clones share the same files, so a test can keep a handle and edit files
/// while a kitchen reads them.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    files: Arc<RwLock<BTreeMap<PathBuf, MemoryFile>>>,
    directories: Arc<RwLock<BTreeMap<PathBuf, u64>>>,
    clock: Arc<AtomicU64>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    /// Create or replace a file, bumping its modification time.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        let modified = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        self.files.write().insert(
            path.into(),
            MemoryFile {
                content: content.into(),
                modified,
            },
        );
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().get(path).map(|file| file.content.clone())
    }

    /// Every file path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.directories.read().contains_key(path)
            || self
                .files
                .read()
                .keys()
                .any(|file| file != path && file.starts_with(path))
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.contents(path)
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.insert(path, content);
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        if let Some(file) = self.files.read().get(path) {
            return Ok(FileMetadata {
                size: file.content.len() as u64,
                is_dir: false,
                is_file: true,
                modified: Some(file.modified),
            });
        }
        if self.is_dir(path) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(path) || self.is_dir(path)
    }

    async fn create_dir(&self, path: &Path) -> RuntimeResult<()> {
        let mut directories = self.directories.write();
        for ancestor in path.ancestors() {
            directories.entry(ancestor.to_path_buf()).or_insert(0);
        }
        Ok(())
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        if !self.is_dir(path) {
            return Err(RuntimeError::FileNotFound(path.to_path_buf()));
        }
        let mut names: Vec<String> = self
            .files
            .read()
            .keys()
            .chain(self.directories.read().keys())
            .filter_map(|entry| entry.strip_prefix(path).ok())
            .filter_map(|relative| relative.components().next())
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
