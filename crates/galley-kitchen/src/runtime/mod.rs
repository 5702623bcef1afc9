//! File access abstraction.
//!
//! The kitchen never touches the filesystem directly: fetchers, resolvers
//! and build output go through a [`Runtime`]. [`NativeRuntime`] is backed by
//! the OS filesystem, [`MemoryRuntime`] by an in-memory map.

mod memory;
mod native;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use memory::MemoryRuntime;
pub use native::NativeRuntime;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

/// Platform file access used by the kitchen and the build writer.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and its parents.
    async fn create_dir(&self, path: &Path) -> RuntimeResult<()>;

    /// Entry names of a directory, sorted.
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>>;
}
