//! Runtime backed by the OS filesystem.

// NativeRuntime is the one place allowed to call std::fs
#![allow(clippy::disallowed_methods)]

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::task;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Blocking `std::fs` calls moved onto tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, err: std::io::Error) -> RuntimeError {
    if err.kind() == std::io::ErrorKind::NotFound {
        RuntimeError::FileNotFound(path.to_path_buf())
    } else {
        RuntimeError::Io(format!("{}: {err}", path.display()))
    }
}

async fn blocking<T, F>(path: &Path, f: F) -> RuntimeResult<T>
where
    T: Send + 'static,
    F: FnOnce(PathBuf) -> std::io::Result<T> + Send + 'static,
{
    let owned = path.to_path_buf();
    task::spawn_blocking(move || f(owned))
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {e}")))?
        .map_err(|e| io_error(path, e))
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        blocking(path, |path| std::fs::read(path)).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let content = content.to_vec();
        blocking(path, move |path| std::fs::write(path, content)).await
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let metadata = blocking(path, |path| std::fs::metadata(path)).await?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_millis() as u64);
        Ok(FileMetadata {
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            is_file: metadata.is_file(),
            modified,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn create_dir(&self, path: &Path) -> RuntimeResult<()> {
        blocking(path, |path| std::fs::create_dir_all(path)).await
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        blocking(path, |path| {
            let mut names = std::fs::read_dir(path)?
                .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
                .collect::<std::io::Result<Vec<_>>>()?;
            names.sort();
            Ok(names)
        })
        .await
    }
}
