//! Build output and writing it to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use galley_graph::{Content, UrlType};
use galley_kitchen::Runtime;
use path_clean::PathClean;

use crate::error::{BuildError, Result};

/// Name of the manifest file written next to the build files.
pub const MANIFEST_FILENAME: &str = "build_manifest.json";

/// One emitted file.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildFile {
    /// Url of the source node.
    pub source_url: String,
    pub url_type: UrlType,
    pub content: Content,
    pub is_entry_point: bool,
}

/// Everything a build produced. Nothing is on disk until
/// [`write_to`](Self::write_to) is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutput {
    /// Versioned path relative to the build directory -> file.
    pub files: BTreeMap<String, BuildFile>,
    /// Inline content by inline url; already embedded in `files`.
    pub inline: BTreeMap<String, Content>,
    /// Unversioned path -> versioned path, when enabled.
    pub manifest: Option<BTreeMap<String, String>>,
    /// Unversioned path -> version.
    pub versions: BTreeMap<String, String>,
}

impl BuildOutput {
    pub fn file(&self, path: &str) -> Option<&BuildFile> {
        self.files.get(path)
    }

    /// Text of the file at `path`.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.files.get(path).and_then(|file| file.content.as_text())
    }

    /// Versioned path for an unversioned one (itself when not versioned).
    pub fn versioned_path<'a>(&'a self, path: &'a str) -> &'a str {
        self.manifest
            .as_ref()
            .and_then(|manifest| manifest.get(path))
            .map_or(path, String::as_str)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.values().map(|file| file.content.len()).sum()
    }

    pub fn manifest_json(&self) -> Option<String> {
        let manifest = self.manifest.as_ref()?;
        serde_json::to_string_pretty(manifest).ok()
    }

    /// Write every file (and the manifest) below `directory`.
    ///
    /// All paths are validated before anything is written, so an invalid
    /// path leaves the directory untouched. Returns the written paths.
    pub async fn write_to(&self, runtime: &dyn Runtime, directory: &Path) -> Result<Vec<PathBuf>> {
        let directory = directory.clean();
        let mut planned: Vec<(PathBuf, &[u8])> = Vec::with_capacity(self.files.len() + 1);
        for (path, file) in &self.files {
            let target = validate_output_path(&directory, path_without_search(path))?;
            planned.push((target, file.content.as_bytes()));
        }
        let manifest = self.manifest_json();
        if let Some(manifest) = &manifest {
            let target = validate_output_path(&directory, MANIFEST_FILENAME)?;
            planned.push((target, manifest.as_bytes()));
        }

        let mut written = Vec::with_capacity(planned.len());
        for (target, bytes) in planned {
            if let Some(parent) = target.parent() {
                runtime
                    .create_dir(parent)
                    .await
                    .map_err(|source| BuildError::WriteFailure {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            runtime
                .write_file(&target, bytes)
                .await
                .map_err(|source| BuildError::WriteFailure {
                    path: target.clone(),
                    source,
                })?;
            written.push(target);
        }
        tracing::debug!(files = written.len(), directory = %directory.display(), "build written");
        Ok(written)
    }
}

/// `js/a.js?v=1234` is written as `js/a.js`.
fn path_without_search(path: &str) -> &str {
    path.find('?').map_or(path, |index| &path[..index])
}

/// Join `filename` to `base_dir`, refusing anything that escapes it.
fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(BuildError::InvalidOutputPath(
            "filename contains a null byte".to_string(),
        ));
    }
    if filename.is_empty() || filename.ends_with('/') {
        return Err(BuildError::InvalidOutputPath(format!(
            "`{filename}` is not a file path"
        )));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(BuildError::InvalidOutputPath(format!(
            "`{filename}` escapes the build directory `{}`",
            base_dir.display()
        )));
    }
    Ok(full_path)
}
