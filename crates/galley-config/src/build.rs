//! Build configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersioningMethod {
    /// `name-<version>.ext`
    #[default]
    Filename,
    /// `name.ext?v=<version>`
    SearchParam,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOptions {
    #[serde(default = "default_build_directory")]
    pub build_directory: PathBuf,

    /// Url prefix written in front of every generated specifier.
    #[serde(default = "default_base")]
    pub base: String,

    #[serde(default = "default_true")]
    pub versioning: bool,

    #[serde(default)]
    pub versioning_method: VersioningMethod,

    #[serde(default = "default_version_length")]
    pub version_length: usize,

    /// Emit the unversioned -> versioned path manifest.
    #[serde(default = "default_true")]
    pub manifest: bool,

    /// Url types (by name) never given a version.
    #[serde(default = "default_versioning_excluded_types")]
    pub versioning_excluded_types: Vec<String>,

    /// Output sub-directory per url type name. Types not listed use `other`.
    #[serde(default = "default_directories")]
    pub directories: BTreeMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_directory: default_build_directory(),
            base: default_base(),
            versioning: true,
            versioning_method: VersioningMethod::default(),
            version_length: default_version_length(),
            manifest: true,
            versioning_excluded_types: default_versioning_excluded_types(),
            directories: default_directories(),
        }
    }
}

impl BuildOptions {
    /// Output directory for a url type name, `other/` when unlisted.
    pub fn directory_for(&self, type_name: &str) -> &str {
        self.directories
            .get(type_name)
            .or_else(|| self.directories.get("other"))
            .map(String::as_str)
            .unwrap_or("other/")
    }
}

fn default_build_directory() -> PathBuf {
    PathBuf::from("dist")
}

fn default_base() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_version_length() -> usize {
    8
}

fn default_versioning_excluded_types() -> Vec<String> {
    vec!["webmanifest".to_string()]
}

fn default_directories() -> BTreeMap<String, String> {
    let mut dirs = BTreeMap::new();
    dirs.insert("js_module".to_string(), "js/".to_string());
    dirs.insert("js_classic".to_string(), "js/".to_string());
    dirs.insert("css".to_string(), "css/".to_string());
    dirs.insert("other".to_string(), "other/".to_string());
    dirs
}
