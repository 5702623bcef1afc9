//! Output locations of built nodes.
//!
//! Paths are relative to the build directory (`js/main.js`). Entry points
//! keep their name at the build root; everything else goes to the directory
//! configured for its url type, with a numeric suffix when the name is
//! already taken there.

use std::sync::Arc;

use galley_config::BuildOptions;
use galley_graph::url::{extension, filename, url_without_hash, url_without_search};
use galley_graph::{UrlInfo, UrlType};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
pub struct BuildUrls {
    inner: Arc<RwLock<BuildUrlsInner>>,
}

#[derive(Debug)]
struct BuildUrlsInner {
    options: BuildOptions,
    root_url: String,
    /// Source url (without search or hash) -> build path.
    by_source: FxHashMap<String, String>,
    /// Directory -> names already handed out in it.
    names: FxHashMap<String, FxHashSet<String>>,
}

/// Key under which a source url is memoized.
fn source_key(url: &str) -> String {
    url_without_search(url_without_hash(url))
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => (&name[..index], &name[index..]),
        _ => (name, ""),
    }
}

impl BuildUrlsInner {
    fn directory_path(&self, url: &str) -> String {
        let key = source_key(url);
        let relative = key.strip_prefix(&self.root_url).unwrap_or(filename(&key));
        if relative.ends_with('/') {
            relative.to_string()
        } else {
            format!("{relative}/")
        }
    }

    fn file_name(url_info: &UrlInfo) -> String {
        let name = url_info
            .filename_hint
            .clone()
            .unwrap_or_else(|| filename(&url_info.url).to_string());
        let name = if name.is_empty() {
            "index".to_string()
        } else {
            name
        };
        let url_type = url_info.url_type.unwrap_or(UrlType::Asset);
        let wanted = url_type.extension();
        if url_type == UrlType::Asset || wanted.is_empty() {
            return name;
        }
        if extension(&name) == Some(wanted) {
            return name;
        }
        let (stem, _) = split_name(&name);
        format!("{stem}{wanted}")
    }

    fn claim(&mut self, directory: &str, name: String) -> String {
        let taken = self.names.entry(directory.to_string()).or_default();
        if taken.insert(name.clone()) {
            return name;
        }
        let (stem, ext) = split_name(&name);
        let mut suffix = 2;
        loop {
            let candidate = format!("{stem}{suffix}{ext}");
            if taken.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

impl BuildUrls {
    /// `root_url` is the project root; directory nodes keep their path below it.
    pub fn new(options: BuildOptions, root_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BuildUrlsInner {
                options,
                root_url: root_url.into(),
                by_source: FxHashMap::default(),
                names: FxHashMap::default(),
            })),
        }
    }

    /// Build path of `url_info`, assigned on first call.
    pub fn assign(&self, url_info: &UrlInfo) -> String {
        let key = source_key(&url_info.url);
        if let Some(path) = self.inner.read().by_source.get(&key) {
            return path.clone();
        }

        let mut inner = self.inner.write();
        if let Some(path) = inner.by_source.get(&key) {
            return path.clone();
        }
        let path = if url_info.url_type == Some(UrlType::Directory) {
            inner.directory_path(&url_info.url)
        } else {
            let directory = if url_info.is_entry_point {
                String::new()
            } else {
                let type_name = url_info.url_type.unwrap_or(UrlType::Asset).as_str();
                inner.options.directory_for(type_name).to_string()
            };
            let name = inner.claim(&directory, BuildUrlsInner::file_name(url_info));
            format!("{directory}{name}")
        };
        tracing::trace!(url = %url_info.url, %path, "build path assigned");
        inner.by_source.insert(key, path.clone());
        path
    }

    /// Previously assigned build path of `url`.
    pub fn get(&self, url: &str) -> Option<String> {
        self.inner.read().by_source.get(&source_key(url)).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
