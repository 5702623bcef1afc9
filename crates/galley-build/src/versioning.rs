//! Content versions and placeholder resolution.
//!
//! Runs once the shape pass is complete:
//!
//! 1. hash every emitted node with its placeholders set to a constant,
//! 2. version each node from its own hash plus the hashes of every node it
//!    reaches through statically versioned placeholders,
//! 3. version directories from the versions found below them,
//! 4. replace placeholders by their final specifiers and inject the
//!    runtime mappings into entry points.

use std::collections::{BTreeMap, BTreeSet};

use galley_config::VersioningMethod;
use galley_graph::url::{is_file_url, is_inside};
use galley_graph::{Content, UrlGraph, UrlInfo, UrlType};
use galley_kitchen::is_ignored_url;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::entry_builds::entry_of;
use crate::error::{BuildError, Result};
use crate::output::{BuildFile, BuildOutput};
use crate::placeholders::{self, PlaceholderTarget};
use crate::shape::ShapeState;
use crate::strategy::{GLOBAL_LOOKUP, VersionMappingInjector, VersionMappings, VersioningStrategy};

/// `js/util.js` + `1a2b3c4d` -> `js/util-1a2b3c4d.js` (or `js/util.js?v=1a2b3c4d`).
///
/// Directories always use a search param.
pub fn versioned_path(path: &str, version: &str, method: VersioningMethod) -> String {
    if method == VersioningMethod::SearchParam || path.ends_with('/') {
        return format!("{path}?v={version}");
    }
    let (directory, name) = match path.rfind('/') {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    };
    match name.rfind('.') {
        Some(index) if index > 0 => {
            let (stem, extension) = name.split_at(index);
            format!("{directory}{stem}-{version}{extension}")
        }
        _ => format!("{directory}{name}-{version}"),
    }
}

fn content_hash(content: &Content) -> blake3::Hash {
    match content {
        Content::Text(text) => blake3::hash(placeholders::with_defaults(text).as_bytes()),
        Content::Binary(bytes) => blake3::hash(bytes),
    }
}

struct Emitted {
    info: UrlInfo,
    path: String,
    versionable: bool,
}

pub(crate) struct Versioning<'a> {
    graph: &'a UrlGraph,
    state: &'a ShapeState,
    is_excluded: &'a dyn Fn(&UrlInfo) -> bool,
}

impl<'a> Versioning<'a> {
    pub(crate) fn new(
        graph: &'a UrlGraph,
        state: &'a ShapeState,
        is_excluded: &'a dyn Fn(&UrlInfo) -> bool,
    ) -> Self {
        Self {
            graph,
            state,
            is_excluded,
        }
    }

    fn versionable(&self, info: &UrlInfo) -> bool {
        let options = &self.state.options;
        if !options.versioning || info.is_entry_point {
            return false;
        }
        let url_type = info.url_type.unwrap_or(UrlType::Asset);
        if matches!(url_type, UrlType::Root | UrlType::EntryBuild) {
            return false;
        }
        if options
            .versioning_excluded_types
            .iter()
            .any(|excluded| excluded == url_type.as_str())
        {
            return false;
        }
        !(self.is_excluded)(info)
    }

    /// Nodes reachable from the root that end up in the output.
    fn collect(&self) -> (BTreeMap<String, Emitted>, BTreeMap<String, Content>) {
        let mut emitted = BTreeMap::new();
        let mut inline = BTreeMap::new();
        for url in self.graph.reachable_from_root() {
            if is_ignored_url(&url) || !is_file_url(&url) || entry_of(&url).is_some() {
                continue;
            }
            let Some(info) = self.graph.url_info(&url) else {
                continue;
            };
            let Some(content) = info.content().cloned() else {
                continue;
            };
            if info.is_inline {
                inline.insert(url, content);
                continue;
            }
            let path = self.state.build_urls.assign(&info);
            let versionable = self.versionable(&info);
            emitted.insert(
                url,
                Emitted {
                    info,
                    path,
                    versionable,
                },
            );
        }
        (emitted, inline)
    }

    /// Urls reached from `url` through static placeholders, `url` excluded.
    fn static_closure(&self, url: &str, emitted: &BTreeMap<String, Emitted>) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut stack = vec![url.to_string()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(text) = emitted.get(&current).and_then(|node| node.info.text()) else {
                continue;
            };
            for target in self.state.placeholders.targets_in(text) {
                if !target.strategy.is_static() || !emitted.contains_key(&target.url) {
                    continue;
                }
                if target.url != url {
                    reached.insert(target.url.clone());
                }
                stack.push(target.url);
            }
        }
        reached
    }

    fn versions(&self, emitted: &BTreeMap<String, Emitted>) -> BTreeMap<String, String> {
        let length = self.state.options.version_length;
        let hashes: FxHashMap<&str, blake3::Hash> = emitted
            .iter()
            .filter_map(|(url, node)| node.info.content().map(|c| (url.as_str(), content_hash(c))))
            .collect();

        let mut versions = BTreeMap::new();
        for (url, node) in emitted {
            if !node.versionable || node.info.url_type == Some(UrlType::Directory) {
                continue;
            }
            let Some(own) = hashes.get(url.as_str()) else {
                continue;
            };
            let mut dependencies: Vec<[u8; 32]> = self
                .static_closure(url, emitted)
                .iter()
                .filter_map(|dependency| hashes.get(dependency.as_str()))
                .map(|hash| *hash.as_bytes())
                .collect();
            dependencies.sort_unstable();

            let mut hasher = blake3::Hasher::new();
            hasher.update(own.as_bytes());
            for dependency in &dependencies {
                hasher.update(dependency);
            }
            let hex = hasher.finalize().to_hex();
            versions.insert(url.clone(), hex[..length.min(hex.len())].to_string());
        }

        for (url, node) in emitted {
            if !node.versionable || node.info.url_type != Some(UrlType::Directory) {
                continue;
            }
            let inside: BTreeSet<&String> = versions
                .iter()
                .filter(|(other, _)| *other != url && is_inside(other, url))
                .map(|(_, version)| version)
                .collect();
            let mut hasher = blake3::Hasher::new();
            for version in inside {
                hasher.update(version.as_bytes());
                hasher.update(b"\0");
            }
            let hex = hasher.finalize().to_hex();
            versions.insert(url.clone(), hex[..length.min(hex.len())].to_string());
        }
        versions
    }

    /// Final specifier of `target`, recording runtime mappings.
    fn specifier(
        &self,
        target: &PlaceholderTarget,
        final_paths: &FxHashMap<String, String>,
        mappings: &mut VersionMappings,
    ) -> String {
        let base = &self.state.options.base;
        let unversioned = format!("{base}{}", target.path);
        let Some(versioned) = final_paths.get(&target.url) else {
            return unversioned;
        };
        let versioned = format!("{base}{versioned}");
        match target.strategy {
            VersioningStrategy::Static => versioned,
            VersioningStrategy::Global => {
                mappings.global.insert(unversioned.clone(), versioned);
                unversioned
            }
            VersioningStrategy::ImportMap => {
                mappings.import_map.insert(unversioned.clone(), versioned);
                unversioned
            }
        }
    }

    fn resolve_text(
        &self,
        text: &str,
        final_paths: &FxHashMap<String, String>,
        mappings: &mut VersionMappings,
    ) -> String {
        let mut text = text.to_string();
        let global_tokens: Vec<(String, PlaceholderTarget)> = placeholders::find_tokens(&text)
            .into_iter()
            .filter_map(|found| {
                let target = self.state.placeholders.get(found.token)?;
                (target.strategy == VersioningStrategy::Global)
                    .then(|| (found.token.to_string(), target))
            })
            .collect();
        for (token, target) in global_tokens {
            if !final_paths.contains_key(&target.url) {
                continue;
            }
            let specifier = self.specifier(&target, final_paths, mappings);
            let call = format!("{GLOBAL_LOOKUP}({specifier:?})");
            for quote in ['"', '\'', '`'] {
                text = text.replace(&format!("{quote}{token}{quote}"), &call);
            }
        }
        placeholders::replace_tokens(&text, |token| {
            let target = self.state.placeholders.get(token)?;
            Some(self.specifier(&target, final_paths, mappings))
        })
    }

    /// Versions, resolved contents and injected mappings.
    pub(crate) fn run(&self, injector: &dyn VersionMappingInjector) -> Result<BuildOutput> {
        let (emitted, inline) = self.collect();
        let versions = self.versions(&emitted);
        let method = self.state.options.versioning_method;

        let mut final_paths: FxHashMap<String, String> = FxHashMap::default();
        for (url, version) in &versions {
            if let Some(node) = emitted.get(url) {
                final_paths.insert(url.clone(), versioned_path(&node.path, version, method));
            }
        }

        let mut mappings = VersionMappings::default();
        let mut resolved: BTreeMap<String, Content> = BTreeMap::new();
        for (url, node) in &emitted {
            let Some(content) = node.info.content() else {
                continue;
            };
            let content = match content {
                Content::Text(text) => {
                    Content::Text(self.resolve_text(text, &final_paths, &mut mappings))
                }
                Content::Binary(bytes) => Content::Binary(bytes.clone()),
            };
            resolved.insert(url.clone(), content);
        }
        let inline = inline
            .into_iter()
            .map(|(url, content)| match content {
                Content::Text(text) => {
                    let text = self.resolve_text(&text, &final_paths, &mut mappings);
                    (url, Content::Text(text))
                }
                binary => (url, binary),
            })
            .collect();

        let mut output = BuildOutput {
            inline,
            manifest: self.state.options.manifest.then(BTreeMap::new),
            ..BuildOutput::default()
        };
        for (url, node) in emitted {
            let final_path = final_paths
                .get(&url)
                .cloned()
                .unwrap_or_else(|| node.path.clone());
            if let Some(version) = versions.get(&url) {
                output.versions.insert(node.path.clone(), version.clone());
                if let Some(manifest) = output.manifest.as_mut() {
                    manifest.insert(node.path.clone(), final_path.clone());
                }
            }
            if node.info.url_type == Some(UrlType::Directory) {
                continue;
            }
            let Some(mut content) = resolved.remove(&url) else {
                continue;
            };
            let url_type = node.info.url_type.unwrap_or(UrlType::Asset);
            if node.info.is_entry_point {
                if let Content::Text(text) = &content {
                    if let Some(injected) = injector.inject(url_type, text, &mappings) {
                        content = Content::Text(injected);
                    }
                }
            }
            if let Some(existing) = output.files.get(&final_path) {
                if existing.content != content {
                    return Err(BuildError::InvalidOutputPath(format!(
                        "`{final_path}` is produced by both `{}` and `{url}`",
                        existing.source_url
                    )));
                }
                continue;
            }
            output.files.insert(
                final_path,
                BuildFile {
                    source_url: url,
                    url_type,
                    content,
                    is_entry_point: node.info.is_entry_point,
                },
            );
        }
        Ok(output)
    }
}
