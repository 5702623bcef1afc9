//! Bundler contract and how bundles are spliced into the raw graph.
//!
//! The build only decides when to call the bundler and what to do with its
//! result: each bundle replaces the content of one of the bundled nodes, and
//! references to the sources it absorbed are redirected to it in the shape
//! pass.

use std::collections::BTreeMap;

use async_trait::async_trait;
use galley_graph::{Content, UrlInfo, UrlType};
use galley_kitchen::{HookResult, Kitchen, KitchenContext, is_ignored_url};
use rustc_hash::FxHashMap;

use crate::error::{BuildError, Result};

/// One bundle produced by a [`Bundler`].
#[derive(Debug, Clone, PartialEq)]
pub struct BundledContent {
    pub content: Content,
    /// Urls whose content now lives in this bundle.
    pub source_urls: Vec<String>,
}

impl BundledContent {
    pub fn new(content: impl Into<Content>, source_urls: Vec<String>) -> Self {
        Self {
            content: content.into(),
            source_urls,
        }
    }
}

#[async_trait]
pub trait Bundler: Send + Sync {
    fn name(&self) -> &str;

    /// Type of the nodes handed to [`bundle`](Self::bundle).
    fn url_type(&self) -> UrlType;

    /// Bundles keyed by the url of the node whose content they replace.
    async fn bundle(
        &self,
        nodes: &[UrlInfo],
        ctx: &KitchenContext,
    ) -> HookResult<BTreeMap<String, BundledContent>>;
}

/// Run `bundler` over the raw graph and splice the result back.
///
/// Returns source url -> bundle url for every absorbed source.
pub(crate) async fn bundle_raw_graph(
    bundler: &dyn Bundler,
    kitchen: &Kitchen,
) -> Result<FxHashMap<String, String>> {
    let graph = kitchen.graph();
    let mut nodes: Vec<UrlInfo> = graph
        .url_infos()
        .into_iter()
        .filter(|info| info.url_type == Some(bundler.url_type()))
        .filter(|info| !info.is_inline && !is_ignored_url(&info.url))
        .filter(|info| graph.is_used(&info.url).unwrap_or(false))
        .collect();
    if nodes.is_empty() {
        return Ok(FxHashMap::default());
    }
    nodes.sort_by(|a, b| a.url.cmp(&b.url));

    let bundles = bundler
        .bundle(&nodes, kitchen.context())
        .await
        .map_err(|err| BuildError::Bundler {
            bundler: bundler.name().to_string(),
            reason: err.to_string(),
        })?;

    let mut bundled_into = FxHashMap::default();
    for (bundle_url, bundled) in bundles {
        if !nodes.iter().any(|info| info.url == bundle_url) {
            return Err(BuildError::Bundler {
                bundler: bundler.name().to_string(),
                reason: format!("`{bundle_url}` is not one of the bundled nodes"),
            });
        }
        graph.update_url_info(&bundle_url, |info| info.set_content(bundled.content))?;
        for source in bundled.source_urls {
            if source != bundle_url {
                bundled_into.insert(source, bundle_url.clone());
            }
        }
    }
    tracing::debug!(
        bundler = bundler.name(),
        nodes = nodes.len(),
        absorbed = bundled_into.len(),
        "bundled"
    );
    Ok(bundled_into)
}
