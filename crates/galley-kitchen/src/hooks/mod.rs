//! Content-processor hook contract.
//!
//! A [`ContentProcessor`] implements any subset of the hooks below. Every
//! hook returns `Ok(None)` (or `false`) to mean "not applicable, try the next
//! processor". Processors run in [`HookPhase`] order, then registration order.
//!
//! | hook | first `Some` wins | every processor runs |
//! |---|---|---|
//! | `resolve_reference` | yes | |
//! | `redirect_reference` | yes (then restarts) | |
//! | `fetch_url_content` | yes | |
//! | `transform_url_content` | | yes, each sees the previous output |
//! | `finalize_url_content` | | yes, each sees the previous output |
//! | `format_reference` | yes | |

mod registry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use galley_graph::{Content, Reference, UrlInfo, UrlType};

use crate::error::HookResult;
use crate::kitchen::{Dependencies, KitchenContext};

pub use registry::HookRegistry;

/// Execution phases. Lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPhase {
    /// Contents that do not live on disk (inline, data urls).
    Virtual = 0,
    Resolve = 10,
    Fetch = 20,
    Transform = 30,
    Finalize = 40,
    Format = 50,
    PostProcess = 100,
}

/// Result of a fetch hook.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedContent {
    pub content: Content,
    pub content_type: Option<String>,
    pub url_type: Option<UrlType>,
    pub headers: BTreeMap<String, String>,
}

impl FetchedContent {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
            content_type: None,
            url_type: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_url_type(mut self, url_type: UrlType) -> Self {
        self.url_type = Some(url_type);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Result of a transform or finalize hook.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedContent {
    pub content: Content,
    pub sourcemap: Option<String>,
    /// Type change, e.g. a compiled template becoming javascript.
    pub url_type: Option<UrlType>,
    pub content_type: Option<String>,
}

impl TransformedContent {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
            sourcemap: None,
            url_type: None,
            content_type: None,
        }
    }

    pub fn with_sourcemap(mut self, sourcemap: impl Into<String>) -> Self {
        self.sourcemap = Some(sourcemap.into());
        self
    }

    pub fn with_url_type(mut self, url_type: UrlType) -> Self {
        self.url_type = Some(url_type);
        self
    }
}

impl From<String> for TransformedContent {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}

/// Extension point of the cook pipeline.
#[async_trait]
pub trait ContentProcessor: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    fn phase(&self) -> HookPhase {
        HookPhase::Transform
    }

    /// Absolute url for `reference.specifier`.
    async fn resolve_reference(
        &self,
        _reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Replacement url for an already resolved reference.
    ///
    /// Returning the current url is the same as returning `None`.
    async fn redirect_reference(
        &self,
        _reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        Ok(None)
    }

    async fn fetch_url_content(
        &self,
        _url_info: &UrlInfo,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        Ok(None)
    }

    /// Rewrite content. Specifiers found in the content must be registered
    /// through `dependencies` before returning.
    async fn transform_url_content(
        &self,
        _url_info: &UrlInfo,
        _dependencies: &Dependencies,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<TransformedContent>> {
        Ok(None)
    }

    async fn finalize_url_content(
        &self,
        _url_info: &UrlInfo,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<TransformedContent>> {
        Ok(None)
    }

    /// Text written into the owner's content for `reference`.
    fn format_reference(
        &self,
        _reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Keep the node's build path unversioned.
    fn exclude_from_versioning(&self, _url_info: &UrlInfo) -> bool {
        false
    }

    /// Called when the content behind `url` changed outside the kitchen.
    fn invalidate(&self, _url: &str) {}
}
