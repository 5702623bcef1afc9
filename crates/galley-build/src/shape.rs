//! Processors of the shape pass.
//!
//! The shape kitchen starts from the content the raw pass produced: it reads
//! nodes from the raw graph, resolves specifiers through the raw references
//! that generated them, redirects absorbed sources to their bundle and
//! formats every reference as a placeholder for its build path.

use std::sync::Arc;

use async_trait::async_trait;
use galley_config::BuildOptions;
use galley_graph::url::is_file_url;
use galley_graph::{Reference, ReferenceKind, UrlGraph, UrlInfo, UrlType};
use galley_kitchen::{
    ContentProcessor, FetchedContent, HookError, HookPhase, HookRegistry, HookResult,
    KitchenContext,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::build_urls::BuildUrls;
use crate::entry_builds::{entry_build_url, entry_of};
use crate::placeholders::Placeholders;
use crate::strategy::VersioningStrategy;

/// State shared by the shape processors and the versioning step.
#[derive(Debug)]
pub(crate) struct ShapeState {
    pub(crate) raw: UrlGraph,
    pub(crate) options: BuildOptions,
    pub(crate) build_urls: BuildUrls,
    pub(crate) placeholders: Placeholders,
    pub(crate) bundled_into: FxHashMap<String, String>,
    pub(crate) entry_urls: FxHashSet<String>,
    pub(crate) strategies: FxHashMap<ReferenceKind, VersioningStrategy>,
    /// `file://` url of the build directory, with a trailing slash.
    pub(crate) build_directory_url: String,
}

impl ShapeState {
    pub(crate) fn strategy(&self, kind: ReferenceKind) -> VersioningStrategy {
        self.strategies
            .get(&kind)
            .copied()
            .unwrap_or_else(|| VersioningStrategy::for_kind(kind))
    }

    /// Raw node behind a shape url.
    fn raw_info(&self, url: &str) -> Option<UrlInfo> {
        self.raw.url_info(entry_of(url).unwrap_or(url))
    }
}

/// Registry of the shape kitchen: the built-in shape processors around the
/// caller's reference scanners.
pub(crate) fn shape_registry(state: &Arc<ShapeState>, scanners: HookRegistry) -> HookRegistry {
    let mut registry = scanners;
    registry.add(EntryBuildFetcher);
    registry.add(galley_kitchen::processors::InlineContentFetcher);
    registry.add(galley_kitchen::processors::DataUrlFetcher);
    registry.add(RawReferenceResolver(state.clone()));
    registry.add(galley_kitchen::processors::UrlResolver);
    registry.add(ShapeRedirector(state.clone()));
    registry.add(RawContentFetcher(state.clone()));
    registry.add(BuildFormatter(state.clone()));
    registry
}

/// Resolves specifiers the raw pass generated to the url they came from.
struct RawReferenceResolver(Arc<ShapeState>);

#[async_trait]
impl ContentProcessor for RawReferenceResolver {
    fn name(&self) -> &str {
        "raw-reference-resolver"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Resolve
    }

    async fn resolve_reference(
        &self,
        reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        if reference.is_inline() {
            return Ok(None);
        }
        let Ok(raw_references) = self.0.raw.references_to_others(&reference.owner) else {
            return Ok(None);
        };
        let found = raw_references
            .into_iter()
            .find(|raw| raw.generated_specifier.as_deref() == Some(reference.specifier.as_str()))
            .and_then(|raw| raw.url().map(str::to_string));
        Ok(found)
    }
}

/// Sends absorbed sources to their bundle and other entry points to their
/// entry build placeholder.
struct ShapeRedirector(Arc<ShapeState>);

#[async_trait]
impl ContentProcessor for ShapeRedirector {
    fn name(&self) -> &str {
        "shape-redirector"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Resolve
    }

    async fn redirect_reference(
        &self,
        reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        let Some(url) = reference.url() else {
            return Ok(None);
        };
        if let Some(bundle) = self.0.bundled_into.get(url) {
            return Ok(Some(bundle.clone()));
        }
        if reference.kind != ReferenceKind::EntryPoint
            && !reference.is_inline()
            && self.0.entry_urls.contains(url)
        {
            return Ok(Some(entry_build_url(url)));
        }
        Ok(None)
    }
}

/// Placeholder content for other entry points.
struct EntryBuildFetcher;

#[async_trait]
impl ContentProcessor for EntryBuildFetcher {
    fn name(&self) -> &str {
        "entry-build"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Virtual
    }

    async fn fetch_url_content(
        &self,
        url_info: &UrlInfo,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        if entry_of(&url_info.url).is_none() {
            return Ok(None);
        }
        Ok(Some(
            FetchedContent::new(galley_graph::Content::Binary(Vec::new()))
                .with_url_type(UrlType::EntryBuild),
        ))
    }
}

/// Content produced by the raw pass.
struct RawContentFetcher(Arc<ShapeState>);

#[async_trait]
impl ContentProcessor for RawContentFetcher {
    fn name(&self) -> &str {
        "raw-content"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Fetch
    }

    async fn fetch_url_content(
        &self,
        url_info: &UrlInfo,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        if url_info.is_inline {
            return Ok(None);
        }
        let Some(raw) = self.0.raw_info(&url_info.url) else {
            return Err(HookError::NotFound(format!(
                "`{}` is not part of the raw graph",
                url_info.url
            )));
        };
        let Some(content) = raw.content() else {
            return Ok(None);
        };
        let mut fetched = FetchedContent::new(content.clone());
        fetched.url_type = raw.url_type;
        fetched.content_type = raw.content_type.clone();
        fetched.headers = raw.headers.clone();
        Ok(Some(fetched))
    }
}

/// Writes placeholders (or plain build paths without versioning).
struct BuildFormatter(Arc<ShapeState>);

impl ContentProcessor for BuildFormatter {
    fn name(&self) -> &str {
        "build-formatter"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Format
    }

    fn format_reference(
        &self,
        reference: &Reference,
        ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        let state = &self.0;
        if reference.is_inline() {
            return Ok(None);
        }
        let Some(url) = reference.url() else {
            return Ok(None);
        };
        if !is_file_url(url) {
            return Ok(None);
        }
        let info = state.raw_info(url).unwrap_or_else(|| {
            let mut info = UrlInfo::new(url);
            info.url_type = reference.expected_type.or(Some(UrlType::from_url(url)));
            info
        });
        let path = state.build_urls.assign(&info);
        let build_url = format!("{}{path}", state.build_directory_url);
        ctx.graph()
            .update_reference(reference.id, |r| r.generated_url = Some(build_url))
            .map_err(HookError::other)?;

        if matches!(
            reference.kind,
            ReferenceKind::EntryPoint | ReferenceKind::HttpRequest
        ) {
            return Ok(None);
        }
        if !state.options.versioning {
            return Ok(Some(format!("{}{path}", state.options.base)));
        }
        let strategy = state.strategy(reference.kind);
        Ok(Some(state.placeholders.token_for(url, &path, strategy)))
    }
}
