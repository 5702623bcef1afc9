//! The kitchen: resolution and cook pipeline over a [`UrlGraph`].
//!
//! ```text
//!  specifier ──resolve──▶ url ──redirect*──▶ url' ──format──▶ generated specifier
//!                                   │
//!                                   ▼
//!                 UrlInfo: fetch ──▶ transform ──▶ finalize ──▶ cooked
//!                                      │
//!                                      └── Dependencies::found(..) per child
//! ```
//!
//! A [`Kitchen`] is cheap to clone; clones share the same state.

mod context;
mod cook;
mod dependencies;
mod inflight;
mod resolve;

use std::sync::Arc;

use galley_config::KitchenOptions;
use galley_graph::{Reference, ReferenceId, ReferenceKind, ReferenceParams, UrlGraph, UrlInfo};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{CookError, Result};
use crate::hooks::{ContentProcessor, HookRegistry};
use crate::runtime::Runtime;

pub use context::{KitchenContext, KitchenMode};
pub use dependencies::{Dependencies, FoundReference};
pub use resolve::{IGNORE_PROTOCOL, ResolvedReference, inline_url, is_ignored_url};

use inflight::InFlight;

/// Content mutation applied when a node is finalized.
pub type LateMutation = Box<dyn FnOnce(&mut UrlInfo) + Send>;

#[derive(Clone)]
pub struct Kitchen {
    inner: Arc<KitchenInner>,
}

struct KitchenInner {
    context: KitchenContext,
    processors: Vec<Arc<dyn ContentProcessor>>,
    in_flight: InFlight,
    late_mutations: Mutex<FxHashMap<String, Vec<LateMutation>>>,
}

impl std::fmt::Debug for Kitchen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kitchen")
            .field("context", &self.inner.context)
            .field(
                "processors",
                &self
                    .inner
                    .processors
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`Kitchen`].
pub struct KitchenBuilder {
    graph: UrlGraph,
    runtime: Arc<dyn Runtime>,
    mode: KitchenMode,
    options: KitchenOptions,
    registry: HookRegistry,
    cancellation: CancellationToken,
}

impl KitchenBuilder {
    pub fn mode(mut self, mode: KitchenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn options(mut self, options: KitchenOptions) -> Self {
        self.options = options;
        self
    }

    pub fn processor<P: ContentProcessor + 'static>(mut self, processor: P) -> Self {
        self.registry.add(processor);
        self
    }

    pub fn shared_processor(mut self, processor: Arc<dyn ContentProcessor>) -> Self {
        self.registry.add_shared(processor);
        self
    }

    /// Append every processor of `registry`.
    pub fn registry(mut self, registry: HookRegistry) -> Self {
        for processor in registry.into_ordered() {
            self.registry.add_shared(processor);
        }
        self
    }

    /// Share a cancellation token with other kitchens of the same session.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn build(self) -> galley_config::Result<Kitchen> {
        let ignore = self.options.ignore_patterns()?;
        let context = KitchenContext::new(
            self.graph,
            self.mode,
            self.options,
            ignore,
            self.runtime,
            self.cancellation,
        );
        let processors = self.registry.into_ordered();
        tracing::debug!(
            mode = ?context.mode(),
            processors = processors.len(),
            "kitchen ready"
        );
        Ok(Kitchen {
            inner: Arc::new(KitchenInner {
                context,
                processors,
                in_flight: InFlight::default(),
                late_mutations: Mutex::new(FxHashMap::default()),
            }),
        })
    }
}

impl Kitchen {
    pub fn builder(graph: UrlGraph, runtime: Arc<dyn Runtime>) -> KitchenBuilder {
        KitchenBuilder {
            graph,
            runtime,
            mode: KitchenMode::Build,
            options: KitchenOptions::default(),
            registry: HookRegistry::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn context(&self) -> &KitchenContext {
        &self.inner.context
    }

    pub fn graph(&self) -> &UrlGraph {
        self.inner.context.graph()
    }

    pub fn mode(&self) -> KitchenMode {
        self.inner.context.mode()
    }

    pub fn processors(&self) -> &[Arc<dyn ContentProcessor>] {
        &self.inner.processors
    }

    /// Abort every pending and future operation of this kitchen.
    pub fn cancel(&self) {
        self.inner.context.cancellation().cancel();
    }

    pub(crate) fn reference(&self, id: ReferenceId) -> Result<Reference> {
        self.graph()
            .reference(id)
            .ok_or_else(|| CookError::from(galley_graph::GraphError::UnknownReference(id)))
    }

    /// Declare an entry point, `specifier` being relative to the root.
    pub async fn add_entry_point(&self, specifier: &str) -> Result<ResolvedReference> {
        let params =
            ReferenceParams::new(self.graph().root_url(), ReferenceKind::EntryPoint, specifier);
        self.resolve_reference(params).await
    }

    /// Reference a url the way an incoming request does.
    ///
    /// Request references are abstract: the target node exists but nothing
    /// keeps it alive.
    pub async fn inject_request(&self, specifier: &str) -> Result<ResolvedReference> {
        let params =
            ReferenceParams::new(self.graph().root_url(), ReferenceKind::HttpRequest, specifier);
        self.resolve_reference(params).await
    }

    /// Queue a mutation applied to `url` at the start of its next finalize.
    pub fn add_late_mutation(&self, url: impl Into<String>, mutation: LateMutation) {
        self.inner
            .late_mutations
            .lock()
            .entry(url.into())
            .or_default()
            .push(mutation);
    }

    pub(crate) fn take_late_mutations(&self, url: &str) -> Vec<LateMutation> {
        self.inner
            .late_mutations
            .lock()
            .remove(url)
            .unwrap_or_default()
    }

    /// A processor asked for `url_info` to keep an unversioned build path.
    pub fn is_excluded_from_versioning(&self, url_info: &UrlInfo) -> bool {
        self.processors()
            .iter()
            .any(|p| p.exclude_from_versioning(url_info))
    }

    /// Mark `url` as changed outside the kitchen.
    ///
    /// The node goes back to uncooked with a new `modified_at`, together with
    /// every node holding an implicit reference to it, its search-param
    /// variants and the inline nodes embedded in it. Returns the invalidated
    /// urls.
    pub fn invalidate(&self, url: &str) -> Result<Vec<String>> {
        let graph = self.graph();
        let mut invalidated: Vec<String> = Vec::new();
        let mut pending = vec![url.to_string()];

        while let Some(current) = pending.pop() {
            if invalidated.contains(&current) {
                continue;
            }
            for processor in self.processors() {
                processor.invalidate(&current);
            }
            if !graph.contains(&current) {
                continue;
            }
            graph.mark_modified(&current)?;
            graph.reset_url_info(&current)?;
            pending.extend(graph.urls_with_implicit_reference_to(&current)?);
            pending.extend(graph.search_param_variants(&current)?);
            pending.extend(graph.inline_children(&current)?);
            invalidated.push(current);
        }
        tracing::debug!(url, count = invalidated.len(), "invalidated");
        Ok(invalidated)
    }
}
