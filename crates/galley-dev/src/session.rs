//! Dev sessions: serving on request and reacting to file changes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use galley_config::{DevOptions, GalleyConfig};
use galley_graph::url::path_to_file_url;
use galley_graph::{Content, CookStatus, GraphEvent, UrlGraph};
use galley_kitchen::{HookRegistry, Kitchen, KitchenMode, Runtime, is_ignored_url};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::batch::{Change, UpdateBatcher};
use crate::clients::{ClientRegistry, ServerEvent};
use crate::declarations::HotDeclarationScanner;
use crate::error::{DevError, Result};
use crate::hot::{Propagation, ReloadDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Added,
    Modified,
    Removed,
}

/// What a file watcher reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub url: String,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(url: impl Into<String>, kind: FileEventKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn from_path(path: &Path, kind: FileEventKind) -> Self {
        Self::new(path_to_file_url(path), kind)
    }

    fn into_change(self) -> Change {
        match self.kind {
            FileEventKind::Added => Change::Added(self.url),
            FileEventKind::Modified => Change::Modified(self.url),
            FileEventKind::Removed => Change::Removed(self.url),
        }
    }
}

/// A cooked response.
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub url: String,
    pub content: Content,
    pub content_type: String,
    /// Content digest, suffixed with the last descendant change when there
    /// is one.
    pub etag: String,
}

/// Applies batches of changes to the graph.
#[derive(Clone)]
struct Reloader {
    kitchen: Kitchen,
    hot_reload: bool,
}

impl Reloader {
    fn apply(&self, changes: &[Change]) -> Result<Option<ReloadDecision>> {
        let graph = self.kitchen.graph();
        let mut propagation = Propagation::new(graph);
        let mut invalidate: Vec<&str> = Vec::new();

        for change in changes {
            match change {
                Change::Modified(url) => {
                    if !graph.contains(url) {
                        continue;
                    }
                    propagation.modified(url);
                    invalidate.push(url);
                }
                Change::Removed(url) => {
                    if !graph.contains(url) {
                        continue;
                    }
                    graph.update_url_info(url, |info| info.removed = true)?;
                    propagation.removed(url);
                    invalidate.push(url);
                }
                Change::Added(url) => {
                    let Some(info) = graph.url_info(url) else {
                        continue;
                    };
                    if !info.removed && info.status() != CookStatus::Errored {
                        continue;
                    }
                    graph.update_url_info(url, |info| info.removed = false)?;
                    propagation.modified(url);
                    invalidate.push(url);
                }
                Change::Pruned {
                    url,
                    last_reference,
                } => {
                    let owner = (*last_reference)
                        .and_then(|id| graph.reference(id))
                        .map(|reference| reference.owner);
                    propagation.pruned(url, owner.as_deref());
                }
            }
        }

        let decision = propagation.finish()?;
        for url in invalidate {
            self.kitchen.invalidate(url)?;
        }
        Ok(match decision {
            Some(decision) if !self.hot_reload => {
                Some(decision.into_full("hot reload disabled"))
            }
            decision => decision,
        })
    }
}

/// Everything a dev server needs, created at start and torn down with
/// [`DevSession::shutdown`].
///
/// Must be created inside a tokio runtime: the session spawns its debounce
/// and propagation tasks.
pub struct DevSession {
    kitchen: Kitchen,
    reloader: Reloader,
    clients: ClientRegistry,
    batcher: UpdateBatcher,
    debounce: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl DevSession {
    /// Session around a dev kitchen. The kitchen should have
    /// [`HotDeclarationScanner`] registered for scripts to opt into hot
    /// updates.
    pub fn new(kitchen: Kitchen, options: &DevOptions) -> Self {
        let reloader = Reloader {
            kitchen: kitchen.clone(),
            hot_reload: options.hot_reload,
        };
        let clients = ClientRegistry::new(options.client_channel_capacity);
        let (batcher, batches, debounce) =
            UpdateBatcher::spawn(Duration::from_millis(options.debounce_ms));

        let pruned = batcher.downgrade();
        kitchen.graph().on_event(move |event| {
            let GraphEvent::Dereferenced {
                url,
                last_reference,
                ..
            } = event
            else {
                return;
            };
            if let Some(tx) = pruned.upgrade() {
                let _ = tx.send(Change::Pruned {
                    url: url.clone(),
                    last_reference: *last_reference,
                });
            }
        });

        let worker = tokio::spawn(propagate(reloader.clone(), clients.clone(), batches));
        tracing::debug!(
            root = %kitchen.graph().root_url(),
            debounce_ms = options.debounce_ms,
            hot_reload = options.hot_reload,
            "dev session started"
        );
        Self {
            kitchen,
            reloader,
            clients,
            batcher,
            debounce,
            worker,
        }
    }

    /// Dev kitchen over `config.root_directory` with `registry`, plus the
    /// hot declaration scanner.
    pub fn from_config(
        config: &GalleyConfig,
        runtime: Arc<dyn Runtime>,
        registry: HookRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let root = std::path::absolute(&config.root_directory)
            .map_err(galley_config::ConfigError::Io)?;
        let mut root_url = path_to_file_url(&root);
        if !root_url.ends_with('/') {
            root_url.push('/');
        }
        let kitchen = Kitchen::builder(UrlGraph::new(root_url), runtime)
            .mode(KitchenMode::Dev)
            .options(config.kitchen.clone())
            .registry(registry)
            .processor(HotDeclarationScanner)
            .build()?;
        Ok(Self::new(kitchen, &config.dev))
    }

    pub fn kitchen(&self) -> &Kitchen {
        &self.kitchen
    }

    pub fn graph(&self) -> &UrlGraph {
        self.kitchen.graph()
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub async fn add_entry_point(&self, specifier: &str) -> Result<String> {
        Ok(self.kitchen.add_entry_point(specifier).await?.url)
    }

    /// Cook `specifier` (relative to the root) the way a request does.
    pub async fn serve(&self, specifier: &str) -> Result<Served> {
        let resolved = self.kitchen.inject_request(specifier).await?;
        if is_ignored_url(&resolved.url) {
            return Err(DevError::NotServable(resolved.url));
        }
        self.kitchen.cook(&resolved.url).await?;

        let info = self
            .graph()
            .url_info(&resolved.url)
            .ok_or_else(|| DevError::NotServable(resolved.url.clone()))?;
        let (Some(content), Some(digest)) = (info.content(), info.etag()) else {
            return Err(DevError::NotServable(resolved.url));
        };
        let etag = if info.descendant_modified_at > 0 {
            format!("{digest}_{}", info.descendant_modified_at)
        } else {
            digest.to_string()
        };
        let content_type = info.content_type.clone().unwrap_or_else(|| {
            info.url_type
                .unwrap_or_else(|| galley_graph::UrlType::from_url(&info.url))
                .default_content_type()
                .to_string()
        });
        tracing::debug!(url = %info.url, %etag, "served");
        Ok(Served {
            url: info.url.clone(),
            content: content.clone(),
            content_type,
            etag,
        })
    }

    /// `None` when the client's copy is still current.
    pub async fn serve_if_modified(
        &self,
        specifier: &str,
        if_none_match: Option<&str>,
    ) -> Result<Option<Served>> {
        let served = self.serve(specifier).await?;
        if if_none_match == Some(served.etag.as_str()) {
            return Ok(None);
        }
        Ok(Some(served))
    }

    /// Queue a file event for the next propagation pass.
    pub fn file_event(&self, event: FileEvent) {
        tracing::trace!(url = %event.url, kind = ?event.kind, "file event");
        if !self.batcher.push(event.into_change()) {
            tracing::warn!("file event after the session stopped");
        }
    }

    /// Apply `changes` now, bypassing the debounce window.
    pub fn apply_changes(&self, changes: &[Change]) -> Result<Option<ReloadDecision>> {
        self.reloader.apply(changes)
    }

    /// Register a client. The receiver yields serialized [`ServerEvent`]s.
    pub fn subscribe(&self) -> (usize, mpsc::Receiver<String>) {
        self.clients.register()
    }

    pub fn unsubscribe(&self, client_id: usize) {
        self.clients.unregister(client_id);
    }

    /// Flush pending changes, stop the background tasks and cancel cooks in
    /// progress.
    pub async fn shutdown(self) {
        let Self {
            kitchen,
            batcher,
            debounce,
            worker,
            ..
        } = self;
        drop(batcher);
        let _ = debounce.await;
        let _ = worker.await;
        kitchen.cancel();
        tracing::debug!("dev session stopped");
    }
}

async fn propagate(
    reloader: Reloader,
    clients: ClientRegistry,
    mut batches: UnboundedReceiver<Vec<Change>>,
) {
    while let Some(batch) = batches.recv().await {
        let event = match reloader.apply(&batch) {
            Ok(Some(decision)) => ServerEvent::Reload(decision),
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(code = err.code_str(), "propagation failed: {err}");
                ServerEvent::Error {
                    code: err.code_str().to_string(),
                    message: err.to_string(),
                }
            }
        };
        clients.broadcast(&event).await;
    }
}
