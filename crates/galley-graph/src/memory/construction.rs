//! Construction and event plumbing for UrlGraph.

use std::sync::Arc;

use parking_lot::RwLock;

use super::graph::{GraphInner, UrlGraph};
use crate::event::GraphEvent;

impl UrlGraph {
    /// Create a graph whose abstract root node is `root_url`.
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(GraphInner::new(root_url.into()))),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn root_url(&self) -> String {
        self.inner.read().root_url.clone()
    }

    /// Advance the logical clock and return the new value.
    pub fn tick(&self) -> u64 {
        self.inner.write().tick()
    }

    /// Current value of the logical clock.
    pub fn now(&self) -> u64 {
        self.inner.read().clock
    }

    /// Register a listener called for every [`GraphEvent`].
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Deliver events. Must be called with the graph lock released.
    pub(super) fn emit(&self, events: Vec<GraphEvent>) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for event in &events {
            tracing::trace!(?event, "graph event");
            for listener in &listeners {
                listener(event);
            }
        }
    }
}
