//! Connected clients and the events pushed to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::hot::ReloadDecision;

/// Event pushed to every client, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected { client_id: usize },
    Reload(ReloadDecision),
    /// A file failed to cook; clients keep their current state.
    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Clients registered for server events.
///
/// Cloning shares the registry.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>,
    next_id: Arc<AtomicUsize>,
    capacity: usize,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(0)),
            capacity: capacity.max(1),
        }
    }

    /// Register a client. The receiver yields serialized [`ServerEvent`]s,
    /// starting with `connected`.
    pub fn register(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        let _ = tx.try_send(ServerEvent::Connected { client_id: id }.to_json());
        self.clients.write().insert(id, tx);
        tracing::debug!(client_id = id, "client connected");
        (id, rx)
    }

    pub fn unregister(&self, id: usize) {
        if self.clients.write().remove(&id).is_some() {
            tracing::debug!(client_id = id, "client disconnected");
        }
    }

    /// Send `event` to every client, dropping the ones that went away.
    pub async fn broadcast(&self, event: &ServerEvent) {
        let json = event.to_json();
        let clients = self.clients.read().clone();

        let mut failed_ids = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                failed_ids.push(id);
            }
        }
        for id in failed_ids {
            self.unregister(id);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registration_and_broadcast() {
        let registry = ClientRegistry::new(8);
        let (first, mut rx1) = registry.register();
        let (second, rx2) = registry.register();
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);

        let connected = rx1.recv().await.unwrap();
        assert_eq!(
            connected,
            format!("{{\"type\":\"connected\",\"data\":{{\"client_id\":{first}}}}}")
        );

        drop(rx2);
        let event = ServerEvent::Reload(ReloadDecision::Full {
            reason: "declined".to_string(),
            cause: "a.js modified".to_string(),
            declined_by: None,
        });
        registry.broadcast(&event).await;

        let received: ServerEvent = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
        assert_eq!(received, event);
        assert_eq!(registry.len(), 1);

        registry.unregister(first);
        assert!(registry.is_empty());
    }
}
