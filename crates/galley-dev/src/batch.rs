//! Coalescing of change notifications.
//!
//! Changes arriving within one debounce window become one batch, and one
//! batch becomes one propagation pass.

use std::time::Duration;

use galley_graph::ReferenceId;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::task::JoinHandle;

/// A change waiting for the next propagation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Modified(String),
    Removed(String),
    Added(String),
    /// The node lost its last strong reference.
    Pruned {
        url: String,
        last_reference: Option<ReferenceId>,
    },
}

impl Change {
    pub fn url(&self) -> &str {
        match self {
            Change::Modified(url) | Change::Removed(url) | Change::Added(url) => url,
            Change::Pruned { url, .. } => url,
        }
    }
}

/// Sending half of the debouncer. Dropping every sender flushes the pending
/// batch and ends the task.
#[derive(Debug, Clone)]
pub struct UpdateBatcher {
    tx: UnboundedSender<Change>,
}

impl UpdateBatcher {
    /// Start the debounce task. Batches are delivered once `window` elapses
    /// without a new change.
    pub fn spawn(window: Duration) -> (Self, UnboundedReceiver<Vec<Change>>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Change>();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                loop {
                    match tokio::time::timeout(window, rx.recv()).await {
                        Ok(Some(change)) => {
                            if !batch.contains(&change) {
                                batch.push(change);
                            }
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                tracing::trace!(changes = batch.len(), "batch ready");
                if batch_tx.send(batch).is_err() {
                    break;
                }
            }
        });
        (Self { tx }, batch_rx, task)
    }

    /// Queue a change. Returns `false` once the batcher stopped.
    pub fn push(&self, change: Change) -> bool {
        self.tx.send(change).is_ok()
    }

    /// A sender that does not keep the batcher alive.
    pub(crate) fn downgrade(&self) -> WeakUnboundedSender<Change> {
        self.tx.downgrade()
    }
}
