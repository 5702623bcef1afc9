//! Graph lifecycle events.

use std::sync::Arc;

use crate::reference::ReferenceId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A node was created for a newly resolved url.
    Created { url: String },
    /// A node was marked modified at `timestamp`.
    Modified { url: String, timestamp: u64 },
    /// A node lost its last strong link to the root.
    Dereferenced {
        url: String,
        /// Most recent incoming reference before it was removed.
        last_reference: Option<ReferenceId>,
        timestamp: u64,
    },
}

impl GraphEvent {
    pub fn url(&self) -> &str {
        match self {
            GraphEvent::Created { url }
            | GraphEvent::Modified { url, .. }
            | GraphEvent::Dereferenced { url, .. } => url,
        }
    }
}

/// Callback invoked for every event, after the graph lock is released.
pub type GraphListener = Arc<dyn Fn(&GraphEvent) + Send + Sync>;
