//! Completion signals of declared entry points in the shape pass.
//!
//! A node referencing another entry point gets an [`UrlType::EntryBuild`]
//! placeholder node instead of a second build of that entry. Its content is
//! copied in once the other entry signals completion.
//!
//! [`UrlType::EntryBuild`]: galley_graph::UrlType::EntryBuild

use rustc_hash::FxHashMap;
use tokio::sync::watch;

/// Suffix marking the placeholder node of an entry point.
pub const ENTRY_BUILD_MARKER: &str = "#entry_build";

pub fn entry_build_url(entry_url: &str) -> String {
    format!("{entry_url}{ENTRY_BUILD_MARKER}")
}

/// Entry url behind an entry build placeholder url.
pub fn entry_of(url: &str) -> Option<&str> {
    url.strip_suffix(ENTRY_BUILD_MARKER)
}

#[derive(Debug)]
pub(crate) struct EntrySignals {
    senders: FxHashMap<String, watch::Sender<bool>>,
}

impl EntrySignals {
    pub(crate) fn new<'a>(entry_urls: impl IntoIterator<Item = &'a String>) -> Self {
        let senders = entry_urls
            .into_iter()
            .map(|url| (url.clone(), watch::Sender::new(false)))
            .collect();
        Self { senders }
    }

    pub(crate) fn complete(&self, entry_url: &str) {
        if let Some(sender) = self.senders.get(entry_url) {
            sender.send_replace(true);
        }
    }

    /// Resolves once `entry_url` completed; unknown entries resolve at once.
    pub(crate) async fn wait(&self, entry_url: &str) {
        let Some(sender) = self.senders.get(entry_url) else {
            return;
        };
        let mut receiver = sender.subscribe();
        let _ = receiver.wait_for(|done| *done).await;
    }
}
