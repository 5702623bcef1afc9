//! At most one cook pass per url.
//!
//! The first caller claims the url and runs the pass; later callers get a
//! receiver on the pass result. The claim is released when the owner's
//! guard is dropped, whether the pass completed or its future was dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CookOutcome {
    Cooked,
    /// The node changed while the pass ran; its result was discarded.
    Superseded,
}

type Slot = Option<Result<CookOutcome>>;

struct Entry {
    generation: u64,
    modified_at: u64,
    receiver: watch::Receiver<Slot>,
}

#[derive(Default)]
pub(crate) struct InFlight {
    entries: Mutex<FxHashMap<String, Entry>>,
    generation: AtomicU64,
}

pub(crate) enum Claim<'a> {
    Owner(InFlightGuard<'a>),
    /// Another pass is running; it started for `modified_at`.
    Waiter {
        receiver: watch::Receiver<Slot>,
        modified_at: u64,
    },
}

impl InFlight {
    pub(crate) fn claim(&self, url: &str, modified_at: u64) -> Claim<'_> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(url) {
            return Claim::Waiter {
                receiver: entry.receiver.clone(),
                modified_at: entry.modified_at,
            };
        }
        let (sender, receiver) = watch::channel(None);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            url.to_string(),
            Entry {
                generation,
                modified_at,
                receiver,
            },
        );
        Claim::Owner(InFlightGuard {
            in_flight: self,
            url: url.to_string(),
            generation,
            sender,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

pub(crate) struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    url: String,
    generation: u64,
    sender: watch::Sender<Slot>,
}

impl InFlightGuard<'_> {
    /// Publish the result to waiters and release the claim.
    pub(crate) fn complete(self, result: Result<CookOutcome>) {
        self.sender.send_replace(Some(result));
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut entries = self.in_flight.entries.lock();
        if entries
            .get(&self.url)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            entries.remove(&self.url);
        }
    }
}

/// Wait for the pass behind `receiver`; `None` if it was dropped unfinished.
pub(crate) async fn wait(mut receiver: watch::Receiver<Slot>) -> Slot {
    receiver
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|value| (*value).clone())
}
