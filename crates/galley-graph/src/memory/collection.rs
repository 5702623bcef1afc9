//! Dependency collection and pruning.
//!
//! A cook pass brackets dependency discovery with
//! [`UrlGraph::start_collecting`] and [`UrlGraph::finish_collecting`]. The
//! owner's outgoing set is emptied at the start; references discovered during
//! the pass are added back as usual, and at the end every previous reference
//! is detached. Previous references whose url was not found again are
//! reported as pruned.

use rustc_hash::FxHashSet as HashSet;

use super::graph::UrlGraph;
use crate::Result;
use crate::reference::{ReferenceId, ReferenceKind};

/// Outgoing references of a node at the start of a collection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "pass the snapshot to finish_collecting or abort_collecting"]
pub struct CollectionSnapshot {
    owner: String,
    previous: Vec<ReferenceId>,
}

impl CollectionSnapshot {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn previous(&self) -> &[ReferenceId] {
        &self.previous
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOutcome {
    /// Previous references whose url was not rediscovered.
    pub pruned: Vec<ReferenceId>,
    /// Urls that lost their last strong link to the root.
    pub dereferenced: Vec<String>,
}

impl UrlGraph {
    /// Snapshot and clear the outgoing references of `url`.
    ///
    /// Search-param variant links are graph bookkeeping and stay in place.
    pub fn start_collecting(&self, url: &str) -> Result<CollectionSnapshot> {
        let mut inner = self.inner.write();
        let kept: Vec<ReferenceId> = {
            let node = inner.node(url)?;
            node.references_to_others
                .iter()
                .copied()
                .filter(|id| {
                    inner
                        .references
                        .get(id)
                        .is_some_and(|r| r.kind == ReferenceKind::SearchParamVariant)
                })
                .collect()
        };
        let node = inner.node_mut(url)?;
        let previous: Vec<ReferenceId> = std::mem::take(&mut node.references_to_others)
            .into_iter()
            .filter(|id| !kept.contains(id))
            .collect();
        node.references_to_others.extend(kept);

        Ok(CollectionSnapshot {
            owner: url.to_string(),
            previous,
        })
    }

    /// Detach every previous reference and report what was pruned.
    pub fn finish_collecting(&self, snapshot: CollectionSnapshot) -> Result<CollectionOutcome> {
        let mut events = Vec::new();
        let mut outcome = CollectionOutcome::default();
        {
            let mut inner = self.inner.write();
            let live_urls: HashSet<String> = inner
                .node(&snapshot.owner)?
                .references_to_others
                .iter()
                .filter_map(|id| inner.references.get(id))
                .filter_map(|r| r.url().map(str::to_string))
                .collect();

            for id in snapshot.previous {
                let Some(url) = inner.references.get(&id).and_then(|r| r.url()) else {
                    continue;
                };
                let rediscovered = live_urls.contains(url);
                outcome.dereferenced.extend(inner.detach(id, &mut events));
                if !rediscovered {
                    outcome.pruned.push(id);
                }
            }
        }
        if !outcome.pruned.is_empty() {
            tracing::debug!(
                owner = %snapshot.owner,
                pruned = outcome.pruned.len(),
                "pruned references"
            );
        }
        self.emit(events);
        Ok(outcome)
    }

    /// Restore the previous references after a failed pass.
    ///
    /// References discovered before the failure stay attached.
    pub fn abort_collecting(&self, snapshot: CollectionSnapshot) -> Result<()> {
        let mut inner = self.inner.write();
        let still_attached: Vec<ReferenceId> = snapshot
            .previous
            .into_iter()
            .filter(|id| inner.is_attached(*id))
            .collect();
        inner
            .node_mut(&snapshot.owner)?
            .references_to_others
            .extend(still_attached);
        Ok(())
    }
}
