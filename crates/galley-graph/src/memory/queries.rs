//! Query methods for UrlGraph.

use super::graph::UrlGraph;
use crate::reference::{Reference, ReferenceId, ReferenceKind};
use crate::url_info::UrlInfo;
use crate::Result;

impl UrlGraph {
    /// Owned copy of the node for `url`.
    pub fn url_info(&self, url: &str) -> Option<UrlInfo> {
        self.inner.read().nodes.get(url).cloned()
    }

    /// Read a node without cloning it.
    pub fn with_url_info<R>(&self, url: &str, f: impl FnOnce(&UrlInfo) -> R) -> Result<R> {
        let inner = self.inner.read();
        Ok(f(inner.node(url)?))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.read().nodes.contains_key(url)
    }

    pub fn reference(&self, id: ReferenceId) -> Option<Reference> {
        self.inner.read().references.get(&id).cloned()
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// All node urls in creation order.
    pub fn urls(&self) -> Vec<String> {
        self.inner.read().nodes.keys().cloned().collect()
    }

    pub fn url_infos(&self) -> Vec<UrlInfo> {
        self.inner.read().nodes.values().cloned().collect()
    }

    /// Urls of entry point nodes, in creation order.
    pub fn entry_points(&self) -> Vec<String> {
        self.inner
            .read()
            .nodes
            .values()
            .filter(|node| node.is_entry_point)
            .map(|node| node.url.clone())
            .collect()
    }

    /// Latest reference of the chain `id` belongs to.
    pub fn latest_reference(&self, id: ReferenceId) -> Result<ReferenceId> {
        self.inner.read().latest(id)
    }

    /// Outgoing references of `url`, in creation order.
    pub fn references_to_others(&self, url: &str) -> Result<Vec<Reference>> {
        let inner = self.inner.read();
        let node = inner.node(url)?;
        Ok(node
            .references_to_others
            .iter()
            .filter_map(|id| inner.references.get(id).cloned())
            .collect())
    }

    /// Incoming references of `url`, in creation order.
    pub fn references_from_others(&self, url: &str) -> Result<Vec<Reference>> {
        let inner = self.inner.read();
        let node = inner.node(url)?;
        Ok(node
            .references_from_others
            .iter()
            .filter_map(|id| inner.references.get(id).cloned())
            .collect())
    }

    /// Distinct urls referenced by `url`.
    pub fn dependencies(&self, url: &str) -> Result<Vec<String>> {
        let mut urls: Vec<String> = Vec::new();
        for reference in self.references_to_others(url)? {
            let Some(target) = reference.url() else {
                continue;
            };
            if !urls.iter().any(|u| u == target) {
                urls.push(target.to_string());
            }
        }
        Ok(urls)
    }

    /// Distinct owners referencing `url`.
    pub fn dependents(&self, url: &str) -> Result<Vec<String>> {
        let mut owners: Vec<String> = Vec::new();
        for reference in self.references_from_others(url)? {
            if !owners.contains(&reference.owner) {
                owners.push(reference.owner);
            }
        }
        Ok(owners)
    }

    /// Reachable from the root through strong references.
    pub fn is_used(&self, url: &str) -> Result<bool> {
        let inner = self.inner.read();
        inner.node(url)?;
        Ok(inner.is_used(url))
    }

    /// Has incoming references, all of them weak.
    pub fn is_weak_only(&self, url: &str) -> Result<bool> {
        let inner = self.inner.read();
        let node = inner.node(url)?;
        let mut incoming = node
            .references_from_others
            .iter()
            .filter_map(|id| inner.references.get(id))
            .peekable();
        if incoming.peek().is_none() {
            return Ok(false);
        }
        Ok(incoming.all(|r| r.is_weak))
    }

    /// Owners holding an implicit reference to `url`.
    pub fn urls_with_implicit_reference_to(&self, url: &str) -> Result<Vec<String>> {
        Ok(self
            .references_from_others(url)?
            .into_iter()
            .filter(|r| r.is_implicit)
            .map(|r| r.owner)
            .collect())
    }

    /// Search-param variants (`a.js?v=1`) of the node at `url` (`a.js`).
    pub fn search_param_variants(&self, url: &str) -> Result<Vec<String>> {
        Ok(self
            .references_from_others(url)?
            .into_iter()
            .filter(|r| r.kind == ReferenceKind::SearchParamVariant)
            .map(|r| r.owner)
            .collect())
    }

    /// Inline nodes embedded in the content of `url`.
    pub fn inline_children(&self, url: &str) -> Result<Vec<String>> {
        let inner = self.inner.read();
        let node = inner.node(url)?;
        Ok(node
            .references_to_others
            .iter()
            .filter_map(|id| inner.references.get(id))
            .filter(|reference| reference.is_inline())
            .filter_map(|reference| reference.url())
            .filter(|target| {
                inner
                    .nodes
                    .get(*target)
                    .is_some_and(|child| child.inline_parent.as_deref() == Some(url))
            })
            .map(str::to_string)
            .collect())
    }

    /// The reference diagnostics should point at for `id`.
    ///
    /// Walks up from owners that are inline or live under `node_modules` to
    /// the reference that brought them in, stopping at user-authored code.
    pub fn first_project_reference(&self, id: ReferenceId) -> Result<Reference> {
        let inner = self.inner.read();
        let mut current = inner.reference(id)?;
        let mut hops = 0;
        loop {
            let Some(owner) = inner.nodes.get(&current.owner) else {
                break;
            };
            let generated = owner.is_inline || owner.url.contains("/node_modules/");
            if !generated || hops > inner.nodes.len() {
                break;
            }
            let Some(parent) = owner
                .first_reference
                .and_then(|parent| inner.references.get(&parent))
            else {
                break;
            };
            current = parent;
            hops += 1;
        }
        Ok(current.clone())
    }
}
