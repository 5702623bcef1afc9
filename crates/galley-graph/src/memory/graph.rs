//! Core UrlGraph structure and inner state.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::event::{GraphEvent, GraphListener};
use crate::reference::{Reference, ReferenceId};
use crate::url_info::UrlInfo;
use crate::url_type::UrlType;
use crate::{GraphError, Result};

/// In-memory url graph.
///
/// Cloning is cheap and clones share state. All mutations go through one
/// write lock; listeners run after it is released.
#[derive(Clone)]
pub struct UrlGraph {
    pub(super) inner: Arc<RwLock<GraphInner>>,
    pub(super) listeners: Arc<RwLock<Vec<GraphListener>>>,
}

impl fmt::Debug for UrlGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("UrlGraph")
            .field("root_url", &inner.root_url)
            .field("nodes", &inner.nodes.len())
            .field("references", &inner.references.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(super) struct GraphInner {
    pub root_url: String,
    /// Nodes in creation order.
    pub nodes: IndexMap<String, UrlInfo>,
    pub references: HashMap<ReferenceId, Reference>,
    pub next_reference_id: u32,
    pub clock: u64,
}

impl GraphInner {
    pub fn new(root_url: String) -> Self {
        let mut root = UrlInfo::new(root_url.clone());
        root.url_type = Some(UrlType::Root);
        let mut nodes = IndexMap::new();
        nodes.insert(root_url.clone(), root);
        Self {
            root_url,
            nodes,
            references: HashMap::default(),
            next_reference_id: 1,
            clock: 0,
        }
    }

    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn allocate_id(&mut self) -> ReferenceId {
        let id = ReferenceId(self.next_reference_id);
        self.next_reference_id += 1;
        id
    }

    pub fn node(&self, url: &str) -> Result<&UrlInfo> {
        self.nodes
            .get(url)
            .ok_or_else(|| GraphError::UnknownUrl(url.to_string()))
    }

    pub fn node_mut(&mut self, url: &str) -> Result<&mut UrlInfo> {
        self.nodes
            .get_mut(url)
            .ok_or_else(|| GraphError::UnknownUrl(url.to_string()))
    }

    pub fn reference(&self, id: ReferenceId) -> Result<&Reference> {
        self.references
            .get(&id)
            .ok_or(GraphError::UnknownReference(id))
    }

    pub fn reference_mut(&mut self, id: ReferenceId) -> Result<&mut Reference> {
        self.references
            .get_mut(&id)
            .ok_or(GraphError::UnknownReference(id))
    }

    pub fn latest(&self, mut id: ReferenceId) -> Result<ReferenceId> {
        let mut seen = HashSet::default();
        while let Some(next) = self.reference(id)?.next {
            if !seen.insert(next) {
                break;
            }
            id = next;
        }
        Ok(id)
    }

    /// Whether `id` is registered on its target's incoming set.
    pub fn is_attached(&self, id: ReferenceId) -> bool {
        self.references
            .get(&id)
            .and_then(|r| r.url())
            .and_then(|url| self.nodes.get(url))
            .is_some_and(|node| node.references_from_others.contains(&id))
    }

    /// Reachable from the root through strong incoming references.
    pub fn is_used(&self, url: &str) -> bool {
        let Some((start, _)) = self.nodes.get_key_value(url) else {
            return false;
        };
        if *start == self.root_url {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::default();
        let mut stack: Vec<&str> = vec![start.as_str()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for id in &node.references_from_others {
                let Some(reference) = self.references.get(id) else {
                    continue;
                };
                if !reference.is_strong() {
                    continue;
                }
                if reference.owner == self.root_url {
                    return true;
                }
                stack.push(reference.owner.as_str());
            }
        }
        false
    }

    /// Register `id` on its owner and target.
    pub fn attach(&mut self, id: ReferenceId) -> Result<()> {
        let reference = self.reference(id)?;
        let url = reference
            .url()
            .ok_or(GraphError::UnresolvedReference(id))?
            .to_string();
        let owner = reference.owner.clone();
        self.node(&url)?;
        self.node_mut(&owner)?.references_to_others.insert(id);
        self.node_mut(&url)?.references_from_others.insert(id);
        Ok(())
    }

    /// Unregister `id` (and its implicit references) from owner and target.
    ///
    /// Returns urls that lost their last strong link to the root as a result.
    pub fn detach(&mut self, id: ReferenceId, events: &mut Vec<GraphEvent>) -> Vec<String> {
        let mut dereferenced = Vec::new();
        self.detach_into(id, events, &mut dereferenced);
        dereferenced
    }

    fn detach_into(
        &mut self,
        id: ReferenceId,
        events: &mut Vec<GraphEvent>,
        dereferenced: &mut Vec<String>,
    ) {
        if !self.is_attached(id) {
            return;
        }
        let Some(reference) = self.references.get(&id) else {
            return;
        };
        let Some(url) = reference.url().map(str::to_string) else {
            return;
        };
        let owner = reference.owner.clone();
        let implicit: Vec<ReferenceId> = reference.implicit_references.iter().copied().collect();

        let was_used = self.is_used(&url);
        if let Some(owner_node) = self.nodes.get_mut(&owner) {
            owner_node.references_to_others.remove(&id);
        }
        if let Some(target) = self.nodes.get_mut(&url) {
            target.references_from_others.remove(&id);
        }

        for implicit_id in implicit {
            self.detach_into(implicit_id, events, dereferenced);
        }

        if was_used && !self.is_used(&url) {
            self.dereference_cascade(url, events, dereferenced);
        }
    }

    /// Mark `url` and every strong descendant that became unreachable with it.
    fn dereference_cascade(
        &mut self,
        url: String,
        events: &mut Vec<GraphEvent>,
        dereferenced: &mut Vec<String>,
    ) {
        let timestamp = self.tick();
        let mut queue = vec![url];
        while let Some(current) = queue.pop() {
            if dereferenced.contains(&current) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            node.dereferenced_at = timestamp;
            events.push(GraphEvent::Dereferenced {
                url: current.clone(),
                last_reference: node.last_reference,
                timestamp,
            });

            let children: Vec<String> = node
                .references_to_others
                .iter()
                .filter_map(|id| self.references.get(id))
                .filter(|r| r.is_strong())
                .filter_map(|r| r.url().map(str::to_string))
                .collect();
            dereferenced.push(current);

            for child in children {
                if !dereferenced.contains(&child) && !self.is_used(&child) {
                    queue.push(child);
                }
            }
        }
    }
}
