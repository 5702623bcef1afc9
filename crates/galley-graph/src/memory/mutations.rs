//! Mutation methods for UrlGraph.

use super::graph::UrlGraph;
use crate::event::GraphEvent;
use crate::reference::{Reference, ReferenceId, ReferenceKind, ReferenceParams};
use crate::url::{has_search, url_without_search};
use crate::url_info::UrlInfo;
use crate::{GraphError, Result};

impl UrlGraph {
    /// Allocate a reference. It is not attached until [`add_reference`](Self::add_reference).
    pub fn create_reference(&self, params: ReferenceParams) -> Result<ReferenceId> {
        let mut inner = self.inner.write();
        inner.node(params.owner())?;
        let id = inner.allocate_id();
        inner
            .references
            .insert(id, Reference::from_params(id, params));
        Ok(id)
    }

    /// Set the resolved url of a reference (write-once).
    pub fn resolve_reference(&self, id: ReferenceId, url: impl Into<String>) -> Result<()> {
        self.inner.write().reference_mut(id)?.set_url(url)
    }

    /// Redirect the latest reference of `id`'s chain to `url`.
    ///
    /// A new reference is created and linked through `next`/`prev`; the
    /// existing one keeps its url. If the redirected reference was attached it
    /// is detached, and callers attach the new one once its node exists.
    pub fn redirect_reference(&self, id: ReferenceId, url: impl Into<String>) -> Result<ReferenceId> {
        let mut events = Vec::new();
        let new_id = {
            let mut inner = self.inner.write();
            let latest = inner.latest(id)?;
            let current = inner.reference(latest)?.clone();
            if current.url().is_none() {
                return Err(GraphError::UnresolvedReference(latest));
            }
            let new_id = inner.allocate_id();
            let redirected = current.redirected(new_id, url.into());
            inner.references.insert(new_id, redirected);
            inner.reference_mut(latest)?.next = Some(new_id);
            if inner.is_attached(latest) {
                inner.detach(latest, &mut events);
            }
            new_id
        };
        self.emit(events);
        Ok(new_id)
    }

    /// Node for the reference's resolved url, created if missing.
    ///
    /// Also records the reference as the node's first/last reference and
    /// copies representative metadata. `filename_hint` and `debug` come from
    /// the first strong reference providing them.
    pub fn reuse_or_create_url_info(&self, id: ReferenceId) -> Result<String> {
        let mut events = Vec::new();
        let url = {
            let mut inner = self.inner.write();
            let reference = inner.reference(id)?.clone();
            let url = reference
                .url()
                .ok_or(GraphError::UnresolvedReference(id))?
                .to_string();
            let owner_entry = inner
                .nodes
                .get(&reference.owner)
                .and_then(|owner| owner.entry_url.clone());

            if !inner.nodes.contains_key(&url) {
                let mut info = UrlInfo::new(url.clone());
                if let Some(inline) = &reference.inline {
                    info.is_inline = true;
                    info.inline_parent = Some(reference.owner.clone());
                    info.url_type = Some(inline.url_type);
                    info.content_type = Some(inline.content_type.clone());
                }
                inner.nodes.insert(url.clone(), info);
                events.push(GraphEvent::Created { url: url.clone() });

                if reference.kind != ReferenceKind::SearchParamVariant
                    && !reference.is_inline()
                    && has_search(&url)
                {
                    let base = url_without_search(&url);
                    if !inner.nodes.contains_key(&base) {
                        inner.nodes.insert(base.clone(), UrlInfo::new(base.clone()));
                        events.push(GraphEvent::Created { url: base.clone() });
                    }
                    inner.node_mut(&url)?.original_url = Some(base.clone());
                    let link_id = inner.allocate_id();
                    let mut link = Reference::from_params(
                        link_id,
                        ReferenceParams::new(
                            url.clone(),
                            ReferenceKind::SearchParamVariant,
                            base.clone(),
                        ),
                    );
                    link.set_url(base)?;
                    inner.references.insert(link_id, link);
                    inner.attach(link_id)?;
                }
            }

            let info = inner.node_mut(&url)?;
            if info.first_reference.is_none() {
                info.first_reference = Some(id);
            }
            info.last_reference = Some(id);
            if reference.is_entry_point {
                info.is_entry_point = true;
                info.entry_url = Some(url.clone());
            } else if info.entry_url.is_none() {
                info.entry_url = owner_entry;
            }
            if reference.is_strong() {
                if info.filename_hint.is_none() {
                    info.filename_hint = reference.filename_hint.clone();
                }
                info.debug |= reference.debug;
            }
            if info.url_type.is_none() {
                info.url_type = reference.expected_type;
            }
            url
        };
        self.emit(events);
        Ok(url)
    }

    /// Register a resolved reference on its owner and target.
    ///
    /// Abstract references are ignored. Strong references cannot be added to
    /// an owner whose content is finalized.
    pub fn add_reference(&self, id: ReferenceId) -> Result<()> {
        let mut inner = self.inner.write();
        let reference = inner.reference(id)?;
        if reference.kind.is_abstract() {
            return Ok(());
        }
        let owner = inner.node(&reference.owner)?;
        if owner.content_finalized && reference.is_strong() {
            return Err(GraphError::ContentFinalized {
                owner: owner.url.clone(),
                specifier: reference.specifier.clone(),
            });
        }
        inner.attach(id)
    }

    /// Record `implicit` as required by `id`: removing `id` removes it too.
    pub fn add_implicit_reference(&self, id: ReferenceId, implicit: ReferenceId) -> Result<()> {
        let mut inner = self.inner.write();
        inner.reference(implicit)?;
        inner
            .reference_mut(id)?
            .implicit_references
            .insert(implicit);
        Ok(())
    }

    /// Unregister a reference.
    ///
    /// Returns the urls dereferenced as a consequence (the target and any
    /// descendant that only it kept alive). Removing a detached reference is
    /// a no-op.
    pub fn remove_reference(&self, id: ReferenceId) -> Result<Vec<String>> {
        let mut events = Vec::new();
        let dereferenced = {
            let mut inner = self.inner.write();
            let reference = inner.reference(id)?;
            if !inner.is_attached(id) {
                return Ok(Vec::new());
            }
            let owner = inner.node(&reference.owner)?;
            if owner.content_finalized && reference.is_strong() {
                return Err(GraphError::ContentFinalized {
                    owner: owner.url.clone(),
                    specifier: reference.specifier.clone(),
                });
            }
            inner.detach(id, &mut events)
        };
        self.emit(events);
        Ok(dereferenced)
    }

    /// Apply `f` to the node of `url`.
    pub fn update_url_info<R>(&self, url: &str, f: impl FnOnce(&mut UrlInfo) -> R) -> Result<R> {
        let mut inner = self.inner.write();
        Ok(f(inner.node_mut(url)?))
    }

    /// Apply `f` to a reference. The resolved url stays write-once.
    pub fn update_reference<R>(
        &self,
        id: ReferenceId,
        f: impl FnOnce(&mut Reference) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.write();
        Ok(f(inner.reference_mut(id)?))
    }

    /// Bump `modified_at` and notify listeners.
    pub fn mark_modified(&self, url: &str) -> Result<u64> {
        let timestamp = {
            let mut inner = self.inner.write();
            inner.node(url)?;
            let timestamp = inner.tick();
            inner.node_mut(url)?.modified_at = timestamp;
            timestamp
        };
        self.emit(vec![GraphEvent::Modified {
            url: url.to_string(),
            timestamp,
        }]);
        Ok(timestamp)
    }

    /// Set `descendant_modified_at` on every url in `urls`.
    pub fn mark_descendant_modified<'a>(
        &self,
        urls: impl IntoIterator<Item = &'a str>,
        timestamp: u64,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        for url in urls {
            inner.node_mut(url)?.descendant_modified_at = timestamp;
        }
        Ok(())
    }

    /// Return a node to `Uncooked`, keeping its references for pruning.
    pub fn reset_url_info(&self, url: &str) -> Result<()> {
        self.inner.write().node_mut(url)?.reset();
        Ok(())
    }
}
