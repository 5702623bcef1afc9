//! Dependency registration during a transform.

use galley_graph::{Content, CookStatus, ReferenceId, ReferenceKind, ReferenceParams};
use parking_lot::Mutex;

use super::{Kitchen, LateMutation};
use crate::error::{CookError, Result};

/// A specifier registered through [`Dependencies::found`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundReference {
    /// `None` for specifiers that are not dependencies (html fragments).
    pub id: Option<ReferenceId>,
    pub url: Option<String>,
    /// Text to write in place of the specifier.
    pub generated_specifier: String,
}

/// Handle given to transform hooks for the node being cooked.
///
/// Every specifier a transform discovers goes through [`found`](Self::found)
/// before the hook returns; references of the previous pass that are not
/// found again are pruned when the transform stage ends.
pub struct Dependencies {
    kitchen: Kitchen,
    owner: String,
    found: Mutex<Vec<FoundReference>>,
}

impl Dependencies {
    pub(crate) fn new(kitchen: Kitchen, owner: &str) -> Self {
        Self {
            kitchen,
            owner: owner.to_string(),
            found: Mutex::new(Vec::new()),
        }
    }

    /// Url of the node being transformed.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kitchen(&self) -> &Kitchen {
        &self.kitchen
    }

    /// Parameters for a reference owned by the node being transformed.
    pub fn params(&self, kind: ReferenceKind, specifier: impl Into<String>) -> ReferenceParams {
        ReferenceParams::new(self.owner.clone(), kind, specifier)
    }

    /// Resolve a discovered specifier and attach it to the owner.
    ///
    /// Fragment specifiers (`#id`) outside javascript contexts are returned
    /// unchanged and create no reference.
    pub async fn found(&self, params: ReferenceParams) -> Result<FoundReference> {
        if params.owner() != self.owner {
            return Err(CookError::HookContract {
                hook: "dependencies".to_string(),
                operation: "found",
                reason: format!(
                    "reference owned by `{}` registered while transforming `{}`",
                    params.owner(),
                    self.owner
                ),
            });
        }
        if params.specifier().starts_with('#') && !params.kind().is_js_context() {
            return Ok(FoundReference {
                id: None,
                url: None,
                generated_specifier: params.specifier().to_string(),
            });
        }

        let resolved = self.kitchen.resolve_reference(params).await?;
        let found = FoundReference {
            id: Some(resolved.id),
            url: Some(resolved.url),
            generated_specifier: resolved.generated_specifier,
        };
        self.found.lock().push(found.clone());
        Ok(found)
    }

    /// Cook an inline child right away and return its text.
    ///
    /// `None` when the child has no text, or when its error was contained.
    pub async fn cook_inline(&self, found: &FoundReference) -> Result<Option<String>> {
        let Some(url) = &found.url else {
            return Ok(None);
        };
        if let Some(id) = found.id {
            self.refresh_inline(id, url)?;
        }
        match self.kitchen.cook(url).await {
            Ok(()) => Ok(self
                .kitchen
                .graph()
                .url_info(url)
                .and_then(|info| info.text().map(str::to_string))),
            Err(err) if self.kitchen.contains_error(url, &err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reset an inline node cooked from a body other than the one `id` carries.
    fn refresh_inline(&self, id: ReferenceId, url: &str) -> Result<()> {
        let graph = self.kitchen.graph();
        let Some(inline) = graph.reference(id).and_then(|reference| reference.inline) else {
            return Ok(());
        };
        let stale = graph.with_url_info(url, |info| {
            matches!(info.status(), CookStatus::Cooked | CookStatus::Errored)
                && info.original_content.as_ref().and_then(Content::as_text)
                    != Some(inline.content.as_str())
        })?;
        if stale {
            tracing::trace!(url, "inline content changed");
            graph.mark_modified(url)?;
            graph.reset_url_info(url)?;
        }
        Ok(())
    }

    /// Mutate the owner's content when it is finalized.
    pub fn late_mutation(&self, mutation: LateMutation) {
        self.kitchen.add_late_mutation(self.owner.clone(), mutation);
    }

    /// References found so far in this pass.
    pub fn found_references(&self) -> Vec<FoundReference> {
        self.found.lock().clone()
    }
}
