use async_trait::async_trait;
use galley_graph::Reference;
use galley_graph::url::{is_bare_specifier, resolve_url};

use crate::error::HookResult;
use crate::hooks::{ContentProcessor, HookPhase};
use crate::kitchen::KitchenContext;

/// Resolves relative, root-relative and absolute specifiers.
///
/// `/x` is relative to the project root. Bare specifiers and `#` specifiers
/// in javascript contexts are left to other resolvers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlResolver;

#[async_trait]
impl ContentProcessor for UrlResolver {
    fn name(&self) -> &str {
        "url-resolver"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Resolve
    }

    async fn resolve_reference(
        &self,
        reference: &Reference,
        ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        let specifier = reference.specifier.as_str();
        if reference.kind.is_js_context()
            && (is_bare_specifier(specifier) || specifier.starts_with('#'))
        {
            return Ok(None);
        }
        let root = ctx.root_url();
        if let Some(from_root) = specifier.strip_prefix('/') {
            if !from_root.starts_with('/') {
                return Ok(resolve_url(from_root, &root));
            }
        }
        Ok(resolve_url(specifier, &reference.owner))
    }
}
