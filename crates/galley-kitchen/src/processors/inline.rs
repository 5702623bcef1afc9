use async_trait::async_trait;
use galley_graph::UrlInfo;

use crate::error::HookResult;
use crate::hooks::{ContentProcessor, FetchedContent, HookPhase};
use crate::kitchen::KitchenContext;

/// Inline nodes take their content from the latest inline reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContentFetcher;

#[async_trait]
impl ContentProcessor for InlineContentFetcher {
    fn name(&self) -> &str {
        "inline-content"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Virtual
    }

    async fn fetch_url_content(
        &self,
        url_info: &UrlInfo,
        ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        if !url_info.is_inline {
            return Ok(None);
        }
        let inline = url_info
            .last_reference
            .and_then(|id| ctx.graph().reference(id))
            .and_then(|reference| reference.inline);
        Ok(inline.map(|inline| {
            FetchedContent::new(inline.content)
                .with_url_type(inline.url_type)
                .with_content_type(inline.content_type)
        }))
    }
}
