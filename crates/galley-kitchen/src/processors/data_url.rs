use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use galley_graph::url::percent_decode;
use galley_graph::{Content, UrlInfo, UrlType};

use crate::error::{HookError, HookResult};
use crate::hooks::{ContentProcessor, FetchedContent, HookPhase};
use crate::kitchen::KitchenContext;

/// Decodes `data:[<media type>][;base64],<data>` urls.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlFetcher;

fn decode(url: &str) -> HookResult<Option<(String, Vec<u8>)>> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(None);
    };
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| HookError::other(format!("malformed data url: missing `,` in `{url}`")))?;
    let (media_type, is_base64) = match meta.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (meta, false),
    };
    let media_type = if media_type.is_empty() {
        "text/plain;charset=US-ASCII"
    } else {
        media_type
    };
    let bytes = if is_base64 {
        STANDARD
            .decode(data)
            .map_err(|err| HookError::Other(anyhow::Error::new(err).context("invalid base64 data url")))?
    } else {
        percent_decode(data).into_bytes()
    };
    Ok(Some((media_type.to_string(), bytes)))
}

#[async_trait]
impl ContentProcessor for DataUrlFetcher {
    fn name(&self) -> &str {
        "data-url"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Virtual
    }

    async fn fetch_url_content(
        &self,
        url_info: &UrlInfo,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        let Some((media_type, bytes)) = decode(&url_info.url)? else {
            return Ok(None);
        };
        let url_type = UrlType::from_content_type(&media_type);
        Ok(Some(
            FetchedContent::new(Content::from_bytes(bytes))
                .with_url_type(url_type)
                .with_content_type(media_type),
        ))
    }
}
