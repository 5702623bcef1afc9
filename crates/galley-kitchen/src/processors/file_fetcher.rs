use async_trait::async_trait;
use galley_graph::url::{file_url_to_path, is_file_url};
use galley_graph::{Content, UrlInfo, UrlType};

use crate::error::{HookError, HookResult};
use crate::hooks::{ContentProcessor, FetchedContent, HookPhase};
use crate::kitchen::KitchenContext;
use crate::runtime::RuntimeError;

/// Reads `file:` urls through the kitchen runtime.
///
/// Directories are only served to references allowed to point at one; their
/// content is the JSON array of entry names.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

fn runtime_error(err: RuntimeError) -> HookError {
    match err {
        RuntimeError::FileNotFound(path) => {
            HookError::NotFound(format!("{} does not exist", path.display()))
        }
        other => HookError::Other(anyhow::Error::new(other)),
    }
}

#[async_trait]
impl ContentProcessor for FileFetcher {
    fn name(&self) -> &str {
        "file-fetcher"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Fetch
    }

    async fn fetch_url_content(
        &self,
        url_info: &UrlInfo,
        ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        if url_info.is_inline || !is_file_url(&url_info.url) {
            return Ok(None);
        }
        let Some(path) = file_url_to_path(&url_info.url) else {
            return Ok(None);
        };
        let runtime = ctx.runtime();
        let metadata = runtime.metadata(&path).await.map_err(runtime_error)?;

        if metadata.is_dir {
            let allowed = url_info
                .last_reference
                .and_then(|id| ctx.graph().reference(id))
                .is_some_and(|reference| reference.kind.allows_directory());
            if !allowed {
                return Err(HookError::DirectoryReferenceNotAllowed(
                    path.display().to_string(),
                ));
            }
            let entries = runtime.read_dir(&path).await.map_err(runtime_error)?;
            let listing = serde_json::to_string(&entries).map_err(anyhow::Error::new)?;
            return Ok(Some(
                FetchedContent::new(listing).with_url_type(UrlType::Directory),
            ));
        }

        let bytes = runtime.read_file(&path).await.map_err(runtime_error)?;
        let mut fetched = FetchedContent::new(Content::from_bytes(bytes));
        if let Some(modified) = metadata.modified {
            fetched = fetched.with_header("last-modified", modified.to_string());
        }
        Ok(Some(fetched))
    }
}
