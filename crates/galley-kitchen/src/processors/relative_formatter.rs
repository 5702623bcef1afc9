use galley_graph::url::{is_file_url, relative_url};
use galley_graph::{Reference, ReferenceKind};

use crate::error::HookResult;
use crate::hooks::{ContentProcessor, HookPhase};
use crate::kitchen::KitchenContext;

/// Writes file urls relative to their owner (`./b.css`, `../img/c.png`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeFormatter;

impl ContentProcessor for RelativeFormatter {
    fn name(&self) -> &str {
        "relative-formatter"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Format
    }

    fn format_reference(
        &self,
        reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        if matches!(
            reference.kind,
            ReferenceKind::EntryPoint | ReferenceKind::HttpRequest
        ) || reference.is_inline()
        {
            return Ok(None);
        }
        let Some(target) = reference.effective_url() else {
            return Ok(None);
        };
        if !is_file_url(target) || !is_file_url(&reference.owner) {
            return Ok(None);
        }
        Ok(Some(relative_url(&reference.owner, target)))
    }
}
