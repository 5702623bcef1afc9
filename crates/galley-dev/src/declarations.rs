//! Reads `import.meta.hot` declarations out of cooked scripts.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use galley_graph::url::resolve_url;
use galley_graph::{HotDeclaration, UrlInfo, UrlType};
use galley_kitchen::{
    ContentProcessor, HookError, HookPhase, HookResult, KitchenContext, TransformedContent,
};
use regex::Regex;

static ACCEPT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"import\.meta\.hot\.accept\(\s*(?P<args>[^)]*)\)"#).ok());
static DECLINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"import\.meta\.hot\.decline\("#).ok());
static SPECIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"['"](?P<specifier>[^'"]+)['"]"#).ok());

/// Declarations found in `text`, dependencies left as written.
fn scan(text: &str) -> (HotDeclaration, Vec<String>) {
    let mut declaration = HotDeclaration::default();
    let mut specifiers = Vec::new();
    let (Some(accept), Some(decline), Some(specifier)) =
        (ACCEPT.as_ref(), DECLINE.as_ref(), SPECIFIER.as_ref())
    else {
        return (declaration, specifiers);
    };
    for captures in accept.captures_iter(text) {
        let args = captures.name("args").map_or("", |m| m.as_str());
        let mut named: Vec<String> = specifier
            .captures_iter(args)
            .filter_map(|c| c.name("specifier").map(|m| m.as_str().to_string()))
            .collect();
        let first_is_callback = !args.trim_start().starts_with(['\'', '"', '[']);
        if named.is_empty() || first_is_callback {
            declaration.accept_self = true;
        }
        if !first_is_callback {
            specifiers.append(&mut named);
        }
    }
    declaration.decline = decline.is_match(text);
    (declaration, specifiers)
}

/// Records what each script declares about hot updates on its node.
///
/// `accept()` or `accept(callback)` accepts the module itself,
/// `accept('./dep.js', ..)` accepts updates of one dependency and
/// `decline()` refuses every update that reaches the module.
#[derive(Debug, Clone, Copy, Default)]
pub struct HotDeclarationScanner;

impl HotDeclarationScanner {
    fn dependency_url(info: &UrlInfo, specifier: &str, ctx: &KitchenContext) -> Option<String> {
        let graph = ctx.graph();
        let known = graph
            .references_to_others(&info.url)
            .ok()?
            .into_iter()
            .find(|reference| reference.specifier == specifier)
            .and_then(|reference| reference.url().map(str::to_string));
        known.or_else(|| resolve_url(specifier, &info.url))
    }
}

#[async_trait]
impl ContentProcessor for HotDeclarationScanner {
    fn name(&self) -> &str {
        "hot-declarations"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Finalize
    }

    async fn finalize_url_content(
        &self,
        url_info: &UrlInfo,
        ctx: &KitchenContext,
    ) -> HookResult<Option<TransformedContent>> {
        if !ctx.is_dev() {
            return Ok(None);
        }
        if !matches!(
            url_info.url_type,
            Some(UrlType::JsModule | UrlType::JsClassic)
        ) {
            return Ok(None);
        }
        let Some(text) = url_info.text() else {
            return Ok(None);
        };

        let (mut declaration, specifiers) = scan(text);
        let accepted: BTreeSet<String> = specifiers
            .iter()
            .filter_map(|specifier| Self::dependency_url(url_info, specifier, ctx))
            .collect();
        declaration.accepted_dependencies = accepted;
        if declaration == url_info.hot {
            return Ok(None);
        }

        tracing::trace!(
            url = %url_info.url,
            accept_self = declaration.accept_self,
            decline = declaration.decline,
            dependencies = declaration.accepted_dependencies.len(),
            "hot declaration"
        );
        ctx.graph()
            .update_url_info(&url_info.url, |info| info.hot = declaration)
            .map_err(HookError::other)?;
        Ok(None)
    }
}
