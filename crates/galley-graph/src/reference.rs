//! References: directed edges from an owning node to a specifier it contains.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::url_type::UrlType;
use crate::{GraphError, Result};

/// Handle to a reference stored in a [`UrlGraph`](crate::UrlGraph).
///
/// Ids grow monotonically, so ordering by id is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceId(pub u32);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Semantic role of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Root -> declared entry point.
    EntryPoint,
    /// A request made to the dev server; never attached to the graph.
    HttpRequest,
    /// `import x from "..."`, `export ... from "..."`
    JsImport,
    /// `import("...")`
    JsImportDynamic,
    /// `new URL("...", import.meta.url)`
    JsUrl,
    /// Inline content embedded in javascript (template literal css/html).
    JsInline,
    /// `<script src>`
    ScriptSrc,
    /// `<script>...</script>`
    ScriptInline,
    /// `<link href>`
    LinkHref,
    /// `<style>...</style>`
    StyleInline,
    /// `<img src>`, `<source srcset>`, `<a href>`...
    HtmlAsset,
    /// `@import`
    CssImport,
    /// `url()`
    CssUrl,
    /// `//# sourceMappingURL=`
    SourcemapComment,
    /// Specifier mapped by an import map entry.
    ImportMapEntry,
    /// package.json backing a resolution.
    PackageManifest,
    /// `<link rel="preload|prefetch|modulepreload">`
    ResourceHint,
    /// `a.js?v=1` -> `a.js`
    SearchParamVariant,
    /// File injected for its side effects.
    SideEffectFile,
    Other,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::EntryPoint => "entry_point",
            ReferenceKind::HttpRequest => "http_request",
            ReferenceKind::JsImport => "js_import",
            ReferenceKind::JsImportDynamic => "js_import_dynamic",
            ReferenceKind::JsUrl => "js_url",
            ReferenceKind::JsInline => "js_inline",
            ReferenceKind::ScriptSrc => "script_src",
            ReferenceKind::ScriptInline => "script_inline",
            ReferenceKind::LinkHref => "link_href",
            ReferenceKind::StyleInline => "style_inline",
            ReferenceKind::HtmlAsset => "html_asset",
            ReferenceKind::CssImport => "css_import",
            ReferenceKind::CssUrl => "css_url",
            ReferenceKind::SourcemapComment => "sourcemap_comment",
            ReferenceKind::ImportMapEntry => "import_map_entry",
            ReferenceKind::PackageManifest => "package_manifest",
            ReferenceKind::ResourceHint => "resource_hint",
            ReferenceKind::SearchParamVariant => "search_param_variant",
            ReferenceKind::SideEffectFile => "side_effect_file",
            ReferenceKind::Other => "other",
        }
    }

    /// Abstract references are never registered on the owner or the target.
    pub fn is_abstract(self) -> bool {
        matches!(self, ReferenceKind::HttpRequest)
    }

    pub fn is_weak_by_default(self) -> bool {
        matches!(
            self,
            ReferenceKind::ResourceHint | ReferenceKind::SearchParamVariant
        )
    }

    pub fn is_implicit_by_default(self) -> bool {
        matches!(self, ReferenceKind::PackageManifest)
    }

    pub fn is_inline_by_default(self) -> bool {
        matches!(
            self,
            ReferenceKind::ScriptInline | ReferenceKind::StyleInline | ReferenceKind::JsInline
        )
    }

    /// Script/module contexts resolve `#fragment` specifiers import-style.
    pub fn is_js_context(self) -> bool {
        matches!(
            self,
            ReferenceKind::JsImport
                | ReferenceKind::JsImportDynamic
                | ReferenceKind::JsUrl
                | ReferenceKind::ImportMapEntry
        )
    }

    /// Whether the target may be a directory.
    pub fn allows_directory(self) -> bool {
        matches!(
            self,
            ReferenceKind::EntryPoint | ReferenceKind::HttpRequest | ReferenceKind::JsUrl
        )
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a specifier appears in its owner's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub url: String,
    /// 1-based
    pub line: u32,
    /// 1-based
    pub column: u32,
}

impl Trace {
    pub fn new(url: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            url: url.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.url, self.line, self.column)
    }
}

/// Content carried by an inline reference (`<script>` body, `<style>` body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineContent {
    pub content: String,
    pub url_type: UrlType,
    pub content_type: String,
}

impl InlineContent {
    pub fn new(content: impl Into<String>, url_type: UrlType) -> Self {
        Self {
            content: content.into(),
            url_type,
            content_type: url_type.default_content_type().to_string(),
        }
    }
}

/// A directed edge from an owning node to the url a specifier resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    /// Url of the node containing the specifier.
    pub owner: String,
    pub kind: ReferenceKind,
    /// Raw text as it appeared in the owner's content.
    pub specifier: String,
    pub trace: Option<Trace>,
    url: Option<String>,
    /// Url the target is served or written under, when different from `url`.
    pub generated_url: Option<String>,
    /// Text written back into the owner's content.
    pub generated_specifier: Option<String>,
    pub expected_type: Option<UrlType>,
    pub inline: Option<InlineContent>,
    pub is_weak: bool,
    pub is_implicit: bool,
    pub is_entry_point: bool,
    pub injected: bool,
    pub filename_hint: Option<String>,
    pub debug: bool,
    /// First reference of the redirect/inline chain.
    pub original: Option<ReferenceId>,
    pub prev: Option<ReferenceId>,
    pub next: Option<ReferenceId>,
    /// References this one requires; removed together with it.
    pub implicit_references: BTreeSet<ReferenceId>,
}

impl Reference {
    pub(crate) fn from_params(id: ReferenceId, params: ReferenceParams) -> Self {
        Self {
            id,
            owner: params.owner,
            kind: params.kind,
            specifier: params.specifier,
            trace: params.trace,
            url: None,
            generated_url: None,
            generated_specifier: None,
            expected_type: params.expected_type,
            is_weak: params.is_weak.unwrap_or(params.kind.is_weak_by_default()),
            is_implicit: params
                .is_implicit
                .unwrap_or(params.kind.is_implicit_by_default()),
            is_entry_point: params.is_entry_point,
            injected: params.injected,
            inline: params.inline,
            filename_hint: params.filename_hint,
            debug: params.debug,
            original: None,
            prev: None,
            next: None,
            implicit_references: BTreeSet::new(),
        }
    }

    /// Copy of `self` pointing at `url`, linked as the next step of the chain.
    pub(crate) fn redirected(&self, id: ReferenceId, url: String) -> Self {
        Self {
            id,
            url: Some(url),
            generated_url: None,
            generated_specifier: None,
            original: Some(self.original.unwrap_or(self.id)),
            prev: Some(self.id),
            next: None,
            ..self.clone()
        }
    }

    /// Resolved url; `None` until resolution.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Set the resolved url. A url can be set once.
    pub fn set_url(&mut self, url: impl Into<String>) -> Result<()> {
        if let Some(existing) = &self.url {
            return Err(GraphError::UrlAlreadyResolved {
                reference: self.id,
                url: existing.clone(),
            });
        }
        self.url = Some(url.into());
        Ok(())
    }

    pub fn is_inline(&self) -> bool {
        self.inline.is_some()
    }

    /// Neither weak nor implicit: keeps its target alive.
    pub fn is_strong(&self) -> bool {
        !self.is_weak && !self.is_implicit
    }

    /// Url the target is emitted under.
    pub fn effective_url(&self) -> Option<&str> {
        self.generated_url.as_deref().or(self.url.as_deref())
    }
}

/// Parameters for [`UrlGraph::create_reference`](crate::UrlGraph::create_reference).
///
/// Flags left unset take the default of the reference kind.
#[derive(Debug, Clone)]
pub struct ReferenceParams {
    owner: String,
    kind: ReferenceKind,
    specifier: String,
    trace: Option<Trace>,
    expected_type: Option<UrlType>,
    inline: Option<InlineContent>,
    is_weak: Option<bool>,
    is_implicit: Option<bool>,
    is_entry_point: bool,
    injected: bool,
    filename_hint: Option<String>,
    debug: bool,
}

impl ReferenceParams {
    pub fn new(
        owner: impl Into<String>,
        kind: ReferenceKind,
        specifier: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            kind,
            specifier: specifier.into(),
            trace: None,
            expected_type: None,
            inline: None,
            is_weak: None,
            is_implicit: None,
            is_entry_point: kind == ReferenceKind::EntryPoint,
            injected: false,
            filename_hint: None,
            debug: false,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn expected_type(mut self, url_type: UrlType) -> Self {
        self.expected_type = Some(url_type);
        self
    }

    pub fn inline(mut self, content: InlineContent) -> Self {
        self.inline = Some(content);
        self
    }

    pub fn weak(mut self, weak: bool) -> Self {
        self.is_weak = Some(weak);
        self
    }

    pub fn implicit(mut self, implicit: bool) -> Self {
        self.is_implicit = Some(implicit);
        self
    }

    pub fn entry_point(mut self, entry_point: bool) -> Self {
        self.is_entry_point = entry_point;
        self
    }

    pub fn injected(mut self, injected: bool) -> Self {
        self.injected = injected;
        self
    }

    pub fn filename_hint(mut self, hint: impl Into<String>) -> Self {
        self.filename_hint = Some(hint.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
