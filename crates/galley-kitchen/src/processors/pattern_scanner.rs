//! Regex-driven specifier discovery.
//!
//! Not a parser: good enough for tests, fixtures and simple projects, and a
//! template for real processors built on proper parsers.

use std::ops::Range;

use async_trait::async_trait;
use galley_graph::{InlineContent, ReferenceId, ReferenceKind, Trace, UrlInfo, UrlType};
use regex::Regex;

use crate::error::HookResult;
use crate::hooks::{ContentProcessor, HookPhase, TransformedContent};
use crate::kitchen::{Dependencies, KitchenContext, inline_url};

/// Picks the reference kind from the full text of a match.
pub type Classifier = fn(&str) -> ReferenceKind;

/// One pattern of a [`PatternScanner`].
///
/// Plain rules need a `specifier` capture group, inline rules a `content`
/// group.
#[derive(Debug, Clone)]
pub struct ScanRule {
    regex: Regex,
    kind: ReferenceKind,
    classify: Option<Classifier>,
    expected_type: Option<UrlType>,
    inline_type: Option<UrlType>,
}

impl ScanRule {
    /// Rule whose `specifier` group is replaced by the generated specifier.
    pub fn specifier(pattern: &str, kind: ReferenceKind) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            kind,
            classify: None,
            expected_type: None,
            inline_type: None,
        })
    }

    /// Rule whose `content` group is inline content of `url_type`.
    pub fn inline(
        pattern: &str,
        kind: ReferenceKind,
        url_type: UrlType,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            kind,
            classify: None,
            expected_type: None,
            inline_type: Some(url_type),
        })
    }

    pub fn expected_type(mut self, url_type: UrlType) -> Self {
        self.expected_type = Some(url_type);
        self
    }

    pub fn classify(mut self, classifier: Classifier) -> Self {
        self.classify = Some(classifier);
        self
    }
}

struct Hit {
    range: Range<usize>,
    text: String,
    kind: ReferenceKind,
    expected_type: Option<UrlType>,
    inline_type: Option<UrlType>,
}

/// 1-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (u32, u32) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |index| index + 1);
    let column = before[line_start..].chars().count() + 1;
    (line as u32, column as u32)
}

fn link_kind(tag: &str) -> ReferenceKind {
    let lower = tag.to_ascii_lowercase();
    let hint = ["preload", "prefetch", "modulepreload", "preconnect", "dns-prefetch"]
        .iter()
        .any(|rel| {
            lower.contains(&format!("rel=\"{rel}\"")) || lower.contains(&format!("rel='{rel}'"))
        });
    if hint {
        ReferenceKind::ResourceHint
    } else {
        ReferenceKind::LinkHref
    }
}

/// Finds specifiers in content of one url type and rewrites them.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    name: String,
    url_type: UrlType,
    rules: Vec<ScanRule>,
}

impl PatternScanner {
    pub fn new(name: impl Into<String>, url_type: UrlType, rules: Vec<ScanRule>) -> Self {
        Self {
            name: name.into(),
            url_type,
            rules,
        }
    }

    /// `url(...)` and `@import "..."`.
    pub fn css() -> Self {
        let rules = [
            ScanRule::specifier(
                r#"@import\s+['"](?P<specifier>[^'"]+)['"]"#,
                ReferenceKind::CssImport,
            )
            .map(|rule| rule.expected_type(UrlType::Css)),
            ScanRule::specifier(
                r#"url\(\s*['"]?(?P<specifier>[^'")\s]+)['"]?\s*\)"#,
                ReferenceKind::CssUrl,
            ),
        ];
        Self::new("css-scanner", UrlType::Css, rules.into_iter().flatten().collect())
    }

    /// Static, side-effect and dynamic imports plus `new URL(.., import.meta.url)`.
    pub fn js() -> Self {
        let rules = [
            ScanRule::specifier(
                r#"\b(?:import|export)\b[^'"`;]*?\bfrom\s*['"](?P<specifier>[^'"]+)['"]"#,
                ReferenceKind::JsImport,
            ),
            ScanRule::specifier(
                r#"\bimport\s*['"](?P<specifier>[^'"]+)['"]"#,
                ReferenceKind::JsImport,
            ),
            ScanRule::specifier(
                r#"\bimport\(\s*['"](?P<specifier>[^'"]+)['"]\s*\)"#,
                ReferenceKind::JsImportDynamic,
            ),
            ScanRule::specifier(
                r#"new\s+URL\(\s*['"](?P<specifier>[^'"]+)['"]\s*,\s*import\.meta\.url\s*\)"#,
                ReferenceKind::JsUrl,
            ),
        ];
        Self::new("js-scanner", UrlType::JsModule, rules.into_iter().flatten().collect())
    }

    /// Script, link and media attributes plus inline `<script>`/`<style>` bodies.
    pub fn html() -> Self {
        let rules = [
            ScanRule::specifier(
                r#"<script\b[^>]*?\bsrc\s*=\s*["'](?P<specifier>[^"']+)["']"#,
                ReferenceKind::ScriptSrc,
            ),
            ScanRule::specifier(
                r#"<link\b[^>]*?\bhref\s*=\s*["'](?P<specifier>[^"']+)["'][^>]*>"#,
                ReferenceKind::LinkHref,
            )
            .map(|rule| rule.classify(link_kind)),
            ScanRule::specifier(
                r#"<(?:img|source|video|audio)\b[^>]*?\bsrc\s*=\s*["'](?P<specifier>[^"']+)["']"#,
                ReferenceKind::HtmlAsset,
            ),
            ScanRule::inline(
                r#"<script\b[^>]*>(?P<content>[\s\S]*?)</script>"#,
                ReferenceKind::ScriptInline,
                UrlType::JsModule,
            ),
            ScanRule::inline(
                r#"<style\b[^>]*>(?P<content>[\s\S]*?)</style>"#,
                ReferenceKind::StyleInline,
                UrlType::Css,
            ),
        ];
        Self::new("html-scanner", UrlType::Html, rules.into_iter().flatten().collect())
    }

    fn scan(&self, text: &str) -> Vec<Hit> {
        let mut hits = Vec::new();
        for rule in &self.rules {
            let group = if rule.inline_type.is_some() {
                "content"
            } else {
                "specifier"
            };
            for captures in rule.regex.captures_iter(text) {
                let Some(found) = captures.name(group) else {
                    continue;
                };
                if found.as_str().trim().is_empty() {
                    continue;
                }
                let kind = match (rule.classify, captures.get(0)) {
                    (Some(classify), Some(whole)) => classify(whole.as_str()),
                    _ => rule.kind,
                };
                hits.push(Hit {
                    range: found.range(),
                    text: found.as_str().to_string(),
                    kind,
                    expected_type: rule.expected_type,
                    inline_type: rule.inline_type,
                });
            }
        }
        hits.sort_by_key(|hit| hit.range.start);
        hits
    }
}

#[async_trait]
impl ContentProcessor for PatternScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Transform
    }

    async fn transform_url_content(
        &self,
        url_info: &UrlInfo,
        dependencies: &Dependencies,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<TransformedContent>> {
        if url_info.url_type != Some(self.url_type) {
            return Ok(None);
        }
        let Some(text) = url_info.text() else {
            return Ok(None);
        };

        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for hit in self.scan(text) {
            let (line, column) = line_column(text, hit.range.start);
            let trace = Trace::new(url_info.url.clone(), line, column);

            match hit.inline_type {
                Some(url_type) => {
                    let specifier = inline_url(&url_info.url, Some(&trace), url_type, ReferenceId(0));
                    let params = dependencies
                        .params(hit.kind, specifier)
                        .trace(trace)
                        .inline(InlineContent::new(hit.text, url_type));
                    let found = dependencies.found(params).await?;
                    if let Some(cooked) = dependencies.cook_inline(&found).await? {
                        edits.push((hit.range, cooked));
                    }
                }
                None => {
                    let mut params = dependencies.params(hit.kind, hit.text).trace(trace);
                    if let Some(expected) = hit.expected_type {
                        params = params.expected_type(expected);
                    }
                    let found = dependencies.found(params).await?;
                    edits.push((hit.range, found.generated_specifier));
                }
            }
        }

        if edits.is_empty() {
            return Ok(None);
        }
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;
        for (range, replacement) in edits {
            if range.start < cursor {
                continue;
            }
            output.push_str(&text[cursor..range.start]);
            output.push_str(&replacement);
            cursor = range.end;
        }
        output.push_str(&text[cursor..]);
        if output == text {
            return Ok(None);
        }
        Ok(Some(TransformedContent::new(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_is_one_based() {
        let text = "a\nbc\n  url(x)";
        assert_eq!(line_column(text, 0), (1, 1));
        assert_eq!(line_column(text, 3), (2, 2));
        assert_eq!(line_column(text, text.find("url").unwrap()), (3, 3));
    }

    #[test]
    fn scans_css_in_source_order() {
        let hits = PatternScanner::css().scan(
            "@import \"./base.css\";\nbody { background: url(./bg.png) }\n.x { mask: url('#m') }",
        );
        let found: Vec<(&str, ReferenceKind)> =
            hits.iter().map(|h| (h.text.as_str(), h.kind)).collect();
        assert_eq!(
            found,
            [
                ("./base.css", ReferenceKind::CssImport),
                ("./bg.png", ReferenceKind::CssUrl),
                ("#m", ReferenceKind::CssUrl),
            ]
        );
    }

    #[test]
    fn scans_js_imports() {
        let hits = PatternScanner::js().scan(
            "import a from './a.js';\nimport './side.js';\nconst b = import(\"./b.js\");\nexport { c } from \"./c.js\";\nnew URL('./d.png', import.meta.url);",
        );
        let found: Vec<(&str, ReferenceKind)> =
            hits.iter().map(|h| (h.text.as_str(), h.kind)).collect();
        assert_eq!(
            found,
            [
                ("./a.js", ReferenceKind::JsImport),
                ("./side.js", ReferenceKind::JsImport),
                ("./b.js", ReferenceKind::JsImportDynamic),
                ("./c.js", ReferenceKind::JsImport),
                ("./d.png", ReferenceKind::JsUrl),
            ]
        );
    }

    #[test]
    fn classifies_resource_hints_and_inline_bodies() {
        let hits = PatternScanner::html().scan(
            "<link rel=\"preload\" href=\"./font.woff2\">\n<link rel=\"stylesheet\" href=\"./b.css\">\n<script src=\"./main.js\"></script>\n<style>a{}</style>",
        );
        let found: Vec<(&str, ReferenceKind)> =
            hits.iter().map(|h| (h.text.as_str(), h.kind)).collect();
        assert_eq!(
            found,
            [
                ("./font.woff2", ReferenceKind::ResourceHint),
                ("./b.css", ReferenceKind::LinkHref),
                ("./main.js", ReferenceKind::ScriptSrc),
                ("a{}", ReferenceKind::StyleInline),
            ]
        );
    }
}
