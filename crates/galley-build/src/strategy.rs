//! How a reference reaches the versioned path of its target.

use std::collections::BTreeMap;

use galley_graph::{ReferenceKind, UrlType};
use serde::{Deserialize, Serialize};

/// Name of the runtime lookup table for [`VersioningStrategy::Global`].
pub const GLOBAL_VERSIONS: &str = "__galley_versions__";
/// Lookup helper written in place of globally versioned specifiers.
pub const GLOBAL_LOOKUP: &str = "__v__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersioningStrategy {
    /// The versioned path is written into the content.
    Static,
    /// The content calls the injected lookup table at runtime.
    Global,
    /// The content keeps the unversioned path; an injected import map
    /// maps it to the versioned one.
    ImportMap,
}

impl VersioningStrategy {
    /// Default strategy for references of `kind`.
    pub fn for_kind(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::JsImportDynamic => VersioningStrategy::Global,
            ReferenceKind::ImportMapEntry => VersioningStrategy::ImportMap,
            _ => VersioningStrategy::Static,
        }
    }

    /// Whether the target's version is part of the referrer's version.
    pub fn is_static(self) -> bool {
        self == VersioningStrategy::Static
    }
}

/// Unversioned specifier -> versioned specifier, per runtime mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionMappings {
    pub global: BTreeMap<String, String>,
    pub import_map: BTreeMap<String, String>,
}

impl VersionMappings {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.import_map.is_empty()
    }

    /// `{"imports": {...}}`
    pub fn import_map_json(&self) -> String {
        let map = serde_json::json!({ "imports": &self.import_map });
        map.to_string()
    }

    /// Script defining the lookup table and its helper.
    pub fn global_script(&self) -> String {
        let table = serde_json::to_string(&self.global).unwrap_or_else(|_| "{}".to_string());
        format!(
            "globalThis.{GLOBAL_VERSIONS} = Object.assign(globalThis.{GLOBAL_VERSIONS} || {{}}, {table});\n\
             globalThis.{GLOBAL_LOOKUP} = (path) => globalThis.{GLOBAL_VERSIONS}[path] || path;\n"
        )
    }
}

/// Adds version mappings to entry point content.
pub trait VersionMappingInjector: Send + Sync {
    /// New content for an entry point of `url_type`, `None` to leave it.
    fn inject(&self, url_type: UrlType, content: &str, mappings: &VersionMappings)
    -> Option<String>;
}

/// Injects `<script>` tags into html heads and prepends the lookup table to
/// javascript entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInjector;

fn head_insert_position(html: &str) -> usize {
    let lower = html.to_ascii_lowercase();
    let Some(head) = lower.find("<head") else {
        return 0;
    };
    lower[head..]
        .find('>')
        .map_or(0, |close| head + close + 1)
}

impl VersionMappingInjector for TextInjector {
    fn inject(
        &self,
        url_type: UrlType,
        content: &str,
        mappings: &VersionMappings,
    ) -> Option<String> {
        if mappings.is_empty() {
            return None;
        }
        match url_type {
            UrlType::Html => {
                let mut tags = String::new();
                if !mappings.import_map.is_empty() {
                    tags.push_str(&format!(
                        "\n<script type=\"importmap\">{}</script>",
                        mappings.import_map_json()
                    ));
                }
                if !mappings.global.is_empty() {
                    tags.push_str(&format!("\n<script>\n{}</script>", mappings.global_script()));
                }
                let at = head_insert_position(content);
                Some(format!("{}{tags}{}", &content[..at], &content[at..]))
            }
            UrlType::JsModule | UrlType::JsClassic if !mappings.global.is_empty() => {
                Some(format!("{}{content}", mappings.global_script()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> VersionMappings {
        let mut mappings = VersionMappings::default();
        mappings
            .global
            .insert("/js/lazy.js".to_string(), "/js/lazy-1a2b3c4d.js".to_string());
        mappings
            .import_map
            .insert("/js/dep.js".to_string(), "/js/dep-5e6f7a8b.js".to_string());
        mappings
    }

    #[test]
    fn strategies_by_kind() {
        assert_eq!(
            VersioningStrategy::for_kind(ReferenceKind::JsImport),
            VersioningStrategy::Static
        );
        assert_eq!(
            VersioningStrategy::for_kind(ReferenceKind::JsImportDynamic),
            VersioningStrategy::Global
        );
        assert!(!VersioningStrategy::ImportMap.is_static());
    }

    #[test]
    fn html_gets_tags_after_head() {
        let html = "<html><head><title>x</title></head></html>";
        let injected = TextInjector
            .inject(UrlType::Html, html, &mappings())
            .unwrap_or_default();
        let head = injected.find("<head>").unwrap_or(usize::MAX);
        let import_map = injected.find("<script type=\"importmap\">").unwrap_or(0);
        assert!(head < import_map);
        assert!(injected.contains(r#"{"imports":{"/js/dep.js":"/js/dep-5e6f7a8b.js"}}"#));
        assert!(injected.contains("globalThis.__v__ = "));
        assert!(injected.ends_with("<title>x</title></head></html>"));
    }

    #[test]
    fn js_gets_the_lookup_table_only() {
        let injected = TextInjector
            .inject(UrlType::JsModule, "import('./a.js');", &mappings())
            .unwrap_or_default();
        assert!(injected.starts_with("globalThis.__galley_versions__ = "));
        assert!(injected.ends_with("import('./a.js');"));

        let mut import_map_only = mappings();
        import_map_only.global.clear();
        assert_eq!(
            TextInjector.inject(UrlType::JsModule, "x", &import_map_only),
            None
        );
        assert_eq!(
            TextInjector.inject(UrlType::Css, "x", &VersionMappings::default()),
            None
        );
    }
}
