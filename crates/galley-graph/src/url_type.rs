//! Semantic type of a graph node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GraphError;

/// What a node's content is, as far as processors are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlType {
    /// The abstract project root.
    Root,
    Html,
    Css,
    JsModule,
    JsClassic,
    Json,
    Importmap,
    Sourcemap,
    Webmanifest,
    Directory,
    Text,
    Asset,
    /// Output of another entry point's build, supplied once that build completes.
    EntryBuild,
}

impl UrlType {
    pub const ALL: [UrlType; 13] = [
        UrlType::Root,
        UrlType::Html,
        UrlType::Css,
        UrlType::JsModule,
        UrlType::JsClassic,
        UrlType::Json,
        UrlType::Importmap,
        UrlType::Sourcemap,
        UrlType::Webmanifest,
        UrlType::Directory,
        UrlType::Text,
        UrlType::Asset,
        UrlType::EntryBuild,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UrlType::Root => "root",
            UrlType::Html => "html",
            UrlType::Css => "css",
            UrlType::JsModule => "js_module",
            UrlType::JsClassic => "js_classic",
            UrlType::Json => "json",
            UrlType::Importmap => "importmap",
            UrlType::Sourcemap => "sourcemap",
            UrlType::Webmanifest => "webmanifest",
            UrlType::Directory => "directory",
            UrlType::Text => "text",
            UrlType::Asset => "asset",
            UrlType::EntryBuild => "entry_build",
        }
    }

    /// Infer a type from a file extension (with or without the leading dot).
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "html" | "htm" => UrlType::Html,
            "css" => UrlType::Css,
            "js" | "mjs" | "jsx" | "ts" | "tsx" => UrlType::JsModule,
            "cjs" => UrlType::JsClassic,
            "json" => UrlType::Json,
            "importmap" => UrlType::Importmap,
            "map" => UrlType::Sourcemap,
            "webmanifest" => UrlType::Webmanifest,
            "txt" | "md" => UrlType::Text,
            _ => UrlType::Asset,
        }
    }

    /// Infer a type from a url, using its extension; trailing `/` means directory.
    pub fn from_url(url: &str) -> Self {
        let without_search = crate::url::url_without_search(url);
        if crate::url::url_without_hash(&without_search).ends_with('/') {
            return UrlType::Directory;
        }
        crate::url::extension(url).map_or(UrlType::Asset, UrlType::from_extension)
    }

    /// Infer a type from a MIME content type (parameters are ignored).
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/html" => UrlType::Html,
            "text/css" => UrlType::Css,
            "text/javascript" | "application/javascript" => UrlType::JsModule,
            "application/importmap+json" => UrlType::Importmap,
            "application/manifest+json" => UrlType::Webmanifest,
            "application/json" => UrlType::Json,
            "text/plain" | "text/markdown" => UrlType::Text,
            _ => UrlType::Asset,
        }
    }

    /// Content type used when nothing better is known.
    pub fn default_content_type(self) -> &'static str {
        match self {
            UrlType::Html => "text/html",
            UrlType::Css => "text/css",
            UrlType::JsModule | UrlType::JsClassic => "text/javascript",
            UrlType::Json | UrlType::Sourcemap | UrlType::Directory => "application/json",
            UrlType::Importmap => "application/importmap+json",
            UrlType::Webmanifest => "application/manifest+json",
            UrlType::Text => "text/plain",
            UrlType::Root | UrlType::Asset | UrlType::EntryBuild => "application/octet-stream",
        }
    }

    /// Canonical extension for output naming.
    pub fn extension(self) -> &'static str {
        match self {
            UrlType::Html => ".html",
            UrlType::Css => ".css",
            UrlType::JsModule | UrlType::JsClassic => ".js",
            UrlType::Json | UrlType::Directory => ".json",
            UrlType::Importmap => ".importmap",
            UrlType::Sourcemap => ".map",
            UrlType::Webmanifest => ".webmanifest",
            UrlType::Text => ".txt",
            UrlType::Root | UrlType::Asset | UrlType::EntryBuild => "",
        }
    }

    pub fn is_js(self) -> bool {
        matches!(self, UrlType::JsModule | UrlType::JsClassic)
    }

    pub fn is_textual(self) -> bool {
        !matches!(self, UrlType::Asset | UrlType::Root | UrlType::EntryBuild)
    }
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UrlType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GraphError::UnknownUrlType(s.to_string()))
    }
}
