//! Graph nodes: one per distinct resource url.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::reference::ReferenceId;
use crate::url_type::UrlType;
use crate::{GraphError, Result};

/// Node content. Text for everything processors rewrite, bytes for the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    /// Decode bytes as text when they are valid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Content::Text(text),
            Err(err) => Content::Binary(err.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

/// Cook state machine.
///
/// Transitions only move forward (`Errored` is reachable from any state);
/// [`UrlInfo::reset`] is the only way back to `Uncooked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookStatus {
    #[default]
    Uncooked,
    Fetching,
    Transforming,
    Finalizing,
    Cooked,
    Errored,
}

impl CookStatus {
    pub fn can_transition_to(self, next: CookStatus) -> bool {
        match next {
            CookStatus::Errored => true,
            CookStatus::Uncooked => false,
            _ => self != CookStatus::Errored && next > self,
        }
    }
}

impl fmt::Display for CookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CookStatus::Uncooked => "uncooked",
            CookStatus::Fetching => "fetching",
            CookStatus::Transforming => "transforming",
            CookStatus::Finalizing => "finalizing",
            CookStatus::Cooked => "cooked",
            CookStatus::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Hot-update declarations made by a node's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotDeclaration {
    pub accept_self: bool,
    pub decline: bool,
    /// Urls of dependencies whose updates this node applies itself.
    pub accepted_dependencies: BTreeSet<String>,
}

impl HotDeclaration {
    pub fn accepts(&self, dependency_url: &str) -> bool {
        self.accepted_dependencies.contains(dependency_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlInfo {
    pub url: String,
    /// Url without search params, for search-param variants.
    pub original_url: Option<String>,
    pub url_type: Option<UrlType>,
    pub content_type: Option<String>,
    content: Option<Content>,
    pub original_content: Option<Content>,
    #[serde(skip)]
    etag: OnceLock<String>,
    status: CookStatus,
    pub headers: BTreeMap<String, String>,
    pub is_entry_point: bool,
    pub is_inline: bool,
    /// Node whose content embeds this one.
    pub inline_parent: Option<String>,
    /// Nearest owning entry point.
    pub entry_url: Option<String>,
    pub content_finalized: bool,
    pub(crate) references_to_others: BTreeSet<ReferenceId>,
    pub(crate) references_from_others: BTreeSet<ReferenceId>,
    pub first_reference: Option<ReferenceId>,
    pub last_reference: Option<ReferenceId>,
    /// Logical clock values (see [`UrlGraph::tick`](crate::UrlGraph::tick)); 0 means never.
    pub modified_at: u64,
    pub dereferenced_at: u64,
    pub descendant_modified_at: u64,
    /// The file backing this node was removed.
    pub removed: bool,
    pub filename_hint: Option<String>,
    pub debug: bool,
    pub hot: HotDeclaration,
    pub sourcemap: Option<String>,
    /// Free-form processor data.
    pub data: BTreeMap<String, serde_json::Value>,
}

impl UrlInfo {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            original_url: None,
            url_type: None,
            content_type: None,
            content: None,
            original_content: None,
            etag: OnceLock::new(),
            status: CookStatus::Uncooked,
            headers: BTreeMap::new(),
            is_entry_point: false,
            is_inline: false,
            inline_parent: None,
            entry_url: None,
            content_finalized: false,
            references_to_others: BTreeSet::new(),
            references_from_others: BTreeSet::new(),
            first_reference: None,
            last_reference: None,
            modified_at: 0,
            dereferenced_at: 0,
            descendant_modified_at: 0,
            removed: false,
            filename_hint: None,
            debug: false,
            hot: HotDeclaration::default(),
            sourcemap: None,
            data: BTreeMap::new(),
        }
    }

    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(Content::as_text)
    }

    /// Replace content; the etag is recomputed on next access.
    pub fn set_content(&mut self, content: impl Into<Content>) {
        self.content = Some(content.into());
        self.etag = OnceLock::new();
    }

    pub fn clear_content(&mut self) {
        self.content = None;
        self.etag = OnceLock::new();
    }

    /// blake3 hex digest of the current content.
    pub fn etag(&self) -> Option<&str> {
        let content = self.content.as_ref()?;
        Some(
            self.etag
                .get_or_init(|| blake3::hash(content.as_bytes()).to_hex().to_string())
                .as_str(),
        )
    }

    pub fn status(&self) -> CookStatus {
        self.status
    }

    pub fn set_status(&mut self, next: CookStatus) -> Result<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(GraphError::InvalidTransition {
                url: self.url.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Back to `Uncooked`, dropping content produced by the last cook pass.
    ///
    /// References are kept so the next pass can prune what it no longer finds.
    /// `hot` keeps the last known declaration until a later pass replaces it.
    pub fn reset(&mut self) {
        self.status = CookStatus::Uncooked;
        self.clear_content();
        self.original_content = None;
        self.content_finalized = false;
        self.sourcemap = None;
        self.headers.clear();
    }

    pub fn references_to_others(&self) -> impl Iterator<Item = ReferenceId> + '_ {
        self.references_to_others.iter().copied()
    }

    pub fn references_from_others(&self) -> impl Iterator<Item = ReferenceId> + '_ {
        self.references_from_others.iter().copied()
    }

    pub fn is_root(&self) -> bool {
        self.url_type == Some(UrlType::Root)
    }
}
