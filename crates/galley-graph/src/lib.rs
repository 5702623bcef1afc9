//! # galley-graph
//!
//! Url graph and reference model for the galley engine.
//!
//! Every resource a project touches (file, inline snippet, data url, virtual
//! url) becomes a [`UrlInfo`] keyed by its url. Specifiers found in content
//! become [`Reference`]s, edges owned by the node that contains them. The
//! [`UrlGraph`] keeps both in an arena behind a single lock:
//!
//! ```text
//!            root (abstract)
//!              │ entry_point
//!              ▼
//!         index.html ──link_href──▶ main.css ──css_url──▶ logo.png
//!              │
//!              └──script_src──▶ main.js ──js_import──▶ util.js
//! ```
//!
//! References are addressed by [`ReferenceId`]; nodes by url. Neither holds
//! pointers to the other, which keeps dumps ([`UrlGraph::to_json`],
//! [`UrlGraph::to_dot`]) and cycle handling simple.
//!
//! ## Quick start
//!
//! ```rust
//! use galley_graph::{ReferenceKind, ReferenceParams, UrlGraph};
//!
//! # fn main() -> galley_graph::Result<()> {
//! let graph = UrlGraph::new("file:///project/");
//! let entry = graph.create_reference(
//!     ReferenceParams::new(graph.root_url(), ReferenceKind::EntryPoint, "./index.html"),
//! )?;
//! graph.resolve_reference(entry, "file:///project/index.html")?;
//! let url = graph.reuse_or_create_url_info(entry)?;
//! graph.add_reference(entry)?;
//!
//! assert!(graph.is_used(&url)?);
//! # Ok(())
//! # }
//! ```

mod event;
mod memory;
pub mod reference;
pub mod url;
pub mod url_info;
pub mod url_type;

pub use event::{GraphEvent, GraphListener};
pub use memory::{CollectionOutcome, CollectionSnapshot, UrlGraph};
pub use reference::{InlineContent, Reference, ReferenceId, ReferenceKind, ReferenceParams, Trace};
pub use url_info::{Content, CookStatus, HotDeclaration, UrlInfo};
pub use url_type::UrlType;

/// Errors raised by graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("no node for url `{0}`")]
    UnknownUrl(String),

    #[error("unknown reference {0}")]
    UnknownReference(ReferenceId),

    #[error("{0} has no resolved url yet")]
    UnresolvedReference(ReferenceId),

    #[error("{reference} is already resolved to `{url}`")]
    UrlAlreadyResolved { reference: ReferenceId, url: String },

    #[error("cannot change references of `{owner}` (specifier `{specifier}`): content is finalized")]
    ContentFinalized { owner: String, specifier: String },

    #[error("`{url}` cannot go from {from} to {to}")]
    InvalidTransition {
        url: String,
        from: CookStatus,
        to: CookStatus,
    },

    #[error("unknown url type `{0}`")]
    UnknownUrlType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests;
