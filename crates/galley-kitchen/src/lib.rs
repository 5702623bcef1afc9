//! # galley-kitchen
//!
//! Resolution and cook pipeline of the galley engine.
//!
//! A [`Kitchen`] turns specifiers into urls of a [`galley_graph::UrlGraph`]
//! and cooks every node through fetch, transform and finalize. All content
//! work is delegated to [`ContentProcessor`]s registered on the kitchen;
//! [`processors`] has a small default set plus a regex scanner that is
//! enough for tests and simple projects.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use galley_graph::UrlGraph;
//! use galley_kitchen::processors::{PatternScanner, default_processors};
//! use galley_kitchen::{Kitchen, KitchenMode, NativeRuntime};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = UrlGraph::new("file:///project/");
//! let kitchen = Kitchen::builder(graph, Arc::new(NativeRuntime::new()))
//!     .mode(KitchenMode::Build)
//!     .registry(default_processors())
//!     .processor(PatternScanner::html())
//!     .processor(PatternScanner::css())
//!     .build()?;
//!
//! let entry = kitchen.add_entry_point("./index.html").await?;
//! kitchen.cook_graph(&[entry.url]).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hooks;
pub mod kitchen;
#[cfg(feature = "logging")]
pub mod logging;
pub mod processors;
pub mod runtime;

pub use error::{CookError, ErrorSite, FetchErrorCode, HookError, HookResult, Result, code_frame};
pub use hooks::{
    ContentProcessor, FetchedContent, HookPhase, HookRegistry, TransformedContent,
};
pub use kitchen::{
    Dependencies, FoundReference, IGNORE_PROTOCOL, Kitchen, KitchenBuilder, KitchenContext,
    KitchenMode, LateMutation, ResolvedReference, inline_url, is_ignored_url,
};
pub use runtime::{FileMetadata, MemoryRuntime, NativeRuntime, Runtime, RuntimeError};

pub use tokio_util::sync::CancellationToken;
