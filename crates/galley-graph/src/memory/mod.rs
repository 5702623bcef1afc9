//! In-memory UrlGraph implementation.
//!
//! Methods are split by concern; each file adds an `impl UrlGraph` block.

mod collection;
mod construction;
mod graph;
mod mutations;
mod queries;
mod serialization;
mod traversal;

pub use collection::{CollectionOutcome, CollectionSnapshot};
pub use graph::UrlGraph;
