//! # galley-build
//!
//! Production builds for the galley engine.
//!
//! A [`Build`] cooks the project twice. The raw pass collects sources as
//! they are; an optional [`Bundler`] may then merge nodes. The shape pass
//! re-cooks that content in a fresh graph where every specifier points to a
//! build path. Versions derive from content, so the shape pass writes
//! placeholders that are replaced once every version is known.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use galley_build::Build;
//! use galley_kitchen::NativeRuntime;
//! use galley_kitchen::processors::PatternScanner;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), galley_build::BuildError> {
//! let output = Build::new("file:///project/", Arc::new(NativeRuntime::new()))
//!     .entry_point("./index.html")
//!     .scanner(PatternScanner::html())
//!     .scanner(PatternScanner::css())
//!     .scanner(PatternScanner::js())
//!     .run()
//!     .await?;
//! println!("{}", output.versioned_path("js/main.js"));
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod build_urls;
pub mod bundler;
pub mod entry_builds;
pub mod error;
pub mod output;
pub mod placeholders;
mod shape;
pub mod strategy;
pub mod versioning;

pub use build::Build;
pub use build_urls::BuildUrls;
pub use bundler::{BundledContent, Bundler};
pub use entry_builds::{ENTRY_BUILD_MARKER, entry_build_url};
pub use error::{BuildError, Result};
pub use output::{BuildFile, BuildOutput, MANIFEST_FILENAME};
pub use placeholders::{PLACEHOLDER_DEFAULT, Placeholders};
pub use strategy::{TextInjector, VersionMappingInjector, VersionMappings, VersioningStrategy};
pub use versioning::versioned_path;
