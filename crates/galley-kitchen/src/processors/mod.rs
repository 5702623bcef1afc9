//! Built-in content processors.
//!
//! None of these is registered implicitly; [`default_processors`] returns
//! the usual set for serving or building files from disk.

mod data_url;
mod file_fetcher;
mod inline;
mod node_modules;
mod pattern_scanner;
mod relative_formatter;
mod url_resolver;

pub use data_url::DataUrlFetcher;
pub use file_fetcher::FileFetcher;
pub use inline::InlineContentFetcher;
pub use node_modules::{ManifestCache, NodeModulesResolver};
pub use pattern_scanner::{PatternScanner, ScanRule};
pub use relative_formatter::RelativeFormatter;
pub use url_resolver::UrlResolver;

use crate::hooks::HookRegistry;

/// Inline and data url fetchers, url and node_modules resolution, file
/// fetching and relative formatting. Scanners are left to the caller.
pub fn default_processors() -> HookRegistry {
    let mut registry = HookRegistry::new();
    registry.add(InlineContentFetcher);
    registry.add(DataUrlFetcher);
    registry.add(UrlResolver);
    registry.add(NodeModulesResolver::default());
    registry.add(FileFetcher);
    registry.add(RelativeFormatter);
    registry
}
