//! Per-session state shared with every hook.

use std::fmt;
use std::sync::Arc;

use galley_config::KitchenOptions;
use galley_graph::UrlGraph;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::{CookError, Result};
use crate::runtime::Runtime;

/// What the kitchen cooks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KitchenMode {
    /// Serve on demand; nodes can be invalidated and recooked.
    Dev,
    /// Cook everything once; any error aborts.
    Build,
}

/// Explicit session context passed to hooks.
///
/// Created with the kitchen and dropped with it; nothing in here is global.
#[derive(Clone)]
pub struct KitchenContext {
    graph: UrlGraph,
    mode: KitchenMode,
    options: KitchenOptions,
    ignore: Vec<Regex>,
    runtime: Arc<dyn Runtime>,
    cancellation: CancellationToken,
}

impl KitchenContext {
    pub(crate) fn new(
        graph: UrlGraph,
        mode: KitchenMode,
        options: KitchenOptions,
        ignore: Vec<Regex>,
        runtime: Arc<dyn Runtime>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            graph,
            mode,
            options,
            ignore,
            runtime,
            cancellation,
        }
    }

    pub fn graph(&self) -> &UrlGraph {
        &self.graph
    }

    pub fn mode(&self) -> KitchenMode {
        self.mode
    }

    pub fn is_dev(&self) -> bool {
        self.mode == KitchenMode::Dev
    }

    pub fn options(&self) -> &KitchenOptions {
        &self.options
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Url of the project root directory (the graph root).
    pub fn root_url(&self) -> String {
        self.graph.root_url()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// `Err(Aborted)` once the session was cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            Err(CookError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Matches one of the `ignore` patterns or an excluded package.
    pub fn is_ignored(&self, url: &str) -> bool {
        if self.ignore.iter().any(|pattern| pattern.is_match(url)) {
            return true;
        }
        self.options.excluded_packages.iter().any(|package| {
            let segment = format!("/node_modules/{package}/");
            url.contains(&segment)
        })
    }
}

impl fmt::Debug for KitchenContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitchenContext")
            .field("root_url", &self.graph.root_url())
            .field("mode", &self.mode)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
