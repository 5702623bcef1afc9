#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use galley_config::KitchenOptions;
use galley_graph::{UrlGraph, UrlInfo};
use galley_kitchen::processors::{PatternScanner, default_processors};
use galley_kitchen::{
    ContentProcessor, FetchedContent, HookPhase, HookResult, Kitchen, KitchenContext,
    KitchenMode, MemoryRuntime,
};

pub const ROOT: &str = "file:///project/";

pub fn url(path: &str) -> String {
    format!("{ROOT}{path}")
}

pub fn file(path: &str) -> String {
    format!("/project/{path}")
}

/// Default processors plus html, css and js scanners.
pub fn kitchen(runtime: &MemoryRuntime, mode: KitchenMode) -> Kitchen {
    kitchen_with(runtime, mode, KitchenOptions::default(), Vec::new())
}

pub fn kitchen_with(
    runtime: &MemoryRuntime,
    mode: KitchenMode,
    options: KitchenOptions,
    extra: Vec<Arc<dyn ContentProcessor>>,
) -> Kitchen {
    let mut builder = Kitchen::builder(UrlGraph::new(ROOT), Arc::new(runtime.clone()))
        .mode(mode)
        .options(options)
        .registry(default_processors())
        .processor(PatternScanner::html())
        .processor(PatternScanner::css())
        .processor(PatternScanner::js());
    for processor in extra {
        builder = builder.shared_processor(processor);
    }
    builder.build().unwrap()
}

/// `index.html -> b.css -> c.png` plus `index.html -> main.js -> util.js`.
pub fn project() -> MemoryRuntime {
    MemoryRuntime::new()
        .with_file(
            file("index.html"),
            "<link rel=\"stylesheet\" href=\"./b.css\">\n<script src=\"./main.js\"></script>\n",
        )
        .with_file(file("b.css"), "body { background: url(./c.png); }\n")
        .with_file(file("c.png"), vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
        .with_file(file("main.js"), "import { x } from './util.js';\nconsole.log(x);\n")
        .with_file(file("util.js"), "export const x = 1;\n")
}

/// Virtual-phase processor that counts fetches and waits before passing on.
#[derive(Debug, Clone, Default)]
pub struct SlowFetch {
    pub calls: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl SlowFetch {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: Arc::default(),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentProcessor for SlowFetch {
    fn name(&self) -> &str {
        "slow-fetch"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Virtual
    }

    async fn fetch_url_content(
        &self,
        _url_info: &UrlInfo,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<FetchedContent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }
}
