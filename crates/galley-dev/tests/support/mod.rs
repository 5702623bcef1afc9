#![allow(dead_code)]

use std::sync::Arc;

use galley_config::DevOptions;
use galley_dev::{DevSession, HotDeclarationScanner, ServerEvent};
use galley_graph::UrlGraph;
use galley_kitchen::processors::{PatternScanner, default_processors};
use galley_kitchen::{Kitchen, KitchenMode, MemoryRuntime};
use tokio::sync::mpsc;

pub const ROOT: &str = "file:///project/";

pub fn url(path: &str) -> String {
    format!("{ROOT}{path}")
}

pub fn file(path: &str) -> String {
    format!("/project/{path}")
}

pub fn dev_kitchen(runtime: &MemoryRuntime) -> Kitchen {
    Kitchen::builder(UrlGraph::new(ROOT), Arc::new(runtime.clone()))
        .mode(KitchenMode::Dev)
        .registry(default_processors())
        .processor(PatternScanner::html())
        .processor(PatternScanner::css())
        .processor(PatternScanner::js())
        .processor(HotDeclarationScanner)
        .build()
        .unwrap()
}

pub fn session(runtime: &MemoryRuntime) -> DevSession {
    session_with(runtime, DevOptions::default())
}

pub fn session_with(runtime: &MemoryRuntime, options: DevOptions) -> DevSession {
    DevSession::new(dev_kitchen(runtime), &options)
}

/// `a.html -> b.css -> c.png` plus `a.html -> main.js -> util.js`.
pub fn page() -> MemoryRuntime {
    MemoryRuntime::new()
        .with_file(
            file("a.html"),
            "<link rel=\"stylesheet\" href=\"./b.css\">\n<script type=\"module\" src=\"./main.js\"></script>\n",
        )
        .with_file(file("b.css"), "body { background: url(./c.png); }\n")
        .with_file(file("c.png"), vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
        .with_file(file("main.js"), "import { x } from './util.js';\nconsole.log(x);\n")
        .with_file(file("util.js"), "export const x = 1;\n")
}

/// Declare `entry` and serve it plus every path in `paths`.
pub async fn serve_all(session: &DevSession, entry: &str, paths: &[&str]) {
    session.add_entry_point(&format!("./{entry}")).await.unwrap();
    session.serve(&format!("./{entry}")).await.unwrap();
    for path in paths {
        session.serve(&format!("./{path}")).await.unwrap();
    }
}

pub async fn next_event(events: &mut mpsc::Receiver<String>) -> ServerEvent {
    let json = events.recv().await.expect("client channel closed");
    serde_json::from_str(&json).unwrap()
}
