#![allow(dead_code)]

use std::sync::Arc;

use galley_build::{Build, BuildOutput};
use galley_kitchen::MemoryRuntime;
use galley_kitchen::processors::PatternScanner;

pub const ROOT: &str = "file:///project/";

pub fn url(path: &str) -> String {
    format!("{ROOT}{path}")
}

pub fn file(path: &str) -> String {
    format!("/project/{path}")
}

/// Build of `runtime` with the html, css and js scanners.
pub fn build(runtime: &MemoryRuntime) -> Build {
    Build::new(ROOT, Arc::new(runtime.clone()))
        .scanner(PatternScanner::html())
        .scanner(PatternScanner::css())
        .scanner(PatternScanner::js())
}

/// `index.html -> b.css -> c.png` plus `index.html -> main.js -> util.js`.
pub fn site() -> MemoryRuntime {
    MemoryRuntime::new()
        .with_file(
            file("index.html"),
            "<html><head>\n<link rel=\"stylesheet\" href=\"./b.css\">\n</head>\n<body><script type=\"module\" src=\"./main.js\"></script></body></html>\n",
        )
        .with_file(file("b.css"), "body { background: url(./c.png); }\n")
        .with_file(file("c.png"), vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
        .with_file(file("main.js"), "import { x } from './util.js';\nconsole.log(x);\n")
        .with_file(file("util.js"), "export const x = 1;\n")
}

/// Versioned path of `path`, failing the test when it was not versioned.
pub fn versioned<'a>(output: &'a BuildOutput, path: &str) -> &'a str {
    output
        .manifest
        .as_ref()
        .and_then(|manifest| manifest.get(path))
        .map(String::as_str)
        .unwrap_or_else(|| panic!("`{path}` is not in the manifest"))
}

pub fn text<'a>(output: &'a BuildOutput, path: &str) -> &'a str {
    output
        .text(path)
        .unwrap_or_else(|| panic!("no text file at `{path}`: {:?}", output.files.keys()))
}
