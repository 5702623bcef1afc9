use crate::{ReferenceId, ReferenceKind, ReferenceParams, UrlGraph};

mod graph_tests;
mod property_tests;

pub(crate) const ROOT: &str = "file:///project/";

pub(crate) fn url(path: &str) -> String {
    format!("{ROOT}{path}")
}

/// Create, resolve and attach a reference from `owner` to `target`.
pub(crate) fn link(
    graph: &UrlGraph,
    owner: &str,
    kind: ReferenceKind,
    target: &str,
) -> ReferenceId {
    link_with(graph, ReferenceParams::new(owner, kind, target), target)
}

pub(crate) fn link_with(graph: &UrlGraph, params: ReferenceParams, target: &str) -> ReferenceId {
    let id = graph.create_reference(params).unwrap();
    graph.resolve_reference(id, target).unwrap();
    graph.reuse_or_create_url_info(id).unwrap();
    graph.add_reference(id).unwrap();
    id
}

/// root -> a.html -> b.css -> c.png
pub(crate) fn html_css_png() -> (UrlGraph, [ReferenceId; 3]) {
    let graph = UrlGraph::new(ROOT);
    let a = link(&graph, ROOT, ReferenceKind::EntryPoint, &url("a.html"));
    let b = link(&graph, &url("a.html"), ReferenceKind::LinkHref, &url("b.css"));
    let c = link(&graph, &url("b.css"), ReferenceKind::CssUrl, &url("c.png"));
    (graph, [a, b, c])
}
