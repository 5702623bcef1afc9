use std::sync::{Arc, Mutex};

use super::{ROOT, html_css_png, link, link_with, url};
use crate::{
    GraphError, GraphEvent, InlineContent, ReferenceKind, ReferenceParams, UrlGraph, UrlType,
};

#[test]
fn new_graph_has_only_root() {
    let graph = UrlGraph::new(ROOT);
    assert_eq!(graph.len(), 1);
    assert!(graph.is_empty());
    assert_eq!(graph.url_info(ROOT).unwrap().url_type, Some(UrlType::Root));
    assert!(graph.is_used(ROOT).unwrap());
}

#[test]
fn create_reference_requires_known_owner() {
    let graph = UrlGraph::new(ROOT);
    let err = graph
        .create_reference(ReferenceParams::new(
            "file:///nope.html",
            ReferenceKind::ScriptSrc,
            "./a.js",
        ))
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownUrl(_)));
}

#[test]
fn reference_ids_increase() {
    let graph = UrlGraph::new(ROOT);
    let a = graph
        .create_reference(ReferenceParams::new(ROOT, ReferenceKind::EntryPoint, "a"))
        .unwrap();
    let b = graph
        .create_reference(ReferenceParams::new(ROOT, ReferenceKind::EntryPoint, "b"))
        .unwrap();
    assert!(b > a);
}

#[test]
fn add_reference_registers_both_sides() {
    let (graph, [_, b, _]) = html_css_png();
    let html = graph.url_info(&url("a.html")).unwrap();
    let css = graph.url_info(&url("b.css")).unwrap();
    assert!(html.references_to_others().any(|id| id == b));
    assert!(css.references_from_others().any(|id| id == b));
    assert_eq!(graph.dependencies(&url("a.html")).unwrap(), vec![url("b.css")]);
    assert_eq!(graph.dependents(&url("b.css")).unwrap(), vec![url("a.html")]);
}

#[test]
fn entry_points_are_tracked() {
    let (graph, _) = html_css_png();
    assert_eq!(graph.entry_points(), vec![url("a.html")]);
    let css = graph.url_info(&url("b.css")).unwrap();
    assert_eq!(css.entry_url.as_deref(), Some(url("a.html").as_str()));
}

#[test]
fn abstract_references_are_not_attached() {
    let graph = UrlGraph::new(ROOT);
    let request = link(&graph, ROOT, ReferenceKind::HttpRequest, &url("x.js"));
    let node = graph.url_info(&url("x.js")).unwrap();
    assert_eq!(node.last_reference, Some(request));
    assert_eq!(node.references_from_others().count(), 0);
    assert!(!graph.is_used(&url("x.js")).unwrap());
}

#[test]
fn finalized_owner_rejects_strong_references() {
    let (graph, _) = html_css_png();
    graph
        .update_url_info(&url("b.css"), |info| info.content_finalized = true)
        .unwrap();

    let late = graph
        .create_reference(ReferenceParams::new(
            url("b.css"),
            ReferenceKind::CssUrl,
            "./d.png",
        ))
        .unwrap();
    graph.resolve_reference(late, url("d.png")).unwrap();
    graph.reuse_or_create_url_info(late).unwrap();
    let err = graph.add_reference(late).unwrap_err();
    assert!(matches!(err, GraphError::ContentFinalized { .. }));

    // weak references stay free
    let hint = graph
        .create_reference(ReferenceParams::new(
            url("b.css"),
            ReferenceKind::ResourceHint,
            "./d.png",
        ))
        .unwrap();
    graph.resolve_reference(hint, url("d.png")).unwrap();
    graph.reuse_or_create_url_info(hint).unwrap();
    graph.add_reference(hint).unwrap();
    assert!(graph.remove_reference(hint).unwrap().is_empty());
}

#[test]
fn finalized_owner_rejects_strong_removal() {
    let (graph, [_, _, c]) = html_css_png();
    graph
        .update_url_info(&url("b.css"), |info| info.content_finalized = true)
        .unwrap();
    assert!(matches!(
        graph.remove_reference(c),
        Err(GraphError::ContentFinalized { .. })
    ));
}

#[test]
fn removing_last_strong_link_dereferences_once() {
    let (graph, [_, _, c]) = html_css_png();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    graph.on_event(move |event| sink.lock().unwrap().push(event.clone()));

    let dereferenced = graph.remove_reference(c).unwrap();
    assert_eq!(dereferenced, vec![url("c.png")]);
    assert!(!graph.is_used(&url("c.png")).unwrap());

    // second identical removal is a no-op
    assert!(graph.remove_reference(c).unwrap().is_empty());

    let events = events.lock().unwrap();
    let count = events
        .iter()
        .filter(|e| matches!(e, GraphEvent::Dereferenced { url: u, .. } if *u == url("c.png")))
        .count();
    assert_eq!(count, 1);
}

#[test]
fn removal_cascades_to_descendants() {
    let (graph, [_, b, _]) = html_css_png();
    let dereferenced = graph.remove_reference(b).unwrap();
    assert_eq!(dereferenced, vec![url("b.css"), url("c.png")]);
    // nodes stay in the graph
    assert!(graph.contains(&url("c.png")));
}

#[test]
fn removal_keeps_target_alive_through_other_owner() {
    let (graph, [_, _, c]) = html_css_png();
    link(&graph, &url("a.html"), ReferenceKind::HtmlAsset, &url("c.png"));
    assert!(graph.remove_reference(c).unwrap().is_empty());
    assert!(graph.is_used(&url("c.png")).unwrap());
}

#[test]
fn implicit_references_do_not_keep_alive_but_are_removed_together() {
    let graph = UrlGraph::new(ROOT);
    link(&graph, ROOT, ReferenceKind::EntryPoint, &url("main.js"));
    let import = link(
        &graph,
        &url("main.js"),
        ReferenceKind::JsImport,
        &url("node_modules/pkg/index.js"),
    );
    let manifest = link(
        &graph,
        &url("main.js"),
        ReferenceKind::PackageManifest,
        &url("node_modules/pkg/package.json"),
    );
    graph.add_implicit_reference(import, manifest).unwrap();

    assert!(!graph.is_used(&url("node_modules/pkg/package.json")).unwrap());
    assert_eq!(
        graph
            .urls_with_implicit_reference_to(&url("node_modules/pkg/package.json"))
            .unwrap(),
        vec![url("main.js")]
    );

    graph.remove_reference(import).unwrap();
    assert!(
        graph
            .references_from_others(&url("node_modules/pkg/package.json"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn redirect_never_mutates_original() {
    let graph = UrlGraph::new(ROOT);
    link(&graph, ROOT, ReferenceKind::EntryPoint, &url("main.js"));
    let first = graph
        .create_reference(ReferenceParams::new(
            url("main.js"),
            ReferenceKind::JsImport,
            "./util",
        ))
        .unwrap();
    graph.resolve_reference(first, url("util")).unwrap();
    let second = graph.redirect_reference(first, url("util.js")).unwrap();
    let third = graph.redirect_reference(first, url("util.ts")).unwrap();

    assert_eq!(graph.reference(first).unwrap().url(), Some(url("util").as_str()));
    assert_eq!(graph.reference(second).unwrap().prev, Some(first));
    assert_eq!(graph.reference(third).unwrap().prev, Some(second));
    assert_eq!(graph.reference(third).unwrap().original, Some(first));
    assert_eq!(graph.latest_reference(first).unwrap(), third);
    assert!(graph.reference(third).unwrap().next.is_none());
}

#[test]
fn redirect_detaches_attached_reference() {
    let (graph, [_, b, _]) = html_css_png();
    let redirected = graph.redirect_reference(b, url("b.min.css")).unwrap();
    assert!(graph.references_from_others(&url("b.css")).unwrap().is_empty());

    graph.reuse_or_create_url_info(redirected).unwrap();
    graph.add_reference(redirected).unwrap();
    assert!(graph.is_used(&url("b.min.css")).unwrap());
}

#[test]
fn resolve_is_write_once() {
    let graph = UrlGraph::new(ROOT);
    let id = graph
        .create_reference(ReferenceParams::new(ROOT, ReferenceKind::EntryPoint, "a"))
        .unwrap();
    graph.resolve_reference(id, url("a.html")).unwrap();
    assert!(matches!(
        graph.resolve_reference(id, url("b.html")),
        Err(GraphError::UrlAlreadyResolved { .. })
    ));
}

#[test]
fn inline_references_create_inline_nodes() {
    let (graph, _) = html_css_png();
    let inline_url = format!("{}@L3C5.js", url("a.html"));
    link_with(
        &graph,
        ReferenceParams::new(url("a.html"), ReferenceKind::ScriptInline, inline_url.clone())
            .inline(InlineContent::new("console.log(1)", UrlType::JsModule)),
        &inline_url,
    );
    let node = graph.url_info(&inline_url).unwrap();
    assert!(node.is_inline);
    assert_eq!(node.inline_parent.as_deref(), Some(url("a.html").as_str()));
    assert_eq!(node.url_type, Some(UrlType::JsModule));
}

#[test]
fn search_param_variant_links_to_base() {
    let graph = UrlGraph::new(ROOT);
    link(&graph, ROOT, ReferenceKind::EntryPoint, &url("main.js"));
    let variant = url("util.js?v=1");
    link(&graph, &url("main.js"), ReferenceKind::JsImport, &variant);

    let node = graph.url_info(&variant).unwrap();
    assert_eq!(node.original_url.as_deref(), Some(url("util.js").as_str()));
    assert_eq!(
        graph.search_param_variants(&url("util.js")).unwrap(),
        vec![variant]
    );
    // the base is only weakly referenced
    assert!(!graph.is_used(&url("util.js")).unwrap());
    assert!(graph.is_weak_only(&url("util.js")).unwrap());
}

#[test]
fn first_strong_reference_provides_metadata() {
    let graph = UrlGraph::new(ROOT);
    link(&graph, ROOT, ReferenceKind::EntryPoint, &url("a.html"));
    link_with(
        &graph,
        ReferenceParams::new(url("a.html"), ReferenceKind::ResourceHint, "./x.js")
            .filename_hint("from-hint.js"),
        &url("x.js"),
    );
    link_with(
        &graph,
        ReferenceParams::new(url("a.html"), ReferenceKind::ScriptSrc, "./x.js")
            .filename_hint("first.js"),
        &url("x.js"),
    );
    link_with(
        &graph,
        ReferenceParams::new(url("a.html"), ReferenceKind::ScriptSrc, "./x.js")
            .filename_hint("second.js"),
        &url("x.js"),
    );
    let node = graph.url_info(&url("x.js")).unwrap();
    assert_eq!(node.filename_hint.as_deref(), Some("first.js"));
}

#[test]
fn mark_modified_uses_logical_clock() {
    let (graph, _) = html_css_png();
    let first = graph.mark_modified(&url("c.png")).unwrap();
    let second = graph.mark_modified(&url("b.css")).unwrap();
    assert!(second > first);
    assert_eq!(graph.url_info(&url("c.png")).unwrap().modified_at, first);
}

#[test]
fn first_project_reference_skips_inline_owners() {
    let (graph, [_, b, _]) = html_css_png();
    let inline_url = format!("{}@L1C1.css", url("a.html"));
    let inline = link_with(
        &graph,
        ReferenceParams::new(url("a.html"), ReferenceKind::StyleInline, inline_url.clone())
            .inline(InlineContent::new("body{}", UrlType::Css)),
        &inline_url,
    );
    let nested = link(&graph, &inline_url, ReferenceKind::CssUrl, &url("bg.png"));

    let found = graph.first_project_reference(nested).unwrap();
    assert_eq!(found.id, inline);
    assert_eq!(graph.first_project_reference(b).unwrap().id, b);
}

#[test]
fn dumps_json_and_dot() {
    let (graph, _) = html_css_png();
    let json: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
    assert_eq!(json["root"], ROOT);
    assert_eq!(json["nodes"].as_array().unwrap().len(), 4);

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph UrlGraph {"));
    assert!(dot.contains(&format!("\"{}\" -> \"{}\"", url("a.html"), url("b.css"))));
}

#[tokio::test]
async fn concurrent_readers_share_graph() {
    let (graph, _) = html_css_png();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let graph = graph.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    assert!(graph.is_used(&url("c.png")).unwrap());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
}
