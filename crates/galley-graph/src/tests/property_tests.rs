//! Property-based tests for graph invariants.
//!
//! Run with: cargo test --features proptest --package galley-graph property_tests

#![cfg(feature = "proptest")]

use std::collections::{HashSet, VecDeque};

use proptest::prelude::*;

use super::{ROOT, link, url};
use crate::{ReferenceKind, UrlGraph};

/// Edges between up to 8 nodes; `true` marks a weak edge. Node 0 is the entry.
fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((0usize..8, 0usize..8, prop::bool::weighted(0.25)), 0..=24)
}

fn node(i: usize) -> String {
    url(&format!("n{i}.js"))
}

fn build(edges: &[(usize, usize, bool)]) -> UrlGraph {
    let graph = UrlGraph::new(ROOT);
    link(&graph, ROOT, ReferenceKind::EntryPoint, &node(0));
    for &(from, to, weak) in edges {
        if !graph.contains(&node(from)) {
            continue;
        }
        let kind = if weak {
            ReferenceKind::ResourceHint
        } else {
            ReferenceKind::JsImport
        };
        link(&graph, &node(from), kind, &node(to));
    }
    graph
}

/// Reference model: forward reachability over strong edges from node 0.
fn reachable(graph: &UrlGraph) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([node(0)]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        for reference in graph.references_to_others(&current).unwrap() {
            if reference.is_strong() {
                queue.push_back(reference.url().unwrap().to_string());
            }
        }
    }
    seen
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// is_used(N) iff a strong path connects the root to N.
    #[test]
    fn prop_is_used_matches_reachability(edges in edges_strategy()) {
        let graph = build(&edges);
        let expected = reachable(&graph);
        for url in graph.urls() {
            if url == ROOT {
                continue;
            }
            prop_assert_eq!(graph.is_used(&url).unwrap(), expected.contains(&url), "{}", url);
        }
    }

    /// Removing every strong reference of a node leaves is_used consistent,
    /// and repeating the removal changes nothing.
    #[test]
    fn prop_removal_is_idempotent(edges in edges_strategy(), victim in 0usize..8) {
        let graph = build(&edges);
        prop_assume!(graph.contains(&node(victim)));
        let incoming = graph.references_from_others(&node(victim)).unwrap();
        for reference in &incoming {
            graph.remove_reference(reference.id).unwrap();
        }
        let expected = reachable(&graph);
        for url in graph.urls() {
            if url != ROOT {
                prop_assert_eq!(graph.is_used(&url).unwrap(), expected.contains(&url));
            }
        }
        for reference in &incoming {
            prop_assert!(graph.remove_reference(reference.id).unwrap().is_empty());
        }
    }

    /// Redirect chains are acyclic and end at a reference without `next`.
    #[test]
    fn prop_redirect_chain_terminates(hops in 1usize..6) {
        let graph = UrlGraph::new(ROOT);
        let first = graph
            .create_reference(crate::ReferenceParams::new(ROOT, ReferenceKind::EntryPoint, "x"))
            .unwrap();
        graph.resolve_reference(first, node(0)).unwrap();
        for hop in 1..=hops {
            graph.redirect_reference(first, node(hop)).unwrap();
        }
        let mut seen = HashSet::new();
        let mut current = graph.reference(first).unwrap();
        while let Some(next) = current.next {
            prop_assert!(seen.insert(next));
            current = graph.reference(next).unwrap();
        }
        prop_assert_eq!(seen.len(), hops);
        prop_assert_eq!(current.url(), Some(node(hops).as_str()));
        prop_assert_eq!(graph.reference(first).unwrap().url(), Some(node(0).as_str()));
    }
}
