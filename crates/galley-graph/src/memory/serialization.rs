//! Debug dumps of the graph.

use serde::Serialize;

use super::graph::UrlGraph;
use crate::reference::{ReferenceId, ReferenceKind};
use crate::url_info::CookStatus;
use crate::url_type::UrlType;
use crate::Result;

/// Helper to escape labels for DOT format.
fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Serialize)]
struct EdgeJson<'a> {
    id: ReferenceId,
    kind: ReferenceKind,
    specifier: &'a str,
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_specifier: Option<&'a str>,
    weak: bool,
    implicit: bool,
}

#[derive(Serialize)]
struct NodeJson<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    url_type: Option<UrlType>,
    status: CookStatus,
    entry_point: bool,
    inline: bool,
    used: bool,
    dependencies: Vec<EdgeJson<'a>>,
}

#[derive(Serialize)]
struct GraphJson<'a> {
    root: &'a str,
    nodes: Vec<NodeJson<'a>>,
}

impl UrlGraph {
    /// Adjacency view as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        let inner = self.inner.read();
        let nodes = inner
            .nodes
            .values()
            .map(|node| NodeJson {
                url: &node.url,
                url_type: node.url_type,
                status: node.status(),
                entry_point: node.is_entry_point,
                inline: node.is_inline,
                used: inner.is_used(&node.url),
                dependencies: node
                    .references_to_others
                    .iter()
                    .filter_map(|id| inner.references.get(id))
                    .map(|r| EdgeJson {
                        id: r.id,
                        kind: r.kind,
                        specifier: &r.specifier,
                        url: r.url(),
                        generated_specifier: r.generated_specifier.as_deref(),
                        weak: r.is_weak,
                        implicit: r.is_implicit,
                    })
                    .collect(),
            })
            .collect();

        let graph = GraphJson {
            root: &inner.root_url,
            nodes,
        };
        Ok(serde_json::to_string_pretty(&graph)?)
    }

    /// Graph in DOT format; weak and implicit edges are dashed.
    pub fn to_dot(&self) -> String {
        let inner = self.inner.read();
        let mut output = String::from("digraph UrlGraph {\n");

        for node in inner.nodes.values() {
            output.push_str("    \"");
            output.push_str(&escape_label(&node.url));
            output.push('"');
            if node.is_entry_point {
                output.push_str(" [shape=box]");
            }
            output.push_str(";\n");
        }

        for node in inner.nodes.values() {
            for reference in node
                .references_to_others
                .iter()
                .filter_map(|id| inner.references.get(id))
            {
                let Some(target) = reference.url() else {
                    continue;
                };
                output.push_str("    \"");
                output.push_str(&escape_label(&node.url));
                output.push_str("\" -> \"");
                output.push_str(&escape_label(target));
                output.push_str("\" [label=\"");
                output.push_str(reference.kind.as_str());
                output.push('"');
                if !reference.is_strong() {
                    output.push_str(", style=dashed");
                }
                output.push_str("];\n");
            }
        }

        output.push_str("}\n");
        output
    }
}
