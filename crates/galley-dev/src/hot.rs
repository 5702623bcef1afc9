//! Hot-update propagation.
//!
//! From a changed node, walk up the incoming references until every branch
//! reaches a node that absorbs the change (a boundary) or a node that
//! refuses it. One refusal anywhere turns the whole pass into a full reload.
//!
//! ```text
//!   a.html ──link_href──▶ b.css ──css_url──▶ c.png   (modified)
//!     │                    ▲
//!     └ accepts css deps   └ boundary, accepted by a.html
//! ```
//!
//! Html nodes accept their css dependencies unless they decline; everything
//! else comes from [`HotDeclaration`]s.
//!
//! [`HotDeclaration`]: galley_graph::HotDeclaration

use std::collections::BTreeSet;

use galley_graph::{ReferenceKind, UrlGraph, UrlInfo, UrlType};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Re-execute `boundary`.
    Update,
    /// `boundary` is no longer referenced; drop it.
    Prune,
}

/// What a client applies for one boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HotInstruction {
    pub kind: InstructionKind,
    pub url_type: Option<UrlType>,
    pub boundary: String,
    pub accepted_by: String,
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadDecision {
    Full {
        reason: String,
        cause: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        declined_by: Option<String>,
    },
    Hot {
        cause: String,
        instructions: Vec<HotInstruction>,
    },
}

impl ReloadDecision {
    pub fn is_full(&self) -> bool {
        matches!(self, ReloadDecision::Full { .. })
    }

    pub fn cause(&self) -> &str {
        match self {
            ReloadDecision::Full { cause, .. } | ReloadDecision::Hot { cause, .. } => cause,
        }
    }

    /// The same change as a full reload.
    pub fn into_full(self, reason: impl Into<String>) -> Self {
        match self {
            ReloadDecision::Hot { cause, .. } => ReloadDecision::Full {
                reason: reason.into(),
                cause,
                declined_by: None,
            },
            full => full,
        }
    }
}

pub(crate) const NO_BOUNDARY: &str = "no boundary found";

#[derive(Debug, Clone)]
enum Branch {
    /// `(boundary, accepted_by)` pairs.
    Accepted(Vec<(String, String)>),
    Declined {
        reason: String,
        declined_by: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct Refusal {
    reason: String,
    cause: String,
    declined_by: Option<String>,
}

/// One propagation pass over any number of changes.
///
/// Memoization lives in the pass; a new pass starts from scratch.
pub struct Propagation<'g> {
    graph: &'g UrlGraph,
    root_url: String,
    memo: FxHashMap<String, Branch>,
    visiting: FxHashSet<String>,
    instructions: BTreeSet<HotInstruction>,
    causes: Vec<String>,
    refusal: Option<Refusal>,
}

fn accepts(owner: &UrlInfo, dependency: &UrlInfo) -> bool {
    if owner.hot.accepts(&dependency.url) {
        return true;
    }
    owner.url_type == Some(UrlType::Html)
        && dependency.url_type == Some(UrlType::Css)
        && !owner.hot.decline
}

impl<'g> Propagation<'g> {
    pub fn new(graph: &'g UrlGraph) -> Self {
        Self {
            graph,
            root_url: graph.root_url(),
            memo: FxHashMap::default(),
            visiting: FxHashSet::default(),
            instructions: BTreeSet::new(),
            causes: Vec::new(),
            refusal: None,
        }
    }

    fn display<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.root_url.as_str()).unwrap_or(url)
    }

    /// The content of `url` changed.
    pub fn modified(&mut self, url: &str) {
        let cause = format!("{} modified", self.display(url));
        self.changed(url, cause);
    }

    /// The file behind `url` is gone.
    pub fn removed(&mut self, url: &str) {
        let cause = format!("{} removed", self.display(url));
        self.changed(url, cause);
    }

    /// `url` lost its last strong reference, which `owner` held.
    pub fn pruned(&mut self, url: &str, owner: Option<&str>) {
        let cause = format!("{} no longer referenced", self.display(url));
        let Some(info) = self.graph.url_info(url) else {
            return;
        };
        let accepted_by = if info.hot.accept_self {
            Some(url.to_string())
        } else {
            owner
                .and_then(|owner| self.graph.url_info(owner))
                .filter(|owner| accepts(owner, &info))
                .map(|owner| owner.url)
        };
        match accepted_by {
            Some(accepted_by) => {
                self.instructions.insert(HotInstruction {
                    kind: InstructionKind::Prune,
                    url_type: info.url_type,
                    boundary: url.to_string(),
                    accepted_by,
                });
                self.causes.push(cause);
            }
            None => self.refuse(NO_BOUNDARY.to_string(), cause, None),
        }
    }

    fn changed(&mut self, url: &str, cause: String) {
        match self.visit(url) {
            Branch::Accepted(boundaries) => {
                for (boundary, accepted_by) in boundaries {
                    let url_type = self.graph.url_info(&boundary).and_then(|info| info.url_type);
                    self.instructions.insert(HotInstruction {
                        kind: InstructionKind::Update,
                        url_type,
                        boundary,
                        accepted_by,
                    });
                }
                self.causes.push(cause);
            }
            Branch::Declined {
                reason,
                declined_by,
            } => self.refuse(reason, cause, declined_by),
        }
    }

    fn refuse(&mut self, reason: String, cause: String, declined_by: Option<String>) {
        if self.refusal.is_none() {
            self.refusal = Some(Refusal {
                reason,
                cause,
                declined_by,
            });
        }
    }

    fn visit(&mut self, url: &str) -> Branch {
        if let Some(branch) = self.memo.get(url) {
            return branch.clone();
        }
        if !self.visiting.insert(url.to_string()) {
            return Branch::Accepted(Vec::new());
        }
        let branch = self.search(url);
        self.visiting.remove(url);
        self.memo.insert(url.to_string(), branch.clone());
        branch
    }

    fn search(&mut self, url: &str) -> Branch {
        let Some(info) = self.graph.url_info(url) else {
            return Branch::Declined {
                reason: format!("{} is not in the graph", self.display(url)),
                declined_by: None,
            };
        };
        if info.hot.accept_self {
            return Branch::Accepted(vec![(url.to_string(), url.to_string())]);
        }
        if info.hot.decline {
            return Branch::Declined {
                reason: "declined".to_string(),
                declined_by: Some(url.to_string()),
            };
        }
        let incoming = match self.graph.references_from_others(url) {
            Ok(incoming) => incoming,
            Err(err) => {
                return Branch::Declined {
                    reason: err.to_string(),
                    declined_by: None,
                };
            }
        };

        let mut owners: Vec<String> = Vec::new();
        let mut variants_of: Vec<String> = Vec::new();
        for reference in incoming {
            if reference.is_implicit {
                continue;
            }
            if reference.kind == ReferenceKind::SearchParamVariant {
                if !variants_of.contains(&reference.owner) {
                    variants_of.push(reference.owner);
                }
                continue;
            }
            if reference.is_strong() && !owners.contains(&reference.owner) {
                owners.push(reference.owner);
            }
        }

        if owners.is_empty() && variants_of.is_empty() && self.only_requested(&info) {
            return Branch::Declined {
                reason: "only reached through a request".to_string(),
                declined_by: Some(url.to_string()),
            };
        }

        let mut boundaries: Vec<(String, String)> = Vec::new();
        for variant in variants_of {
            match self.visit(&variant) {
                Branch::Accepted(found) => boundaries.extend(found),
                declined => return declined,
            }
        }
        for owner in owners {
            if owner == self.root_url {
                continue;
            }
            let Some(owner_info) = self.graph.url_info(&owner) else {
                continue;
            };
            if accepts(&owner_info, &info) {
                boundaries.push((url.to_string(), owner));
                continue;
            }
            if owner_info.hot.decline {
                return Branch::Declined {
                    reason: "declined".to_string(),
                    declined_by: Some(owner),
                };
            }
            match self.visit(&owner) {
                Branch::Accepted(found) => boundaries.extend(found),
                declined => return declined,
            }
        }

        if boundaries.is_empty() {
            return Branch::Declined {
                reason: NO_BOUNDARY.to_string(),
                declined_by: None,
            };
        }
        boundaries.sort();
        boundaries.dedup();
        Branch::Accepted(boundaries)
    }

    fn only_requested(&self, info: &UrlInfo) -> bool {
        info.last_reference
            .and_then(|id| self.graph.reference(id))
            .is_some_and(|reference| reference.kind == ReferenceKind::HttpRequest)
    }

    /// Urls between the changes and their boundaries, boundaries excluded.
    fn paths_to_boundaries(&self) -> Vec<String> {
        let boundaries: FxHashSet<&str> = self
            .instructions
            .iter()
            .map(|instruction| instruction.boundary.as_str())
            .collect();
        let mut urls: Vec<String> = self
            .memo
            .iter()
            .filter(|(url, branch)| {
                matches!(branch, Branch::Accepted(found) if !found.is_empty())
                    && !boundaries.contains(url.as_str())
            })
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// One decision for every change of the pass; a full reload suppresses
    /// hot instructions. `None` when nothing was recorded.
    ///
    /// Nodes on the way to an accepted boundary get `descendant_modified_at`.
    pub fn finish(self) -> Result<Option<ReloadDecision>> {
        if let Some(refusal) = self.refusal {
            tracing::debug!(
                reason = %refusal.reason,
                cause = %refusal.cause,
                "full reload"
            );
            return Ok(Some(ReloadDecision::Full {
                reason: refusal.reason,
                cause: refusal.cause,
                declined_by: refusal.declined_by,
            }));
        }
        if self.instructions.is_empty() {
            return Ok(None);
        }

        let on_path = self.paths_to_boundaries();
        if !on_path.is_empty() {
            let timestamp = self.graph.tick();
            self.graph
                .mark_descendant_modified(on_path.iter().map(String::as_str), timestamp)?;
        }
        let instructions: Vec<HotInstruction> = self.instructions.into_iter().collect();
        tracing::debug!(instructions = instructions.len(), "hot update");
        Ok(Some(ReloadDecision::Hot {
            cause: self.causes.join(", "),
            instructions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_decisions_become_full() {
        let decision = ReloadDecision::Hot {
            cause: "a.js modified".to_string(),
            instructions: Vec::new(),
        };
        let full = decision.into_full("hot reload disabled");
        assert!(full.is_full());
        assert_eq!(full.cause(), "a.js modified");
    }

    #[test]
    fn decisions_serialize_with_a_type_tag() {
        let decision = ReloadDecision::Hot {
            cause: "c.png modified".to_string(),
            instructions: vec![HotInstruction {
                kind: InstructionKind::Update,
                url_type: Some(UrlType::Css),
                boundary: "file:///project/b.css".to_string(),
                accepted_by: "file:///project/a.html".to_string(),
            }],
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["type"], "hot");
        assert_eq!(json["instructions"][0]["kind"], "update");
        assert_eq!(json["instructions"][0]["url_type"], "css");
    }
}
