//! Traversal methods for UrlGraph.

use std::collections::VecDeque;

use rustc_hash::FxHashSet as HashSet;

use super::graph::{GraphInner, UrlGraph};
use crate::url_info::UrlInfo;
use crate::Result;

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

impl GraphInner {
    fn neighbours(&self, url: &str, direction: Direction, strong_only: bool) -> Vec<&str> {
        let Some(node) = self.nodes.get(url) else {
            return Vec::new();
        };
        let ids = match direction {
            Direction::Up => &node.references_from_others,
            Direction::Down => &node.references_to_others,
        };
        ids.iter()
            .filter_map(|id| self.references.get(id))
            .filter(|r| !strong_only || r.is_strong())
            .filter_map(|r| match direction {
                Direction::Up => Some(r.owner.as_str()),
                Direction::Down => r.url(),
            })
            .collect()
    }

    fn breadth_first(
        &self,
        start: &str,
        direction: Direction,
        strong_only: bool,
        mut visit: impl FnMut(&UrlInfo) -> bool,
    ) -> Option<String> {
        let mut visited: HashSet<&str> = HashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let (start, _) = self.nodes.get_key_value(start)?;
        visited.insert(start.as_str());
        queue.extend(self.neighbours(start, direction, strong_only));

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if visit(node) {
                return Some(current.to_string());
            }
            queue.extend(self.neighbours(current, direction, strong_only));
        }
        None
    }
}

impl UrlGraph {
    /// Nearest node referencing `url` (directly or not) matching `predicate`.
    pub fn find_dependent(
        &self,
        url: &str,
        predicate: impl Fn(&UrlInfo) -> bool,
    ) -> Option<String> {
        self.inner
            .read()
            .breadth_first(url, Direction::Up, false, predicate)
    }

    /// Nearest node referenced by `url` (directly or not) matching `predicate`.
    pub fn find_dependency(
        &self,
        url: &str,
        predicate: impl Fn(&UrlInfo) -> bool,
    ) -> Option<String> {
        self.inner
            .read()
            .breadth_first(url, Direction::Down, false, predicate)
    }

    /// Every url reachable from `url` through strong references, breadth-first.
    pub fn strong_dependencies(&self, url: &str) -> Result<Vec<String>> {
        let inner = self.inner.read();
        inner.node(url)?;
        let mut found = Vec::new();
        inner.breadth_first(url, Direction::Down, true, |node| {
            found.push(node.url.clone());
            false
        });
        Ok(found)
    }

    /// Urls reachable from the root through strong references, depth-first
    /// pre-order (owners before the nodes they reference).
    pub fn reachable_from_root(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut visited: HashSet<&str> = HashSet::default();
        let mut order = Vec::new();
        let mut stack: Vec<&str> = vec![inner.root_url.as_str()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if current != inner.root_url {
                order.push(current.to_string());
            }
            let mut next = inner.neighbours(current, Direction::Down, true);
            next.reverse();
            stack.extend(next.into_iter().filter(|url| !visited.contains(url)));
        }
        order
    }

    /// Returns true if `from` references `to` directly or transitively.
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        self.inner
            .read()
            .breadth_first(from, Direction::Down, false, |node| node.url == to)
            .is_some()
    }
}
