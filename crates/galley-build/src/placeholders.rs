//! Fixed-width tokens standing in for specifiers until versions are known.
//!
//! The shape pass writes `__galley_00000007__` where a specifier goes.
//! Hashing replaces every token with [`PLACEHOLDER_DEFAULT`], so a node's
//! content hash does not depend on the versions of what it references.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::strategy::VersioningStrategy;

const PREFIX: &str = "__galley_";
const SUFFIX: &str = "__";
const DIGITS: usize = 8;

/// Value every token takes while hashing.
pub const PLACEHOLDER_DEFAULT: &str = "__galley_00000000__";

/// What a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderTarget {
    /// Url of the referenced node in the shape graph.
    pub url: String,
    /// Unversioned build path of the target.
    pub path: String,
    pub strategy: VersioningStrategy,
}

#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    inner: Arc<RwLock<PlaceholdersInner>>,
}

#[derive(Debug, Default)]
struct PlaceholdersInner {
    next: u32,
    by_token: FxHashMap<String, PlaceholderTarget>,
    by_target: FxHashMap<(String, VersioningStrategy), String>,
}

/// Token found in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub token: &'a str,
}

/// Every well-formed token in `text`, in order.
pub fn find_tokens(text: &str) -> Vec<TokenMatch<'_>> {
    let mut found = Vec::new();
    let width = PREFIX.len() + DIGITS + SUFFIX.len();
    for (start, _) in text.match_indices(PREFIX) {
        let end = start + width;
        let Some(candidate) = text.get(start..end) else {
            continue;
        };
        let digits = &candidate.as_bytes()[PREFIX.len()..PREFIX.len() + DIGITS];
        if digits.iter().all(u8::is_ascii_digit) && candidate.ends_with(SUFFIX) {
            found.push(TokenMatch {
                start,
                end,
                token: candidate,
            });
        }
    }
    found
}

/// Replace each token for which `replace` returns text.
pub fn replace_tokens(text: &str, mut replace: impl FnMut(&str) -> Option<String>) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for found in find_tokens(text) {
        if found.start < cursor {
            continue;
        }
        if let Some(replacement) = replace(found.token) {
            output.push_str(&text[cursor..found.start]);
            output.push_str(&replacement);
            cursor = found.end;
        }
    }
    output.push_str(&text[cursor..]);
    output
}

/// `text` with every token set to [`PLACEHOLDER_DEFAULT`].
pub fn with_defaults(text: &str) -> String {
    replace_tokens(text, |_| Some(PLACEHOLDER_DEFAULT.to_string()))
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `url` under `strategy`; one token per pair.
    pub fn token_for(&self, url: &str, path: &str, strategy: VersioningStrategy) -> String {
        let key = (url.to_string(), strategy);
        if let Some(token) = self.inner.read().by_target.get(&key) {
            return token.clone();
        }
        let mut inner = self.inner.write();
        if let Some(token) = inner.by_target.get(&key) {
            return token.clone();
        }
        inner.next += 1;
        let token = format!("{PREFIX}{:0width$}{SUFFIX}", inner.next, width = DIGITS);
        inner.by_token.insert(
            token.clone(),
            PlaceholderTarget {
                url: url.to_string(),
                path: path.to_string(),
                strategy,
            },
        );
        inner.by_target.insert(key, token.clone());
        token
    }

    pub fn get(&self, token: &str) -> Option<PlaceholderTarget> {
        self.inner.read().by_token.get(token).cloned()
    }

    /// Targets of the tokens present in `text`.
    pub fn targets_in(&self, text: &str) -> Vec<PlaceholderTarget> {
        let inner = self.inner.read();
        find_tokens(text)
            .into_iter()
            .filter_map(|found| inner.by_token.get(found.token).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_fixed_width_and_shared_per_target() {
        let placeholders = Placeholders::new();
        let a = placeholders.token_for("file:///a.js", "js/a.js", VersioningStrategy::Static);
        let again = placeholders.token_for("file:///a.js", "js/a.js", VersioningStrategy::Static);
        let global = placeholders.token_for("file:///a.js", "js/a.js", VersioningStrategy::Global);
        assert_eq!(a, "__galley_00000001__");
        assert_eq!(a, again);
        assert_ne!(a, global);
        assert_eq!(a.len(), PLACEHOLDER_DEFAULT.len());
        assert_eq!(placeholders.len(), 2);
    }

    #[test]
    fn defaults_hide_token_identity() {
        let one = "import './__galley_00000001__';";
        let two = "import './__galley_00000042__';";
        assert_eq!(with_defaults(one), with_defaults(two));
        assert_eq!(with_defaults("__galley_12__ stays"), "__galley_12__ stays");
    }

    #[test]
    fn replaces_known_tokens_only() {
        let text = "a __galley_00000001__ b __galley_00000002__";
        let replaced = replace_tokens(text, |token| {
            (token == "__galley_00000002__").then(|| "/js/b.js".to_string())
        });
        assert_eq!(replaced, "a __galley_00000001__ b /js/b.js");
    }
}
