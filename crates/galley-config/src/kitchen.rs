//! Options consumed by the kitchen (resolution, fetch and cook pipeline).

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KitchenOptions {
    /// Url protocols the dev server is allowed to serve (`file:`, `http:`...).
    #[serde(default = "default_supported_protocols")]
    pub supported_protocols: Vec<String>,

    /// Regex patterns; matching urls are kept in the graph as `ignore:` urls.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Package names whose resolutions are ignored instead of fetched.
    #[serde(default)]
    pub excluded_packages: Vec<String>,

    /// Log (instead of propagate) errors raised while cooking inline content in dev.
    #[serde(default = "default_contain_inline_errors")]
    pub contain_inline_errors: bool,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for KitchenOptions {
    fn default() -> Self {
        Self {
            supported_protocols: default_supported_protocols(),
            ignore: Vec::new(),
            excluded_packages: Vec::new(),
            contain_inline_errors: default_contain_inline_errors(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl KitchenOptions {
    /// Compile the ignore patterns.
    pub fn ignore_patterns(&self) -> Result<Vec<Regex>> {
        self.ignore
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidIgnorePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.supported_protocols.iter().any(|p| p == protocol)
    }
}

fn default_supported_protocols() -> Vec<String> {
    ["file:", "data:", "http:", "https:"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_contain_inline_errors() -> bool {
    true
}

fn default_max_redirects() -> usize {
    20
}
