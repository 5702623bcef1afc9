//! Development session configuration types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevOptions {
    /// Window during which file events are coalesced into one propagation pass.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_hot_reload")]
    pub hot_reload: bool,

    #[serde(default = "default_client_channel_capacity")]
    pub client_channel_capacity: usize,
}

impl Default for DevOptions {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            hot_reload: default_hot_reload(),
            client_channel_capacity: default_client_channel_capacity(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_hot_reload() -> bool {
    true
}

fn default_client_channel_capacity() -> usize {
    100
}
