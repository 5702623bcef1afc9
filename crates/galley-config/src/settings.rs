//! Settings that apply to the whole process rather than one session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalSettings {
    /// `silent`, `error`, `warn`, `info` or `debug`. Unset defers to
    /// `RUST_LOG`.
    #[serde(default)]
    pub log_level: Option<String>,
}
