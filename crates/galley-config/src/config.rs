//! Top-level configuration structure.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build::BuildOptions;
use crate::dev::DevOptions;
use crate::error::{ConfigError, Result};
use crate::kitchen::KitchenOptions;
use crate::settings::GlobalSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GalleyConfig {
    /// Project root; its `file://` url becomes the graph root.
    #[serde(default = "default_root_directory")]
    pub root_directory: PathBuf,

    #[serde(default)]
    pub kitchen: KitchenOptions,

    #[serde(default)]
    pub build: BuildOptions,

    #[serde(default)]
    pub dev: DevOptions,

    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Default for GalleyConfig {
    fn default() -> Self {
        Self {
            root_directory: default_root_directory(),
            kitchen: KitchenOptions::default(),
            build: BuildOptions::default(),
            dev: DevOptions::default(),
            settings: GlobalSettings::default(),
        }
    }
}

fn default_root_directory() -> PathBuf {
    PathBuf::from(".")
}

impl GalleyConfig {
    /// Create from serde_json::Value (for programmatic config).
    ///
    /// # Example
    ///
    /// ```
    /// use galley_config::GalleyConfig;
    /// use serde_json::json;
    ///
    /// let config = GalleyConfig::from_value(json!({
    ///     "build": { "versioning": false }
    /// }))
    /// .unwrap();
    /// assert!(!config.build.versioning);
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        let config: GalleyConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
                field: "config".to_string(),
                hint: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: e.to_string(),
        })
    }

    /// Schema-level validation (no filesystem checks).
    pub fn validate(&self) -> Result<()> {
        if self.kitchen.supported_protocols.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "kitchen.supported_protocols".to_string(),
                hint: "at least one protocol is required".to_string(),
            });
        }
        if let Some(bad) = self
            .kitchen
            .supported_protocols
            .iter()
            .find(|p| !p.ends_with(':'))
        {
            return Err(ConfigError::InvalidValue {
                field: "kitchen.supported_protocols".to_string(),
                hint: format!("`{bad}` must end with ':' (e.g. `file:`)"),
            });
        }

        self.kitchen.ignore_patterns()?;

        if !(4..=64).contains(&self.build.version_length) {
            return Err(ConfigError::InvalidValue {
                field: "build.version_length".to_string(),
                hint: format!("{} is outside 4..=64", self.build.version_length),
            });
        }

        if !self.build.base.starts_with('/') || !self.build.base.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "build.base".to_string(),
                hint: format!("`{}` must start and end with '/'", self.build.base),
            });
        }

        if let Some(dir) = self.build.directories.values().find(|d| !d.ends_with('/')) {
            return Err(ConfigError::InvalidValue {
                field: "build.directories".to_string(),
                hint: format!("`{dir}` must end with '/'"),
            });
        }

        Ok(())
    }
}
