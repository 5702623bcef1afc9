//! Layered configuration loading.
//!
//! Priority: programmatic overrides > environment variables > `galley.toml` > defaults.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::Serialize;

use crate::config::GalleyConfig;
use crate::error::{ConfigError, Result};

pub const CONFIG_FILE_NAME: &str = "galley.toml";
pub const ENV_PREFIX: &str = "GALLEY_";

/// Builds a [`GalleyConfig`] from defaults, an optional TOML file, the
/// environment and programmatic overrides.
///
/// # Example
///
/// ```no_run
/// use galley_config::ConfigLoader;
///
/// let config = ConfigLoader::new(".").load().unwrap();
/// println!("building into {}", config.build.build_directory.display());
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    root: PathBuf,
    file: Option<PathBuf>,
    overrides: Figment,
}

impl ConfigLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            file: None,
            overrides: Figment::new(),
        }
    }

    /// Use an explicit config file instead of `<root>/galley.toml`.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Merge programmatic overrides on top of every other source.
    pub fn with_overrides<T: Serialize>(mut self, overrides: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(overrides));
        self
    }

    fn config_file(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.file {
            return Some(explicit.clone());
        }
        let default_path = self.root.join(CONFIG_FILE_NAME);
        default_path.exists().then_some(default_path)
    }

    pub fn load(self) -> Result<GalleyConfig> {
        if !self.root.exists() {
            return Err(ConfigError::RootNotFound(self.root));
        }

        let defaults = GalleyConfig {
            root_directory: self.root.clone(),
            ..GalleyConfig::default()
        };
        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        if let Some(path) = self.config_file() {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }

        // GALLEY_BUILD__VERSIONING=false -> build.versioning
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        figment = figment.merge(self.overrides);

        let config: GalleyConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}
