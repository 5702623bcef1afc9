//! # galley-config
//!
//! Configuration for the galley engine: kitchen (resolution and cooking),
//! build (output layout and versioning) and dev (hot-update batching).
//!
//! Library users build a [`GalleyConfig`] directly or through
//! [`GalleyConfig::from_value`]; tools use [`ConfigLoader`] to layer
//! defaults, `galley.toml`, `GALLEY_*` environment variables and overrides.

pub mod build;
pub mod config;
pub mod dev;
pub mod error;
pub mod kitchen;
pub mod loading;
pub mod settings;

pub use build::{BuildOptions, VersioningMethod};
pub use config::GalleyConfig;
pub use dev::DevOptions;
pub use error::{ConfigError, Result};
pub use kitchen::KitchenOptions;
pub use loading::{CONFIG_FILE_NAME, ConfigLoader, ENV_PREFIX};
pub use settings::GlobalSettings;
