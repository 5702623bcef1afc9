//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("invalid config value for `{field}`: {hint}")]
    InvalidValue { field: String, hint: String },

    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown url type `{0}`")]
    UnknownUrlType(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}
