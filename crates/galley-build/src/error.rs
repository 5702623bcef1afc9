//! Build errors.

use std::fmt;
use std::path::PathBuf;

use galley_config::ConfigError;
use galley_graph::GraphError;
use galley_kitchen::{CookError, RuntimeError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A cook error in either pass. Any cook error fails the build.
    #[error(transparent)]
    Cook(#[from] CookError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("no entry points to build")]
    NoEntryPoints,

    #[error("bundler `{bundler}` failed: {reason}")]
    Bundler { bundler: String, reason: String },

    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },
}

impl BuildError {
    /// Stable code; cook errors keep their own taxonomy code.
    pub fn code_str(&self) -> &'static str {
        match self {
            BuildError::Cook(err) => err.code_str(),
            BuildError::Graph(_) => "GRAPH_ERROR",
            BuildError::Config(_) => "CONFIG_ERROR",
            BuildError::NoEntryPoints => "NO_ENTRY_POINTS",
            BuildError::Bundler { .. } => "BUNDLER_ERROR",
            BuildError::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            BuildError::WriteFailure { .. } => "WRITE_FAILURE",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, BuildError::Cook(err) if err.is_aborted())
    }
}

impl miette::Diagnostic for BuildError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            BuildError::Cook(err) => miette::Diagnostic::help(err),
            BuildError::NoEntryPoints => Some(Box::new("declare at least one entry point")),
            BuildError::InvalidOutputPath(_) => {
                Some(Box::new("build paths must stay inside the build directory"))
            }
            _ => None,
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }
}
