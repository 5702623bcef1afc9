//! Dev session errors.

use std::fmt;

use galley_config::ConfigError;
use galley_graph::GraphError;
use galley_kitchen::CookError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DevError>;

#[derive(Debug, Error)]
pub enum DevError {
    #[error(transparent)]
    Cook(#[from] CookError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The url resolved but has nothing to serve (ignored or empty).
    #[error("`{0}` cannot be served")]
    NotServable(String),
}

impl DevError {
    pub fn code_str(&self) -> &'static str {
        match self {
            DevError::Cook(err) => err.code_str(),
            DevError::Graph(_) => "GRAPH_ERROR",
            DevError::Config(_) => "CONFIG_ERROR",
            DevError::NotServable(_) => "NOT_SERVABLE",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, DevError::Cook(err) if err.is_aborted())
    }
}

impl miette::Diagnostic for DevError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            DevError::Cook(err) => miette::Diagnostic::help(err),
            _ => None,
        }
    }
}
