//! Error taxonomy of the cook pipeline.
//!
//! [`CookError`] is what callers of the kitchen see; every variant maps to a
//! stable code exposed through [`miette::Diagnostic::code`]. Hooks report
//! failures with the smaller [`HookError`], which the kitchen converts
//! according to the stage the hook ran in.

use std::fmt;
use std::sync::Arc;

use galley_graph::{GraphError, Trace};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CookError>;

/// Result type returned by [`ContentProcessor`](crate::ContentProcessor) hooks.
pub type HookResult<T> = std::result::Result<T, HookError>;

/// Location in user-authored code an error is reported against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSite {
    pub url: String,
    pub line: u32,
    pub column: u32,
}

impl From<&Trace> for ErrorSite {
    fn from(trace: &Trace) -> Self {
        Self {
            url: trace.url.clone(),
            line: trace.line,
            column: trace.column,
        }
    }
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.url, self.line, self.column)
    }
}

fn site_suffix(site: &Option<ErrorSite>) -> String {
    match site {
        Some(site) => format!(" (in {site})"),
        None => String::new(),
    }
}

/// Sub-code of [`CookError::Fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorCode {
    NotFound,
    NotAllowed,
    DirectoryReferenceNotAllowed,
    Failed,
}

impl FetchErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorCode::NotFound => "NOT_FOUND",
            FetchErrorCode::NotAllowed => "NOT_ALLOWED",
            FetchErrorCode::DirectoryReferenceNotAllowed => "DIRECTORY_REFERENCE_NOT_ALLOWED",
            FetchErrorCode::Failed => "FAILED",
        }
    }
}

impl fmt::Display for FetchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while resolving references or cooking urls.
#[derive(Debug, Clone, Error)]
pub enum CookError {
    #[error("cannot resolve `{specifier}`{}: {reason}", site_suffix(.site))]
    Resolve {
        specifier: String,
        reason: String,
        site: Option<ErrorSite>,
    },

    #[error("cannot fetch `{url}` [{code}]{}: {reason}", site_suffix(.site))]
    Fetch {
        url: String,
        code: FetchErrorCode,
        reason: String,
        site: Option<ErrorSite>,
    },

    #[error("parse error in `{url}` at {line}:{column}: {message}\n{frame}")]
    Parse {
        url: String,
        line: u32,
        column: u32,
        message: String,
        frame: String,
        site: Option<ErrorSite>,
    },

    #[error("`{hook}` failed to transform `{url}`{}: {reason}", site_suffix(.site))]
    Transform {
        url: String,
        hook: String,
        reason: String,
        site: Option<ErrorSite>,
    },

    #[error("`{hook}` failed to finalize `{url}`{}: {reason}", site_suffix(.site))]
    Finalize {
        url: String,
        hook: String,
        reason: String,
        site: Option<ErrorSite>,
    },

    #[error("protocol `{protocol}` is not supported: `{url}`{}", site_suffix(.site))]
    ProtocolNotSupported {
        url: String,
        protocol: String,
        site: Option<ErrorSite>,
    },

    #[error("aborted")]
    Aborted,

    #[error("`{hook}` returned an invalid value from {operation}: {reason}")]
    HookContract {
        hook: String,
        operation: &'static str,
        reason: String,
    },

    #[error("graph error: {0}")]
    Graph(Arc<GraphError>),
}

impl From<GraphError> for CookError {
    fn from(err: GraphError) -> Self {
        CookError::Graph(Arc::new(err))
    }
}

impl CookError {
    /// Stable taxonomy code.
    pub fn code_str(&self) -> &'static str {
        match self {
            CookError::Resolve { .. } => "RESOLVE_URL_ERROR",
            CookError::Fetch { .. } => "FETCH_URL_CONTENT_ERROR",
            CookError::Parse { .. } => "PARSE_ERROR",
            CookError::Transform { .. } => "TRANSFORM_URL_CONTENT_ERROR",
            CookError::Finalize { .. } => "FINALIZE_URL_CONTENT_ERROR",
            CookError::ProtocolNotSupported { .. } => "PROTOCOL_NOT_SUPPORTED",
            CookError::Aborted => "ABORTED",
            CookError::HookContract { .. } => "HOOK_CONTRACT_ERROR",
            CookError::Graph(_) => "GRAPH_ERROR",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CookError::Aborted)
    }

    pub fn fetch_code(&self) -> Option<FetchErrorCode> {
        match self {
            CookError::Fetch { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn site(&self) -> Option<&ErrorSite> {
        match self {
            CookError::Resolve { site, .. }
            | CookError::Fetch { site, .. }
            | CookError::Parse { site, .. }
            | CookError::Transform { site, .. }
            | CookError::Finalize { site, .. }
            | CookError::ProtocolNotSupported { site, .. } => site.as_ref(),
            _ => None,
        }
    }

    /// Attach `site` unless the error already points somewhere.
    pub fn with_site(mut self, new_site: Option<ErrorSite>) -> Self {
        match &mut self {
            CookError::Resolve { site, .. }
            | CookError::Fetch { site, .. }
            | CookError::Parse { site, .. }
            | CookError::Transform { site, .. }
            | CookError::Finalize { site, .. }
            | CookError::ProtocolNotSupported { site, .. } => {
                if site.is_none() {
                    *site = new_site;
                }
            }
            _ => {}
        }
        self
    }
}

impl miette::Diagnostic for CookError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            CookError::Resolve { .. } => Some(Box::new(
                "check the specifier or register a resolver handling it",
            )),
            CookError::Fetch {
                code: FetchErrorCode::DirectoryReferenceNotAllowed,
                ..
            } => Some(Box::new("reference a file inside the directory instead")),
            CookError::ProtocolNotSupported { .. } => Some(Box::new(
                "add the protocol to kitchen.supported_protocols or ignore the url",
            )),
            _ => None,
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }
}

/// Failure reported by a hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{message} ({line}:{column})")]
    Parse {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("directory reference not allowed: {0}")]
    DirectoryReferenceNotAllowed(String),

    /// A nested kitchen call failed; propagated unchanged.
    #[error(transparent)]
    Cook(#[from] CookError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    pub fn parse(message: impl Into<String>, line: u32, column: u32) -> Self {
        HookError::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn other(message: impl fmt::Display) -> Self {
        HookError::Other(anyhow::anyhow!("{message}"))
    }
}

/// Render the lines around `line:column` with a caret under the column.
pub fn code_frame(content: &str, line: u32, column: u32) -> String {
    let line = line.max(1) as usize;
    let first = line.saturating_sub(2).max(1);
    let last = line + 1;
    let width = last.to_string().len();
    let mut frame = String::new();

    for (index, text) in content.lines().enumerate() {
        let number = index + 1;
        if number < first {
            continue;
        }
        if number > last {
            break;
        }
        let marker = if number == line { '>' } else { ' ' };
        frame.push_str(&format!("{marker} {number:>width$} | {text}\n"));
        if number == line {
            let padding = " ".repeat(column.saturating_sub(1) as usize);
            frame.push_str(&format!("  {:>width$} | {padding}^\n", ""));
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn codes_follow_taxonomy() {
        let err = CookError::Fetch {
            url: "file:///a.png".into(),
            code: FetchErrorCode::NotFound,
            reason: "no such file".into(),
            site: None,
        };
        assert_eq!(err.code_str(), "FETCH_URL_CONTENT_ERROR");
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("FETCH_URL_CONTENT_ERROR")
        );
        assert_eq!(err.fetch_code(), Some(FetchErrorCode::NotFound));
        assert_eq!(CookError::Aborted.code_str(), "ABORTED");
    }

    #[test]
    fn with_site_keeps_existing_site() {
        let first = ErrorSite {
            url: "file:///a.html".into(),
            line: 3,
            column: 7,
        };
        let err = CookError::Resolve {
            specifier: "lodash".into(),
            reason: "bare specifier".into(),
            site: Some(first.clone()),
        }
        .with_site(Some(ErrorSite {
            url: "file:///b.js".into(),
            line: 1,
            column: 1,
        }));
        assert_eq!(err.site(), Some(&first));
        assert!(err.to_string().contains("file:///a.html:3:7"));
    }

    #[test]
    fn code_frame_points_at_column() {
        let frame = code_frame("a {\n  color: ;\n}\n", 2, 10);
        assert!(frame.contains("> 2 |   color: ;"), "{frame}");
        assert!(frame.contains(&format!("| {}^", " ".repeat(9))), "{frame}");
        assert!(frame.contains("  1 | a {"), "{frame}");
    }
}
