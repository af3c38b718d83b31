//! Error types for search operations

use crate::error::AppError;
use crate::search::parser::ParseError;

/// Errors that can surface from the query engine.
///
/// Degraded facet/histogram sub-queries and cache failures are deliberately
/// absent: they are logged and downgraded at the call site, never returned.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Malformed query text, user-correctable
    #[error("invalid query syntax: {0}")]
    Syntax(#[from] ParseError),

    /// Unknown field or unresolvable parameter, user-correctable
    #[error("validation error: {0}")]
    Validation(String),

    /// The primary entries query failed; the caller may retry the request
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Syntax(parse) => AppError::Syntax(parse.to_string()),
            SearchError::Validation(msg) => AppError::Validation(msg),
            SearchError::BackendUnavailable(msg) => AppError::Unavailable(msg),
        }
    }
}
