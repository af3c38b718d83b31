use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed query text, surfaced with the offending fragment
    #[error("Invalid query syntax: {0}")]
    Syntax(String),

    /// Validation errors (unknown field, unresolvable id formats)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required backend query failed
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Syntax(_) => 400,
            AppError::Validation(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Unavailable(_) => 503,
            AppError::Configuration(_) => 500,
            AppError::Serialization(_) => 500,
            AppError::Internal(_) => 500,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Syntax(_) => "INVALID_QUERY_SYNTAX",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unavailable(_) => "BACKEND_UNAVAILABLE",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Build the JSON error body returned to transport layers
    pub fn to_body(&self) -> serde_json::Value {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status,
            message = %message,
            "Request error"
        );

        json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status,
            }
        })
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
