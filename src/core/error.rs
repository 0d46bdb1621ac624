//! Typed error handling for the timesheet application
//!
//! Every fallible operation in the crate returns [`HightechError`]. The
//! variants follow the failure taxonomy of the application:
//!
//! - [`HightechError::Io`]: the storage location could not be read or written
//! - [`HightechError::Parse`]: a persisted document is not well-formed
//! - [`HightechError::DateParse`]: a date key is not a canonical `YYYY-MM-DD` date
//! - [`HightechError::Configuration`]: invalid startup configuration (route
//!   patterns, header names, config files). Fatal before serving.
//! - [`HightechError::Upstream`]: a collaborator (session, mail, templates) failed
//! - [`HightechError::Internal`]: an invariant of the document was broken
//!
//! Handlers never show these details to the user; they log the error and
//! serve the generic server-error page. [`IntoResponse`] is still provided
//! so the error can be returned directly from plain axum handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Crate-wide result alias
pub type Result<T, E = HightechError> = std::result::Result<T, E>;

/// The main error type of the application
#[derive(Debug)]
pub enum HightechError {
    /// Storage unreadable or unwritable
    Io {
        path: Option<String>,
        message: String,
    },

    /// Malformed persisted document
    Parse { message: String },

    /// Malformed date key at document creation time
    DateParse { key: String, message: String },

    /// Invalid configuration, detected at startup
    Configuration { message: String },

    /// Session, mail or template collaborator failure
    Upstream { collaborator: String, message: String },

    /// Broken document invariant
    Internal(String),
}

impl HightechError {
    /// Build an IO error bound to a storage location
    pub fn io_at(path: impl fmt::Display, err: std::io::Error) -> Self {
        HightechError::Io {
            path: Some(path.to_string()),
            message: err.to_string(),
        }
    }

    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        HightechError::Configuration {
            message: message.into(),
        }
    }

    /// Build an upstream collaborator error
    pub fn upstream(collaborator: &str, message: impl fmt::Display) -> Self {
        HightechError::Upstream {
            collaborator: collaborator.to_string(),
            message: message.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            HightechError::DateParse { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            HightechError::Io { .. } => "IO_ERROR",
            HightechError::Parse { .. } => "PARSE_ERROR",
            HightechError::DateParse { .. } => "DATE_PARSE_ERROR",
            HightechError::Configuration { .. } => "CONFIGURATION_ERROR",
            HightechError::Upstream { .. } => "UPSTREAM_ERROR",
            HightechError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl fmt::Display for HightechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HightechError::Io {
                path: Some(path),
                message,
            } => write!(f, "IO error on '{}': {}", path, message),
            HightechError::Io {
                path: None,
                message,
            } => write!(f, "IO error: {}", message),
            HightechError::Parse { message } => {
                write!(f, "Failed to parse invoice document: {}", message)
            }
            HightechError::DateParse { key, message } => {
                write!(f, "Invalid date key '{}': {}", key, message)
            }
            HightechError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            HightechError::Upstream {
                collaborator,
                message,
            } => write!(f, "{} failed: {}", collaborator, message),
            HightechError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for HightechError {}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for HightechError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<std::io::Error> for HightechError {
    fn from(err: std::io::Error) -> Self {
        HightechError::Io {
            path: None,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for HightechError {
    fn from(err: serde_json::Error) -> Self {
        HightechError::Parse {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for HightechError {
    fn from(err: serde_yaml::Error) -> Self {
        HightechError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<tera::Error> for HightechError {
    fn from(err: tera::Error) -> Self {
        // tera keeps the useful part of the message in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        HightechError::Upstream {
            collaborator: "template renderer".to_string(),
            message,
        }
    }
}
