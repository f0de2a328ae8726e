//! Error types for the Code Player server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Code Player core error.
    #[error("Core error: {0}")]
    Core(#[from] codeplayer_core::Error),

    /// No snippet stored under this share id.
    #[error("Snippet not found: {0}")]
    SnippetNotFound(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Watch error.
    #[error("File watch error: {0}")]
    Watch(String),

    /// Malformed client frame or request body.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: e.to_string(),
        }
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SnippetNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) | Self::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
