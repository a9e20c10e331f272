//! Error types and their HTTP mapping

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Body returned for any failure that happens before streaming starts
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while generating the note.";

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Missing shorthand or mode in request body")]
    MissingFields,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Backend produced no data for {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode backend stream: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for building a configuration error from a message
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config(config::ConfigError::Message(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidJson | AppError::MissingFields => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error came from the caller's request rather than the backend
    pub fn is_validation(&self) -> bool {
        self.status_code() == StatusCode::BAD_REQUEST
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Decode(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Backend details stay in the logs, callers only see the generic text
        let body = if self.is_validation() {
            self.to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
