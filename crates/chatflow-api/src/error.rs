//! Error types for chatflow-api

use thiserror::Error;

/// Result type alias using chatflow-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the backend or its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned a non-success status
    #[error("API error: {status}: {message}")]
    Api { status: u16, message: String },

    /// Realtime channel failure
    #[error("Socket error: {0}")]
    Socket(String),

    /// Translation endpoint returned no usable text
    #[error("Translation not available")]
    EmptyTranslation,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the failure, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error came from the server side (5xx)
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(s) if (500..600).contains(&s))
    }
}
