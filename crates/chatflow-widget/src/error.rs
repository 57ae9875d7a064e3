//! Error types for chatflow-widget

use thiserror::Error;

/// Result type alias using chatflow-widget Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing widget state
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend or one of its collaborators
    #[error(transparent)]
    Api(#[from] chatflow_api::Error),

    /// Session storage I/O failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded
    #[error("Corrupt session record: {0}")]
    Json(#[from] serde_json::Error),
}
