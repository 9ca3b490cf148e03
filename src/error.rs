//! Crate-wide error taxonomy

use thiserror::Error;

/// Common result type used throughout the application
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the segmentation pipeline and prediction service
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid request payload: missing/malformed JSON fields or columns.
    /// Surfaced to HTTP callers as a 400 with the triggering message.
    #[error("{0}")]
    InvalidInput(String),

    /// Feature computation or clustering failure (degenerate groups,
    /// dimension mismatches, a fit that did not converge to a model)
    #[error("computation error: {0}")]
    Computation(String),

    /// Scaler/model artifact failed to load or persist. Fatal at service
    /// startup; never produced while handling a request.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Warehouse table read/write error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error (wraps serde_json::Error)
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`] with a formatted message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
