//! Error Handling Module
//!
//! Defines the error type shared by preprocessing, inference and storage.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Main error type for PaddyScanner operations
#[derive(Error, Debug)]
pub enum PaddyError {
    /// Uploaded bytes could not be decoded as an image
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error loading a model artifact
    #[error("Model error: {0}")]
    Model(String),

    /// Error during a forward pass or while reading its output
    #[error("Inference error: {0}")]
    Inference(String),

    /// Blob store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Metadata store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for PaddyError {
    fn from(err: image::ImageError) -> Self {
        PaddyError::InvalidImage(err.to_string())
    }
}

impl From<sqlx::Error> for PaddyError {
    fn from(err: sqlx::Error) -> Self {
        PaddyError::Database(err.to_string())
    }
}

impl From<object_store::Error> for PaddyError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => PaddyError::NotFound(path),
            other => PaddyError::Storage(other.to_string()),
        }
    }
}

/// Convenience Result type for PaddyScanner operations
pub type Result<T> = std::result::Result<T, PaddyError>;
