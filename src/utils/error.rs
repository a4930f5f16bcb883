//! Error Handling Module
//!
//! Defines custom error types for the dataset generator library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dataset generation operations
#[derive(Error, Debug)]
pub enum DatasetGenError {
    /// Error decoding, validating or encoding an image
    #[error("Failed to handle image at '{0}': {1}")]
    Image(PathBuf, String),

    /// Error fetching a single image
    #[error("Failed to download '{url}': {reason}")]
    Download { url: String, reason: String },

    /// Transport or status error from the HTTP client
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// A directory that should hold images holds none
    #[error("No images found in '{0}'")]
    NoImages(PathBuf),
}

impl From<serde_json::Error> for DatasetGenError {
    fn from(err: serde_json::Error) -> Self {
        DatasetGenError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for DatasetGenError {
    fn from(err: reqwest::Error) -> Self {
        DatasetGenError::Http(err.to_string())
    }
}

/// Convenience Result type for dataset generation operations
pub type Result<T> = std::result::Result<T, DatasetGenError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Turn a missing value into an error, building the message lazily
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Option<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| DatasetGenError::InvalidInput(f()))
    }
}
