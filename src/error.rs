//! Error types for cert-audit.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cert-audit.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Audit/certificate storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Blocking storage task failed to complete.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Provider transport failure (retryable).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Response cache error.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Certificate failed validation.
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// HTTP server error.
    #[error("Server error: {0}")]
    Server(String),
}
