//! Error types for Sandchat Core

use thiserror::Error;

/// Result type alias using Sandchat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Sandchat error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Sandbox initialization failed: {0}")]
    SessionInit(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("You are sending too many messages. Please try again later.")]
    RateLimited,

    #[error("{0}")]
    UploadValidation(String),

    #[error("{0}")]
    UploadTransport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}
