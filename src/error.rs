//! Error types for the persistence subsystem.

use thiserror::Error;

/// Main error type for codec, backend, and scheduler operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record of {0} bytes exceeds the maximum frame payload size")]
    FrameTooLarge(usize),

    #[error("truncated frame header at offset {offset}")]
    TruncatedHeader { offset: usize },

    #[error("truncated frame payload at offset {offset}: declared {declared} bytes, {available} available")]
    TruncatedPayload {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("malformed record at offset {offset}: {message}")]
    MalformedRecord { offset: usize, message: String },

    #[error("expected exactly one object record: {0}")]
    NotASingleObject(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, VaultError>;
