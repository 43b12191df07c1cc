//! Error types for persistence operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing artifacts.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error (file operations, disk I/O)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error (invalid magic bytes, version mismatch, wrong artifact kind)
    #[error("format error: {0}")]
    Format(String),

    /// Serialization error (postcard, serde_json)
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Checksum mismatch (data corruption detected)
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Artifact file does not exist
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("json error: {e}"))
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
