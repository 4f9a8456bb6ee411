//! Error types for depict

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for depict operations
pub type Result<T> = std::result::Result<T, DepictError>;

/// Error types that can occur while indexing or persisting images
#[derive(Error, Debug)]
pub enum DepictError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to load snapshot {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Failed to fingerprint {path}: {reason}")]
    Image { path: PathBuf, reason: String },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
