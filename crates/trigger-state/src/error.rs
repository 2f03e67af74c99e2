//! Error types for trigger-state

use thiserror::Error;

/// Errors raised by store implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store failed
    #[error("storage backend failed: {0}")]
    Backend(String),

    /// Catalog file could not be read or written
    #[error("catalog io failed: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog content could not be encoded or decoded
    #[error("catalog serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
