//! Error types for store operations.

use std::io;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the store directory lock.
    #[error("store is locked by another process")]
    StoreLocked,

    /// A stored value failed to encode or decode.
    #[error("encoding error: {0}")]
    Codec(String),

    /// A table or key name is not usable by this backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The store directory is missing or malformed.
    #[error("invalid store layout: {0}")]
    InvalidLayout(String),
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        StoreError::Codec(msg.into())
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(name: impl Into<String>) -> Self {
        StoreError::InvalidKey(name.into())
    }

    /// Creates an invalid-layout error.
    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        StoreError::InvalidLayout(msg.into())
    }
}
