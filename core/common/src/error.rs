//! Common error types for CellCrypt.

use thiserror::Error;

/// Top-level error type for CellCrypt operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Grid width or height is zero.
    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Operation requires a built grid.
    #[error("Grid has not been initialized")]
    NotInitialized,

    /// More bits were requested than the source holds.
    #[error("Insufficient bits: requested {requested}, available {available}")]
    InsufficientBits { requested: usize, available: usize },

    /// Message is longer than the available key material.
    #[error("Insufficient key data: message needs {needed} bytes, key has {available}")]
    InsufficientKey { needed: usize, available: usize },

    /// Input stream cannot report its length up front.
    #[error("Input length cannot be determined")]
    UnknownLength,

    /// Encrypted container is structurally invalid.
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Operation was cancelled through a cancel token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Text transport encoding could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
