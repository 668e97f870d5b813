//! Common error types for qlib

use thiserror::Error;

/// Common result type for qlib operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the qlib crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited worksheet could not be read or written
    #[error("Worksheet error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON extract or catalog could not be parsed or serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested file or column not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (missing required column, malformed extract, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
