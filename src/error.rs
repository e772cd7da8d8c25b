//! Centralized error types for mailsift.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsift library.
#[derive(Error, Debug)]
pub enum MailsiftError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The SQLite index reported an error.
    #[error("Index database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A JSON list column could not be encoded or decoded.
    #[error("Column serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The archive root is missing or not a directory.
    #[error("Invalid archive root: {0}")]
    InvalidArchive(PathBuf),

    /// The index handle was already closed.
    #[error("Search index is closed")]
    Closed,
}

/// Convenience alias for `Result<T, MailsiftError>`.
pub type Result<T> = std::result::Result<T, MailsiftError>;

impl MailsiftError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
