//! Common error types for flagdesk

use thiserror::Error;

/// Common result type for flagdesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across flagdesk components
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Read or write of the external record table failed
    #[error("Store error: {0}")]
    Store(String),

    /// The table changed between read and write (optimistic concurrency)
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: String, found: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
