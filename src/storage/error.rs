//! Reading store error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the reading store
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed (creating the data directory, opening the file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite rejected a statement or the database is unusable
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored timestamp could not be parsed back into a date/time
    #[error("Invalid stored timestamp: {0}")]
    Timestamp(String),

    /// The blocking task running the statement panicked or was cancelled
    #[error("Storage task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Connection mutex was poisoned by a panicking holder
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
