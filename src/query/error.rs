//! Query error types

use thiserror::Error;

/// Errors that can occur while answering a query
#[derive(Error, Debug)]
pub enum QueryError {
    /// A `start`/`end` parameter could not be understood
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
