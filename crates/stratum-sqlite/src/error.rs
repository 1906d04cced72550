//! Error types for the SQLite backend

use stratum_query::QueryError;
use thiserror::Error;

/// SQLite backend error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Parameter binding error
    #[error("binding error: {0}")]
    Binding(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        QueryError::Backend(err.to_string())
    }
}
