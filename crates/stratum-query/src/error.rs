//! Error types for query composition

use thiserror::Error;

/// Error type for composite query operations
///
/// Lookup misses are caller programming errors: they are raised before any
/// SQL is built or sent, and retrying does not help. Backend errors surface
/// unmodified from the connection during execution.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// No CTE is registered under this alias
    #[error("unknown CTE alias: {alias}")]
    UnknownCte { alias: String },

    /// Query execution error reported by the backend
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for composite query operations
pub type QueryResult<T> = Result<T, QueryError>;
