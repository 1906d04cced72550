//! Connection contract consumed by the composite engine.
//!
//! The engine uses its connection for exactly two things: allocating fresh
//! single-statement builders and running the assembled SQL. Everything else
//! about connectivity (pooling, retries, transactions) belongs to the
//! backend crate implementing [`QueryConnection`].

use serde_json::Value;

use crate::builder::SelectBuilder;
use crate::error::QueryResult;
use crate::params::{ParameterTypes, Parameters};

/// One row of a result set, in select-list order.
pub type Row = Vec<Value>;

/// Materialized rows returned from query execution.
///
/// Owned by the caller; iteration order is the backend's return order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Column names in select-list order
    pub columns: Vec<String>,
    /// Row data
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Backend connection used to allocate builders and execute assembled SQL.
pub trait QueryConnection: Send + Sync {
    /// Allocate a fresh single-statement builder.
    fn create_builder(&self) -> SelectBuilder;

    /// Execute `sql` with the given named parameters and declared types.
    ///
    /// Any rejection by the backend (syntax error, missing table, type
    /// mismatch) surfaces unmodified as a backend error; no validation
    /// happens before delegation.
    fn execute_query(
        &self,
        sql: &str,
        params: &Parameters,
        types: &ParameterTypes,
    ) -> QueryResult<ResultSet>;
}
