//! SQLite connection management
//!
//! Uses a simple Arc<Mutex<Connection>> pattern instead of a pool crate.
//! SQLite in WAL mode allows multiple readers but only one writer, so a
//! mutex is enough for this backend.

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql};
use serde_json::Value;
use std::sync::Arc;
use stratum_query::{
    ParamType, ParameterTypes, Parameters, QueryConnection, QueryResult, ResultSet, SelectBuilder,
};
use tracing::{debug, info};

/// Thread-safe SQLite connection wrapper
///
/// Cloning shares the underlying connection; this is the handle a
/// [`stratum_query::CompositeQuery`] is bound to.
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    config: SqliteConfig,
}

impl SqlitePool {
    /// Open a connection with the given configuration
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        info!(path = ?config.path, "opening SQLite connection");

        let conn = if config.path.to_str() == Some(":memory:") {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqliteError::Connection(format!("failed to create directory: {}", e))
                })?;
            }
            Connection::open(&config.path)?
        };

        let pool = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        pool.configure_pragmas()?;

        Ok(pool)
    }

    /// Open an in-memory connection for testing
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteConfig::memory())
    }

    /// Execute a closure with the connection
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Apply PRAGMA settings from the configuration
    fn configure_pragmas(&self) -> SqliteResult<()> {
        debug!("configuring SQLite pragmas");

        self.with_connection(|conn| {
            if self.config.wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
            }

            if self.config.foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            }

            conn.execute_batch(&format!(
                "PRAGMA busy_timeout = {};",
                self.config.busy_timeout_ms
            ))?;
            conn.execute_batch(&format!("PRAGMA cache_size = {};", self.config.cache_size))?;

            Ok(())
        })
    }

    fn run_query(
        &self,
        sql: &str,
        params: &Parameters,
        types: &ParameterTypes,
    ) -> SqliteResult<ResultSet> {
        debug!(sql, params = params.len(), "executing query");

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|name| name.to_string())
                .collect();

            // rusqlite wants the leading colon in named-parameter keys
            let bound: Vec<(String, SqlValue)> = params
                .iter()
                .map(|(name, value)| Ok((format!(":{}", name), bind_value(name, value, types)?)))
                .collect::<SqliteResult<_>>()?;
            let named: Vec<(&str, &dyn ToSql)> = bound
                .iter()
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();

            let mut rows = stmt.query(named.as_slice())?;
            let mut data = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(columns.len());
                for idx in 0..columns.len() {
                    values.push(value_to_json(row.get_ref(idx)?));
                }
                data.push(values);
            }

            Ok(ResultSet {
                columns,
                rows: data,
            })
        })
    }
}

impl QueryConnection for SqlitePool {
    fn create_builder(&self) -> SelectBuilder {
        SelectBuilder::new()
    }

    fn execute_query(
        &self,
        sql: &str,
        params: &Parameters,
        types: &ParameterTypes,
    ) -> QueryResult<ResultSet> {
        self.run_query(sql, params, types).map_err(Into::into)
    }
}

/// Coerce a parameter value into a SQLite value per its declared type.
///
/// Without a declared type the JSON type decides the binding.
fn bind_value(name: &str, value: &Value, types: &ParameterTypes) -> SqliteResult<SqlValue> {
    let declared = types.get(name).copied();
    match (declared, value) {
        (_, Value::Null) => Ok(SqlValue::Null),
        (Some(ParamType::Integer), value) => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| binding_error(name, "an integer", value)),
        (Some(ParamType::Real), value) => value
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| binding_error(name, "a real", value)),
        (Some(ParamType::Boolean), value) => value
            .as_bool()
            .map(|flag| SqlValue::Integer(flag as i64))
            .ok_or_else(|| binding_error(name, "a boolean", value)),
        (Some(ParamType::Text), Value::String(text)) => Ok(SqlValue::Text(text.clone())),
        (Some(ParamType::Text), value) => Ok(SqlValue::Text(value.to_string())),
        (None, Value::Bool(flag)) => Ok(SqlValue::Integer(*flag as i64)),
        (None, Value::Number(number)) => number
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| number.as_f64().map(SqlValue::Real))
            .ok_or_else(|| binding_error(name, "a number", value)),
        (None, Value::String(text)) => Ok(SqlValue::Text(text.clone())),
        (None, value) => Ok(SqlValue::Text(value.to_string())),
    }
}

fn binding_error(name: &str, expected: &str, value: &Value) -> SqliteError {
    SqliteError::Binding(format!(
        "parameter :{} cannot bind as {}: {}",
        name, expected, value
    ))
}

/// Convert a SQLite column value to JSON. Blobs come back hex-encoded.
fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(hex::encode(blob)),
    }
}
