//! SQLite backend for Stratum composite queries
//!
//! Implements the [`stratum_query::QueryConnection`] contract on top of
//! rusqlite: allocating single-statement builders and executing assembled
//! `WITH` / `WITH RECURSIVE` statements with named-parameter binding.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratum_query::CompositeQuery;
//! use stratum_sqlite::SqlitePool;
//!
//! let pool = SqlitePool::memory()?;
//! let mut query = CompositeQuery::new(Arc::new(pool));
//! query.create_cte("recent").select(["uid"]).from("events");
//! query.main_mut().select(["uid"]).from("recent");
//! let rows = query.execute()?;
//! ```

pub mod config;
pub mod connection;
pub mod error;

// Re-exports
pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
