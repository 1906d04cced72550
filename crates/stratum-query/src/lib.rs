//! Composite CTE query assembly for Stratum.
//!
//! This crate layers named common table expressions on top of a mutable
//! single-statement query builder: a [`CompositeQuery`] owns one main
//! [`SelectBuilder`] plus insertion-ordered registries of plain and
//! recursive CTEs, renders the whole thing under a `WITH [RECURSIVE]`
//! prefix, and merges every fragment's bound parameters before handing the
//! statement to a [`QueryConnection`] backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratum_query::CompositeQuery;
//!
//! let mut query = CompositeQuery::new(Arc::new(pool));
//! query
//!     .create_cte("active_users")
//!     .select(["uid"])
//!     .from("users")
//!     .and_where("disabled = 0");
//! query.main_mut().select(["uid"]).from("active_users");
//!
//! // WITH active_users AS (SELECT uid FROM users WHERE disabled = 0)
//! // SELECT uid FROM active_users
//! let rows = query.execute()?;
//! ```

pub mod builder;
pub mod composite;
pub mod connection;
pub mod error;
pub mod join;
pub mod params;

// Re-exports
pub use builder::{JoinKind, SelectBuilder};
pub use composite::{CompositeQuery, CteDefinition, LookupTarget, RecursiveCte, UnionMode};
pub use connection::{QueryConnection, ResultSet, Row};
pub use error::{QueryError, QueryResult};
pub use join::{join_onto_cte, ColumnRef, Comparison, JoinDescriptor};
pub use params::{ParamType, ParameterTypes, Parameters};
