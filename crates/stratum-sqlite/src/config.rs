//! Configuration for the SQLite backend

use std::path::PathBuf;

/// Connection settings for a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file path, or `:memory:`
    pub path: PathBuf,
    /// Enable write-ahead logging
    pub wal_mode: bool,
    /// Enforce foreign key constraints
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
    /// Page cache size (negative values are KiB, per SQLite semantics)
    pub cache_size: i64,
}

impl SqliteConfig {
    /// Configuration for a file-backed database with default settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_ms: 5_000,
            cache_size: -64_000,
        }
    }

    /// In-memory database, used primarily by tests
    pub fn memory() -> Self {
        Self {
            wal_mode: false,
            ..Self::new(":memory:")
        }
    }
}
