//! ocsync Cache - Local file record persistence
//!
//! SQLite-based storage for the records of remote files and folders that
//! sync sessions maintain.
//!
//! ## Architecture
//!
//! This crate implements the `IFileStorage` port from `ocsync-core` using
//! SQLite as the storage backend. It is a driven (secondary) adapter in the
//! hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with schema setup
//! - [`SqliteFileStorage`] - `IFileStorage` implementation
//! - [`CacheError`] - Database failures
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use ocsync_cache::{DatabasePool, SqliteFileStorage};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/ocsync/ocsync.db")).await?;
//! let storage = SqliteFileStorage::new(pool.pool().clone());
//! // Use storage as IFileStorage...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod storage;

pub use pool::DatabasePool;
pub use storage::SqliteFileStorage;

/// Failures of the record database
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The database file or its directory could not be opened
    #[error("Cannot open database: {0}")]
    ConnectionFailed(String),

    /// A statement was rejected or the connection dropped
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// Schema setup failed
    #[error("Schema setup failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be turned back into a domain type
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
