//! SQLite connection pool
//!
//! Wraps SQLx's `SqlitePool`. File databases are opened in WAL mode with
//! their directory created on demand; the schema is applied on every open.

use std::{path::Path, time::Duration};

use ocsync_core::config::StorageConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Schema of the file record database
const SCHEMA: &str = include_str!("migrations/20261018_initial.sql");

/// Connections kept open for a file database
const MAX_CONNECTIONS: u32 = 4;

/// How long a connection waits on a locked database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of connections to the file record database
///
/// In-memory databases use a single connection, since each SQLite
/// connection to `:memory:` sees its own database.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (or creates) the database file at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the directory or file cannot
    /// be created, or `CacheError::MigrationFailed` if the schema cannot be
    /// applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {e}", db_path.display()))
            })?;

        Self::apply_schema(&pool).await?;
        tracing::info!(path = %db_path.display(), "Opened file record database");

        Ok(Self { pool })
    }

    /// Opens the database configured in the `storage` section
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CacheError> {
        Self::new(&config.database).await
    }

    /// Creates a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the schema fails.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;

        Self::apply_schema(&pool).await?;
        tracing::debug!("Opened in-memory file record database");

        Ok(Self { pool })
    }

    /// The underlying SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
        Ok(())
    }
}
