//! SQLite implementation of IFileStorage
//!
//! ## Type Mapping
//!
//! | Domain Type     | SQL Type | Strategy                                      |
//! |-----------------|----------|-----------------------------------------------|
//! | FileId          | TEXT     | UUID string via `.to_string()` / `FromStr`    |
//! | RemotePath      | TEXT     | String via `.as_str()` / `RemotePath::new()`  |
//! | FileKind        | TEXT     | `"file"` / `"directory"`                      |
//! | DateTime<Utc>   | TEXT     | RFC 3339 via `to_rfc3339()`                   |
//! | PathBuf         | TEXT     | Lossy UTF-8 string                            |
//! | bool            | INTEGER  | 0 / 1                                         |

use std::{io, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite, SqlitePool};

use ocsync_core::{
    domain::{FileId, FileKind, RemoteFile, RemotePath},
    ports::IFileStorage,
};

use crate::CacheError;

const SELECT_FILES: &str = "SELECT id, remote_path, parent_id, kind, size_bytes, modified, \
     mime_type, etag, local_path, keep_in_sync, last_sync FROM files";

/// SQLite-backed store of remote file records
pub struct SqliteFileStorage {
    pool: SqlitePool,
}

impl SqliteFileStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Queries shared by single writes and folder batches
// ============================================================================

/// Records at `path` and below it
async fn subtree<'e, E>(executor: E, path: &RemotePath) -> Result<Vec<RemoteFile>, CacheError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = if path.is_root() {
        sqlx::query(SELECT_FILES).fetch_all(executor).await?
    } else {
        let prefix = format!("{}/", path.as_str());
        sqlx::query(&format!(
            "{SELECT_FILES} WHERE remote_path = ? \
             OR substr(remote_path, 1, length(?)) = ?"
        ))
        .bind(path.as_str())
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(executor)
        .await?
    };
    rows.iter().map(file_from_row).collect()
}

async fn delete_by_id<'e, E>(executor: E, id: &FileId) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Inserts `file`, or overwrites the record with the same id
async fn upsert<'e, E>(executor: E, file: &RemoteFile) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO files \
         (id, remote_path, parent_id, kind, size_bytes, modified, mime_type, \
          etag, local_path, keep_in_sync, last_sync) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
          remote_path = excluded.remote_path, \
          parent_id = excluded.parent_id, \
          kind = excluded.kind, \
          size_bytes = excluded.size_bytes, \
          modified = excluded.modified, \
          mime_type = excluded.mime_type, \
          etag = excluded.etag, \
          local_path = excluded.local_path, \
          keep_in_sync = excluded.keep_in_sync, \
          last_sync = excluded.last_sync",
    )
    .bind(file.id.to_string())
    .bind(file.remote_path.as_str())
    .bind(file.parent_id.map(|p| p.to_string()))
    .bind(file.kind.as_str())
    .bind(i64::try_from(file.size).unwrap_or(i64::MAX))
    .bind(file.modified.map(|dt| dt.to_rfc3339()))
    .bind(&file.mime_type)
    .bind(&file.etag)
    .bind(
        file.local_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
    )
    .bind(file.keep_in_sync)
    .bind(file.last_sync.map(|dt| dt.to_rfc3339()))
    .execute(executor)
    .await?;
    Ok(())
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::CorruptRecord(format!("bad timestamp '{s}': {e}")))
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn parse_file_id(s: &str) -> Result<FileId, CacheError> {
    FileId::from_str(s).map_err(|e| CacheError::CorruptRecord(format!("bad id '{s}': {e}")))
}

/// Reconstruct a RemoteFile from a database row
fn file_from_row(row: &SqliteRow) -> Result<RemoteFile, CacheError> {
    let id: String = row.try_get("id")?;
    let remote_path: String = row.try_get("remote_path")?;
    let parent_id: Option<String> = row.try_get("parent_id")?;
    let kind: String = row.try_get("kind")?;
    let size_bytes: i64 = row.try_get("size_bytes")?;
    let modified: Option<String> = row.try_get("modified")?;
    let local_path: Option<String> = row.try_get("local_path")?;
    let keep_in_sync: bool = row.try_get("keep_in_sync")?;
    let last_sync: Option<String> = row.try_get("last_sync")?;

    Ok(RemoteFile {
        id: parse_file_id(&id)?,
        remote_path: RemotePath::new(remote_path)
            .map_err(|e| CacheError::CorruptRecord(e.to_string()))?,
        parent_id: parent_id.as_deref().map(parse_file_id).transpose()?,
        kind: FileKind::from_str(&kind).map_err(|e| CacheError::CorruptRecord(e.to_string()))?,
        size: u64::try_from(size_bytes).unwrap_or(0),
        modified: parse_optional_datetime(modified)?,
        mime_type: row.try_get("mime_type")?,
        etag: row.try_get("etag")?,
        local_path: local_path.map(PathBuf::from),
        keep_in_sync,
        last_sync: parse_optional_datetime(last_sync)?,
    })
}

/// Deletes downloaded content; a file that is already gone is fine
async fn remove_local_content(files: &[RemoteFile]) {
    for file in files.iter().filter(|f| !f.is_directory()) {
        let Some(local) = file.local_path.as_ref() else {
            continue;
        };
        match tokio::fs::remove_file(local).await {
            Ok(()) => tracing::debug!(path = %local.display(), "Removed local content"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %local.display(), error = %e, "Failed to remove local content")
            }
        }
    }
}

// ============================================================================
// IFileStorage implementation
// ============================================================================

#[async_trait::async_trait]
impl IFileStorage for SqliteFileStorage {
    async fn get_by_path(&self, path: &RemotePath) -> anyhow::Result<Option<RemoteFile>> {
        let row = sqlx::query(&format!("{SELECT_FILES} WHERE remote_path = ?"))
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(file_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn children_of(&self, folder_id: &FileId) -> anyhow::Result<Vec<RemoteFile>> {
        let rows = sqlx::query(&format!(
            "{SELECT_FILES} WHERE parent_id = ? ORDER BY remote_path"
        ))
        .bind(folder_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(file_from_row).collect::<Result<_, _>>()?)
    }

    async fn save(&self, file: &RemoteFile) -> anyhow::Result<()> {
        upsert(&self.pool, file).await?;
        tracing::trace!(id = %file.id, path = %file.remote_path, "Saved file record");
        Ok(())
    }

    async fn remove(&self, file: &RemoteFile, also_local_content: bool) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let doomed = subtree(&mut *tx, &file.remote_path).await?;
        for record in &doomed {
            delete_by_id(&mut *tx, &record.id).await?;
        }
        tx.commit().await?;

        if also_local_content {
            remove_local_content(&doomed).await;
        }

        tracing::debug!(
            path = %file.remote_path,
            records = doomed.len(),
            also_local_content,
            "Removed file records"
        );
        Ok(())
    }

    async fn apply_folder(
        &self,
        saves: &[RemoteFile],
        removals: &[RemoteFile],
        also_local_content: bool,
    ) -> anyhow::Result<()> {
        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;

        let mut doomed = Vec::new();
        for file in removals {
            for record in subtree(&mut *tx, &file.remote_path).await? {
                delete_by_id(&mut *tx, &record.id).await?;
                doomed.push(record);
            }
        }
        for file in saves {
            upsert(&mut *tx, file).await?;
        }
        tx.commit().await?;

        if also_local_content {
            remove_local_content(&doomed).await;
        }

        tracing::debug!(
            saved = saves.len(),
            removed = doomed.len(),
            also_local_content,
            "Applied folder changes"
        );
        Ok(())
    }
}
