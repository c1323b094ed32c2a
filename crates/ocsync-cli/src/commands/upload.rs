//! Upload command - Send a local file with the chunked upload protocol
//!
//! On success the uploaded file is recorded in the file record database so
//! the next sync session treats it as known.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::info;

use ocsync_cache::{DatabasePool, SqliteFileStorage};
use ocsync_core::{
    domain::{FileKind, RemoteFile, RemotePath},
    ports::{IFileStorage, ITransferProgressListener},
};
use ocsync_webdav::{ChunkedUploader, WebdavClient};

use super::AppContext;
use crate::output::format_bytes;

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local file to upload
    pub local: PathBuf,

    /// Destination path on the server, e.g. /Docs/report.pdf
    pub remote: String,

    /// Chunk size in bytes (defaults to upload.chunk_size_bytes)
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u64>,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.require_valid_config()?;
        let formatter = ctx.format.formatter();

        let remote = RemotePath::new(self.remote.clone())
            .with_context(|| format!("Invalid remote path '{}'", self.remote))?;
        if remote.is_root() {
            anyhow::bail!("Cannot upload to the root folder itself");
        }
        let chunk_size = self.chunk_size.unwrap_or(ctx.config.upload.chunk_size_bytes);

        let client = WebdavClient::from_config(&ctx.config)
            .context("Failed to create WebDAV client")?;
        let mut uploader = ChunkedUploader::new(client).with_chunk_size(chunk_size);
        uploader.add_progress_listener(Arc::new(ProgressLogger::default()));

        let size = tokio::fs::metadata(&self.local)
            .await
            .with_context(|| format!("Cannot read {}", self.local.display()))?
            .len();
        formatter.info(&format!(
            "Uploading {} ({}) to {}",
            self.local.display(),
            format_bytes(size),
            remote
        ));

        let result = uploader.upload(&self.local, &remote).await?;
        if !result.is_success() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "remote": remote.as_str(),
                    "result": result,
                }));
            }
            anyhow::bail!("Upload failed: {}", result.log_message());
        }

        let pool = DatabasePool::from_config(&ctx.config.storage)
            .await
            .context("Failed to open database")?;
        let storage = SqliteFileStorage::new(pool.pool().clone());
        let record = self.record_upload(&storage, &remote, size).await?;
        info!(remote = %remote, id = %record.id, "Recorded uploaded file");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "remote": remote.as_str(),
                "bytes": size,
                "chunk_size": chunk_size,
                "file": record,
            }));
        } else {
            formatter.success(&format!("Uploaded {remote}"));
            formatter.field("Size", &format_bytes(size));
            formatter.field("Chunk size", &format_bytes(chunk_size));
        }
        Ok(())
    }

    /// Creates or refreshes the record of the uploaded file
    async fn record_upload(
        &self,
        storage: &dyn IFileStorage,
        remote: &RemotePath,
        size: u64,
    ) -> Result<RemoteFile> {
        let mut record = match storage.get_by_path(remote).await? {
            Some(existing) => existing,
            None => RemoteFile::new(remote.clone(), FileKind::File),
        };
        if let Some(parent) = remote.parent() {
            if let Some(folder) = storage.get_by_path(&parent).await? {
                record.parent_id = Some(folder.id);
            }
        }
        record.size = size;
        record.modified = Some(Utc::now());
        // `local_path` names downloaded content that sync may delete; the
        // uploaded source belongs to the user and is never linked here.
        // The server assigns a new etag; the next listing fills it in.
        record.etag = None;
        record.last_sync = None;

        storage.save(&record).await?;
        Ok(record)
    }
}

/// Logs upload progress in steps of ten percent
#[derive(Debug, Default)]
struct ProgressLogger {
    last_decile: AtomicU64,
}

impl ITransferProgressListener for ProgressLogger {
    fn on_transfer_progress(
        &self,
        _progress_rate: u64,
        total_transferred: u64,
        total_to_transfer: u64,
        file_name: &str,
    ) {
        if total_to_transfer == 0 {
            return;
        }
        let decile = total_transferred.saturating_mul(10) / total_to_transfer;
        if self.last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            info!(
                file = file_name,
                percent = decile * 10,
                transferred = total_transferred,
                "Upload progress"
            );
        }
    }
}
