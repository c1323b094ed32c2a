//! Sync command - Synchronize the remote folder tree
//!
//! Provides the `ocsync sync` CLI command which:
//! 1. Validates the configuration and opens the file record database
//! 2. Creates the WebDAV and SQLite adapters
//! 3. Runs one sync session, cancellable with Ctrl-C
//! 4. Displays the session report

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ocsync_cache::{DatabasePool, SqliteFileStorage};
use ocsync_core::domain::{RemotePath, SyncReport, SyncState};
use ocsync_sync::{SyncOrchestrator, SyncRequest};
use ocsync_webdav::WebdavClient;

use super::AppContext;
use crate::{notifier::LogNotifier, output::OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Remote folder to start from (defaults to sync.root)
    #[arg(long, value_name = "REMOTE")]
    pub path: Option<String>,

    /// Treat the run as requested by the user; failures are reported
    #[arg(long)]
    pub manual: bool,
}

impl SyncCommand {
    /// Builds the request from the flags and the configuration
    fn request(&self, ctx: &AppContext) -> Result<SyncRequest> {
        let raw = self.path.as_deref().unwrap_or(&ctx.config.sync.root);
        let root = RemotePath::new(raw.to_string())
            .with_context(|| format!("Invalid remote path '{raw}'"))?;
        Ok(SyncRequest {
            root,
            manual: self.manual,
        })
    }

    /// Wires the adapters, runs a session and prints its report
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.require_valid_config()?;
        let request = self.request(ctx)?;
        let formatter = ctx.format.formatter();

        let client = WebdavClient::from_config(&ctx.config)
            .context("Failed to create WebDAV client")?;
        let pool = DatabasePool::from_config(&ctx.config.storage)
            .await
            .context("Failed to open database")?;
        let storage = Arc::new(SqliteFileStorage::new(pool.pool().clone()));

        let mut orchestrator =
            SyncOrchestrator::new(Arc::new(client.clone()), storage, Arc::new(LogNotifier));
        if ctx.config.sync.check_server_version {
            orchestrator = orchestrator.with_server_check(Arc::new(client));
        }

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current folder");
                interrupt.cancel();
            }
        });

        formatter.info(&format!(
            "Synchronizing {} from {}",
            request.root,
            ctx.config.webdav_url()
        ));
        let report = orchestrator.run(request, cancel).await?;
        info!(state = %report.state, failed = report.failed_results, "Sync session ended");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&report).context("Failed to serialize report")?;
            formatter.print_json(&json);
        } else {
            print_report(formatter.as_ref(), &report);
        }

        match report.state {
            SyncState::Completed => Ok(()),
            state => anyhow::bail!("Synchronization did not complete ({state})"),
        }
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &SyncReport) {
    match report.state {
        SyncState::Completed if report.failed_results == 0 => {
            formatter.success("Synchronization completed")
        }
        SyncState::Completed => formatter.warn(&format!(
            "Synchronization completed with {} failed folder(s)",
            report.failed_results
        )),
        SyncState::Cancelled => formatter.warn("Synchronization cancelled"),
        state => formatter.error(&format!("Synchronization stopped: {state}")),
    }

    let stats = &report.stats;
    formatter.field("Folders synced", &stats.folders_synced.to_string());
    formatter.field("Folders failed", &stats.folders_failed.to_string());
    if stats.auth_failures > 0 {
        formatter.field("Auth failures", &stats.auth_failures.to_string());
    }
    if stats.parse_failures > 0 {
        formatter.field("Parse failures", &stats.parse_failures.to_string());
    }
    if stats.io_failures > 0 {
        formatter.field("I/O failures", &stats.io_failures.to_string());
    }
    if let (Some(start), Some(end)) = (report.started_at, report.finished_at) {
        let elapsed = end - start;
        formatter.field(
            "Duration",
            &format!("{}.{:03}s", elapsed.num_seconds(), elapsed.num_milliseconds() % 1000),
        );
    }
    if let Some(last) = &report.last_failed {
        formatter.field("Last failure", &last.log_message());
    }
}
