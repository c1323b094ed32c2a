//! Notifier that reports sync progress through tracing

use ocsync_core::{
    domain::SyncReport,
    ports::{ISyncNotifier, SyncNotification},
};
use tracing::{debug, info, warn};

/// Writes sync notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl ISyncNotifier for LogNotifier {
    async fn notify(&self, notification: &SyncNotification) -> anyhow::Result<()> {
        match (&notification.folder_path, notification.in_progress) {
            (Some(path), _) => debug!(folder = %path, "Folder visited"),
            (None, true) => info!("Synchronization started"),
            (None, false) => match &notification.result {
                Some(result) => info!(
                    last_failure = %result.log_message(),
                    "Synchronization finished with failures"
                ),
                None => info!("Synchronization finished"),
            },
        }
        Ok(())
    }

    async fn notify_failed_synchronization(&self, report: &SyncReport) -> anyhow::Result<()> {
        warn!(
            failed = report.failed_results,
            state = %report.state,
            last_failure = %report
                .last_failed
                .as_ref()
                .map(|r| r.log_message())
                .unwrap_or_default(),
            "Manual synchronization failed"
        );
        Ok(())
    }
}
