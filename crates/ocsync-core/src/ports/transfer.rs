//! Transfer ports
//!
//! Progress reporting for uploads, and the hand-off of files whose content
//! needs refreshing to whatever component performs downloads.

use crate::domain::RemoteFile;

/// Receives byte-level progress of a transfer
///
/// Called in-line on the transfer task after every read from the source, so
/// implementations must return quickly and must not block.
pub trait ITransferProgressListener: Send + Sync {
    /// # Arguments
    /// * `progress_rate` - Bytes read in this step
    /// * `total_transferred` - Bytes read so far in the whole transfer
    /// * `total_to_transfer` - Total size of the transfer
    /// * `file_name` - Name of the file being transferred
    fn on_transfer_progress(
        &self,
        progress_rate: u64,
        total_transferred: u64,
        total_to_transfer: u64,
        file_name: &str,
    );
}

/// Port trait for scheduling content downloads
///
/// The sync core only flags keep-in-sync files whose remote copy changed;
/// downloading them is delegated here.
#[async_trait::async_trait]
pub trait IDownloadScheduler: Send + Sync {
    /// Queues a download of `file`'s current remote content
    async fn schedule_download(&self, file: &RemoteFile) -> anyhow::Result<()>;
}
