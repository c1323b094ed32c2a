//! Sync notification port (driven/secondary port)
//!
//! This module defines the interface the orchestrator uses to report
//! progress and results. Implementations adapt it to whatever delivery
//! mechanism the application uses (UI dispatch, message queue, log).
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because delivery is adapter-specific. The
//!   orchestrator logs delivery failures and carries on.
//! - Calls are made in-line, in order: one start notification, one per
//!   folder visited, one at session end.

use serde::{Deserialize, Serialize};

use crate::domain::{OperationResult, RemotePath, SyncReport};

// ============================================================================
// SyncNotification
// ============================================================================

/// Progress message emitted by a sync session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncNotification {
    /// False only for the session-end message
    pub in_progress: bool,
    /// Folder that was just visited, successfully or not
    pub folder_path: Option<RemotePath>,
    /// Last failed result; only set on the session-end message
    pub result: Option<OperationResult>,
}

impl SyncNotification {
    /// Session started
    pub fn started() -> Self {
        Self {
            in_progress: true,
            folder_path: None,
            result: None,
        }
    }

    /// A folder was visited
    pub fn folder_visited(path: RemotePath) -> Self {
        Self {
            in_progress: true,
            folder_path: Some(path),
            result: None,
        }
    }

    /// Session ended, with the last failed result if there was one
    pub fn finished(last_failed: Option<OperationResult>) -> Self {
        Self {
            in_progress: false,
            folder_path: None,
            result: last_failed,
        }
    }
}

// ============================================================================
// ISyncNotifier trait
// ============================================================================

/// Port trait for sync progress and failure reporting
#[async_trait::async_trait]
pub trait ISyncNotifier: Send + Sync {
    /// Delivers a progress message
    async fn notify(&self, notification: &SyncNotification) -> anyhow::Result<()>;

    /// Tells the user that a manually requested sync failed
    async fn notify_failed_synchronization(&self, report: &SyncReport) -> anyhow::Result<()>;
}
