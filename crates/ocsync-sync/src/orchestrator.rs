//! Sync session orchestration
//!
//! The [`SyncOrchestrator`] runs one sync session over a remote folder tree.
//!
//! ## Session Flow
//!
//! 1. **Start**: session enters `Running`, its start time becomes the
//!    session timestamp, a start notification is sent
//! 2. **Server check** (optional): `status.php` must report an installed,
//!    supported server
//! 3. **Walk**: pre-order depth-first traversal, one
//!    [`SynchronizeFolderOperation`] per folder, children in listing order
//! 4. **Finish**: `Completed`, `Cancelled` or `Aborted`; manual sessions that
//!    failed are reported to the user; an end notification is sent
//!
//! ## Failure Policy
//!
//! Every failed folder is counted. A finisher result (TLS problems, bad
//! server version, uninstalled server) aborts at once; more than
//! [`MAX_FAILED_RESULTS`](ocsync_core::domain::MAX_FAILED_RESULTS) failures
//! abort as "too many retries".

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ocsync_core::{
    domain::{
        AbortReason, FailureVerdict, FileId, FileKind, OperationResult, RemoteFile, RemotePath,
        SyncReport, SyncSession, TransportFailure,
    },
    ports::{
        IDownloadScheduler, IFileStorage, IRemoteFolderLister, IServerInfo, ISyncNotifier,
        SyncNotification,
    },
};

use crate::{folder::SynchronizeFolderOperation, SyncError};

/// What to synchronize
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Top of the tree to walk
    pub root: RemotePath,
    /// Requested by the user rather than by a scheduler
    pub manual: bool,
}

impl SyncRequest {
    /// Background sync of the whole account
    pub fn background() -> Self {
        Self {
            root: RemotePath::root(),
            manual: false,
        }
    }
}

/// How the walk ended
enum WalkEnd {
    Completed,
    Cancelled,
    Aborted(AbortReason),
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Runs sync sessions against one account
pub struct SyncOrchestrator {
    folder_op: SynchronizeFolderOperation,
    storage: Arc<dyn IFileStorage>,
    notifier: Arc<dyn ISyncNotifier>,
    server_info: Option<Arc<dyn IServerInfo>>,
    downloads: Option<Arc<dyn IDownloadScheduler>>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with the required ports
    ///
    /// # Arguments
    /// * `lister` - Remote folder listings
    /// * `storage` - Local records of remote files
    /// * `notifier` - Progress and failure reporting
    pub fn new(
        lister: Arc<dyn IRemoteFolderLister>,
        storage: Arc<dyn IFileStorage>,
        notifier: Arc<dyn ISyncNotifier>,
    ) -> Self {
        Self {
            folder_op: SynchronizeFolderOperation::new(lister, Arc::clone(&storage)),
            storage,
            notifier,
            server_info: None,
            downloads: None,
        }
    }

    /// Checks the server status before walking the tree
    pub fn with_server_check(mut self, server_info: Arc<dyn IServerInfo>) -> Self {
        self.server_info = Some(server_info);
        self
    }

    /// Hands changed keep-in-sync files to a download scheduler
    pub fn with_download_scheduler(mut self, downloads: Arc<dyn IDownloadScheduler>) -> Self {
        self.downloads = Some(downloads);
        self
    }

    /// Runs one sync session
    ///
    /// Cancellation is observed before each folder; folders already
    /// synchronized stay applied.
    ///
    /// # Returns
    /// The final session report. Remote and storage failures are part of
    /// the report, not errors.
    ///
    /// # Errors
    /// Returns [`SyncError::DomainError`] if a session state transition is
    /// rejected.
    #[tracing::instrument(skip(self, request, cancel), fields(root = %request.root, manual = request.manual))]
    pub async fn run(
        &self,
        request: SyncRequest,
        cancel: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let mut session = SyncSession::new(request.manual);
        let session_ts = Utc::now();
        session.start(session_ts)?;

        info!(session_id = %session.id(), "Starting sync session");
        self.notify(&SyncNotification::started()).await;

        let end = match self.check_server(&mut session).await {
            Some(reason) => WalkEnd::Aborted(reason),
            None => self.walk(&mut session, &request.root, &cancel).await,
        };

        let now = Utc::now();
        match end {
            WalkEnd::Completed => session.complete(now)?,
            WalkEnd::Cancelled => session.cancel(now)?,
            WalkEnd::Aborted(reason) => session.abort(reason, now)?,
        }

        Ok(self.finish(&session).await)
    }

    /// Returns the abort reason if the server check ends the session
    async fn check_server(&self, session: &mut SyncSession) -> Option<AbortReason> {
        let server_info = self.server_info.as_ref()?;

        let verdict = match server_info.server_status().await {
            Ok(status) => {
                debug!(
                    version = status.version_string.as_deref().unwrap_or("-"),
                    "Server status received"
                );
                status.verdict()
            }
            Err(result) => result,
        };
        if verdict.is_success() {
            return None;
        }

        warn!(code = %verdict.code(), "Server check failed: {}", verdict.log_message());
        match session.record_preflight_failure(verdict) {
            FailureVerdict::Abort(reason) => Some(reason),
            FailureVerdict::Continue => None,
        }
    }

    async fn walk(
        &self,
        session: &mut SyncSession,
        root: &RemotePath,
        cancel: &CancellationToken,
    ) -> WalkEnd {
        let Some(session_ts) = session.started_at() else {
            return WalkEnd::Completed;
        };

        let root_id = match self.ensure_root(root).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Cannot prepare root folder record");
                let result = OperationResult::from_failure(TransportFailure::Io, format!("{e:#}"));
                // Nothing can be walked without the start folder's record.
                return match session.record_failure(result) {
                    FailureVerdict::Abort(reason) => WalkEnd::Aborted(reason),
                    FailureVerdict::Continue => WalkEnd::Aborted(AbortReason::RootUnavailable),
                };
            }
        };

        // Children are pushed in reverse so they pop in listing order.
        let mut pending: Vec<(RemotePath, FileId)> = vec![(root.clone(), root_id)];
        while let Some((folder_path, folder_id)) = pending.pop() {
            if cancel.is_cancelled() {
                info!(next = %folder_path, "Sync cancelled");
                return WalkEnd::Cancelled;
            }

            let outcome = self
                .folder_op
                .execute(&folder_path, session_ts, &folder_id)
                .await;
            self.notify(&SyncNotification::folder_visited(folder_path.clone()))
                .await;

            if outcome.result.is_success() {
                session.record_success();
                self.schedule_downloads(&outcome.files_to_refresh).await;
                pending.extend(
                    outcome
                        .children
                        .iter()
                        .rev()
                        .map(|child| (child.remote_path.clone(), child.id)),
                );
                continue;
            }

            if let FailureVerdict::Abort(reason) = session.record_failure(outcome.result) {
                warn!(
                    folder = %folder_path,
                    failed_results = session.failed_results(),
                    ?reason,
                    "Aborting sync session"
                );
                return WalkEnd::Aborted(reason);
            }
        }

        WalkEnd::Completed
    }

    /// Returns the id of the root record, creating the record if needed
    async fn ensure_root(&self, root: &RemotePath) -> anyhow::Result<FileId> {
        if let Some(existing) = self.storage.get_by_path(root).await? {
            return Ok(existing.id);
        }
        let record = RemoteFile::new(root.clone(), FileKind::Directory);
        self.storage.save(&record).await?;
        debug!(root = %root, id = %record.id, "Created root folder record");
        Ok(record.id)
    }

    async fn schedule_downloads(&self, files: &[RemoteFile]) {
        if files.is_empty() {
            return;
        }
        let Some(downloads) = &self.downloads else {
            debug!(count = files.len(), "No download scheduler; changed files left as is");
            return;
        };
        for file in files {
            if let Err(e) = downloads.schedule_download(file).await {
                warn!(path = %file.remote_path, error = %e, "Failed to schedule download");
            }
        }
    }

    async fn finish(&self, session: &SyncSession) -> SyncReport {
        let report = session.report();

        info!(
            state = %report.state,
            folders_synced = report.stats.folders_synced,
            folders_failed = report.stats.folders_failed,
            failed_results = report.failed_results,
            too_many_retries = report.too_many_retries,
            "Sync session finished"
        );

        if session.should_notify_user() {
            if let Err(e) = self.notifier.notify_failed_synchronization(&report).await {
                warn!(error = %e, "Failed to notify user about failed sync");
            }
        }

        self.notify(&SyncNotification::finished(report.last_failed.clone()))
            .await;
        report
    }

    async fn notify(&self, notification: &SyncNotification) {
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(error = %e, "Failed to deliver sync notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use ocsync_core::domain::{ResultCode, ServerStatus, SyncState};

    use super::*;
    use crate::testing::{
        dir_entry, file_entry, path, FakeLister, FakeServerInfo, MemoryStorage,
        RecordingNotifier, RecordingScheduler,
    };

    /// Tree `/A/{B, C/{D}}` below the root
    fn tree(lister: &FakeLister) {
        lister.add_folder("/", vec![dir_entry("/A")]);
        lister.add_folder(
            "/A",
            vec![dir_entry("/A/B"), file_entry("/A/f.txt", 3), dir_entry("/A/C")],
        );
        lister.add_folder("/A/B", vec![]);
        lister.add_folder("/A/C", vec![dir_entry("/A/C/D")]);
        lister.add_folder("/A/C/D", vec![file_entry("/A/C/D/deep.txt", 7)]);
    }

    struct Harness {
        lister: Arc<FakeLister>,
        storage: Arc<MemoryStorage>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                lister: Arc::new(FakeLister::new()),
                storage: Arc::new(MemoryStorage::with_root()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn orchestrator(&self) -> SyncOrchestrator {
            SyncOrchestrator::new(
                self.lister.clone(),
                self.storage.clone(),
                self.notifier.clone(),
            )
        }
    }

    fn paths(list: &[&str]) -> Vec<RemotePath> {
        list.iter().map(|p| path(p)).collect()
    }

    #[tokio::test]
    async fn test_walk_is_preorder_in_listing_order() {
        let h = Harness::new();
        tree(&h.lister);

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        assert_eq!(h.lister.visited(), paths(&["/", "/A", "/A/B", "/A/C", "/A/C/D"]));
        assert_eq!(
            h.notifier.visited_folders(),
            paths(&["/", "/A", "/A/B", "/A/C", "/A/C/D"])
        );
        assert_eq!(report.stats.folders_synced, 5);
        assert!(h.storage.get(&path("/A/C/D/deep.txt")).is_some());
    }

    #[tokio::test]
    async fn test_start_and_end_notifications() {
        let h = Harness::new();
        tree(&h.lister);

        h.orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        let notifications = h.notifier.notifications();
        assert_eq!(notifications.first(), Some(&SyncNotification::started()));
        assert_eq!(notifications.last(), Some(&SyncNotification::finished(None)));
        assert_eq!(notifications.len(), 7);
    }

    #[tokio::test]
    async fn test_cancel_between_siblings() {
        let h = Harness::new();
        tree(&h.lister);
        let cancel = CancellationToken::new();
        h.lister.cancel_after("/A/B", cancel.clone());

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), cancel)
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Cancelled);
        assert_eq!(h.lister.visited(), paths(&["/", "/A", "/A/B"]));
        // B was applied and stays applied.
        assert!(h.storage.get(&path("/A/B")).unwrap().last_sync.is_some());
        assert_eq!(
            h.notifier.notifications().last(),
            Some(&SyncNotification::finished(None))
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_visits_nothing() {
        let h = Harness::new();
        tree(&h.lister);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), cancel)
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Cancelled);
        assert!(h.lister.visited().is_empty());
    }

    #[tokio::test]
    async fn test_finisher_aborts_immediately() {
        let h = Harness::new();
        tree(&h.lister);
        h.lister.fail_folder(
            "/A/B",
            OperationResult::from_failure(
                TransportFailure::Tls {
                    recoverable: true,
                    certificate_chain: Some("CN=self-signed".to_string()),
                },
                "invalid peer certificate",
            ),
        );

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.state,
            SyncState::Aborted {
                reason: AbortReason::Finisher(ResultCode::SslRecoverablePeerUnverified)
            }
        );
        assert_eq!(h.lister.visited(), paths(&["/", "/A", "/A/B"]));
        let last = report.last_failed.unwrap();
        assert_eq!(last.code(), ResultCode::SslRecoverablePeerUnverified);
        assert_eq!(
            h.notifier.notifications().last().unwrap().result,
            Some(last)
        );
    }

    #[tokio::test]
    async fn test_too_many_failures_abort() {
        let h = Harness::new();
        h.lister.add_folder(
            "/",
            vec![
                dir_entry("/1"),
                dir_entry("/2"),
                dir_entry("/3"),
                dir_entry("/4"),
                dir_entry("/5"),
            ],
        );
        for folder in ["/1", "/2", "/3", "/4", "/5"] {
            h.lister.fail_folder(
                folder,
                OperationResult::from_failure(TransportFailure::Timeout, "timed out"),
            );
        }

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.state,
            SyncState::Aborted {
                reason: AbortReason::TooManyFailures
            }
        );
        assert_eq!(report.failed_results, 4);
        assert!(report.too_many_retries);
        assert_eq!(h.lister.visited().len(), 5);
        assert_eq!(report.stats.io_failures, 4);
    }

    #[tokio::test]
    async fn test_few_failures_complete() {
        let h = Harness::new();
        tree(&h.lister);
        h.lister
            .fail_folder("/A/B", OperationResult::from_response(false, 404));

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        assert_eq!(report.failed_results, 1);
        assert!(!report.too_many_retries);
        assert!(h.notifier.failed_reports().is_empty());
        assert_eq!(h.lister.visited().len(), 5);
    }

    #[tokio::test]
    async fn test_manual_failure_notifies_user() {
        let h = Harness::new();
        tree(&h.lister);
        h.lister
            .fail_folder("/A/C/D", OperationResult::from_response(false, 403));

        let report = h
            .orchestrator()
            .run(
                SyncRequest {
                    root: RemotePath::root(),
                    manual: true,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        assert!(report.too_many_retries);
        assert_eq!(report.stats.auth_failures, 1);
        let failed = h.notifier.failed_reports();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].session_id, report.session_id);
    }

    #[tokio::test]
    async fn test_bad_server_version_aborts_before_walk() {
        let h = Harness::new();
        tree(&h.lister);
        let server = FakeServerInfo(Ok(ServerStatus {
            installed: true,
            maintenance: false,
            version: Some("3.0.0".to_string()),
            version_string: Some("3.0".to_string()),
        }));

        let report = h
            .orchestrator()
            .with_server_check(Arc::new(server))
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.state,
            SyncState::Aborted {
                reason: AbortReason::Finisher(ResultCode::BadOcVersion)
            }
        );
        assert_eq!(report.failed_results, 0);
        assert!(h.lister.visited().is_empty());
        assert_eq!(
            report.last_failed.map(|r| r.code()),
            Some(ResultCode::BadOcVersion)
        );
    }

    #[tokio::test]
    async fn test_unreachable_status_does_not_abort() {
        let h = Harness::new();
        tree(&h.lister);
        let server = FakeServerInfo(Err(OperationResult::from_failure(
            TransportFailure::Timeout,
            "timed out",
        )));

        let report = h
            .orchestrator()
            .with_server_check(Arc::new(server))
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        assert_eq!(report.failed_results, 0);
        assert_eq!(report.last_failed.map(|r| r.code()), Some(ResultCode::Timeout));
    }

    #[tokio::test]
    async fn test_vanished_folder_is_removed() {
        let h = Harness::new();
        tree(&h.lister);
        h.orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();
        assert!(h.storage.get(&path("/A/C/D")).is_some());

        h.lister
            .add_folder("/A", vec![dir_entry("/A/B"), file_entry("/A/f.txt", 3)]);
        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        assert!(h.storage.get(&path("/A/C")).is_none());
        assert!(h.storage.get(&path("/A/C/D")).is_none());
        assert!(h.storage.get(&path("/A/C/D/deep.txt")).is_none());
        assert!(h.storage.get(&path("/A/B")).is_some());
    }

    #[tokio::test]
    async fn test_changed_keep_in_sync_files_are_scheduled() {
        let h = Harness::new();
        let mut changed = file_entry("/doc.odt", 10);
        changed.modified = Some(Utc::now());
        h.lister.add_folder("/", vec![changed]);

        let mut local = RemoteFile::new(path("/doc.odt"), FileKind::File);
        local.parent_id = Some(h.storage.root().id);
        local.keep_in_sync = true;
        local.modified = Some(Utc::now() - chrono::Duration::days(2));
        h.storage.insert(local);

        let scheduler = Arc::new(RecordingScheduler::default());
        h.orchestrator()
            .with_download_scheduler(scheduler.clone())
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*scheduler.scheduled.lock().unwrap(), paths(&["/doc.odt"]));
    }

    #[tokio::test]
    async fn test_missing_root_record_is_created() {
        let h = Harness {
            lister: Arc::new(FakeLister::new()),
            storage: Arc::new(MemoryStorage::new()),
            notifier: Arc::new(RecordingNotifier::default()),
        };
        h.lister.add_folder("/", vec![file_entry("/a.txt", 1)]);

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        let root = h.storage.root();
        assert_eq!(h.storage.get(&path("/a.txt")).unwrap().parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_notifier_failures_do_not_stop_the_session() {
        let h = Harness::new();
        tree(&h.lister);
        h.notifier.fail_delivery.store(true, Ordering::SeqCst);

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Completed);
        assert_eq!(h.lister.visited().len(), 5);
    }

    #[tokio::test]
    async fn test_finisher_keeps_earlier_folders_applied() {
        let h = Harness::new();
        tree(&h.lister);
        // 500 is a finisher: the instance is not configured.
        h.lister
            .fail_folder("/A/C", OperationResult::from_response(false, 500));

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.state,
            SyncState::Aborted {
                reason: AbortReason::Finisher(ResultCode::InstanceNotConfigured)
            }
        );
        assert_eq!(h.lister.visited(), paths(&["/", "/A", "/A/B", "/A/C"]));
        assert_eq!(
            h.storage.get(&path("/A/B")).unwrap().last_sync,
            report.started_at
        );
        assert!(h.storage.get(&path("/A/f.txt")).is_some());
        assert!(h.storage.get(&path("/A/C/D")).is_none());
    }

    #[tokio::test]
    async fn test_unavailable_root_record_aborts() {
        let h = Harness::new();
        tree(&h.lister);
        h.storage.fail_reads();

        let report = h
            .orchestrator()
            .run(SyncRequest::background(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.state,
            SyncState::Aborted {
                reason: AbortReason::RootUnavailable
            }
        );
        assert!(h.lister.visited().is_empty());
        assert_eq!(report.failed_results, 1);
        assert_eq!(report.stats.io_failures, 1);
        assert_eq!(
            report.last_failed.map(|r| r.code()),
            Some(ResultCode::UnknownError)
        );
    }
}
