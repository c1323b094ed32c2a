//! In-memory port implementations shared by the unit tests

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use ocsync_core::{
    domain::{
        FileId, FileKind, OperationResult, RemoteFile, RemotePath, ServerStatus, SyncReport,
    },
    ports::{
        FolderListing, IDownloadScheduler, IFileStorage, IRemoteFolderLister, IServerInfo,
        ISyncNotifier, RemoteEntry, SyncNotification,
    },
};
use tokio_util::sync::CancellationToken;

pub fn path(p: &str) -> RemotePath {
    RemotePath::new(p.to_string()).unwrap()
}

pub fn dir_entry(p: &str) -> RemoteEntry {
    RemoteEntry {
        remote_path: path(p),
        kind: FileKind::Directory,
        size: 0,
        modified: None,
        mime_type: Some("DIR".to_string()),
        etag: None,
    }
}

pub fn file_entry(p: &str, size: u64) -> RemoteEntry {
    RemoteEntry {
        remote_path: path(p),
        kind: FileKind::File,
        size,
        modified: None,
        mime_type: Some("text/plain".to_string()),
        etag: Some(format!("etag-{size}")),
    }
}

// ============================================================================
// FakeLister
// ============================================================================

/// Serves canned listings and records the order of requests
#[derive(Default)]
pub struct FakeLister {
    folders: Mutex<HashMap<RemotePath, Result<FolderListing, OperationResult>>>,
    visited: Mutex<Vec<RemotePath>>,
    cancel_after: Mutex<Option<(RemotePath, CancellationToken)>>,
}

impl FakeLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, folder: &str, children: Vec<RemoteEntry>) {
        let listing = FolderListing {
            folder: dir_entry(folder),
            children,
        };
        self.folders.lock().unwrap().insert(path(folder), Ok(listing));
    }

    pub fn fail_folder(&self, folder: &str, result: OperationResult) {
        self.folders.lock().unwrap().insert(path(folder), Err(result));
    }

    /// Cancels `token` as soon as `folder` has been listed
    pub fn cancel_after(&self, folder: &str, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((path(folder), token));
    }

    pub fn visited(&self) -> Vec<RemotePath> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl IRemoteFolderLister for FakeLister {
    async fn list_folder(&self, folder: &RemotePath) -> Result<FolderListing, OperationResult> {
        self.visited.lock().unwrap().push(folder.clone());
        if let Some((trigger, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if trigger == folder {
                token.cancel();
            }
        }
        self.folders
            .lock()
            .unwrap()
            .get(folder)
            .cloned()
            .unwrap_or_else(|| Err(OperationResult::from_response(false, 404)))
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// Map-backed file storage
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<FileId, RemoteFile>>,
    removed: Mutex<Vec<(RemotePath, bool)>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    /// 1-based index of the record save that fails inside `apply_folder`
    fail_save_at: Mutex<Option<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root() -> Self {
        let storage = Self::new();
        storage.insert(RemoteFile::root());
        storage
    }

    pub fn root(&self) -> RemoteFile {
        self.get(&RemotePath::root()).unwrap()
    }

    /// Seeds a record without counting it as a write
    pub fn insert(&self, file: RemoteFile) {
        self.files.lock().unwrap().insert(file.id, file);
    }

    pub fn get(&self, p: &RemotePath) -> Option<RemoteFile> {
        self.files
            .lock()
            .unwrap()
            .values()
            .find(|f| &f.remote_path == p)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<RemoteFile> {
        let mut files: Vec<_> = self.files.lock().unwrap().values().cloned().collect();
        files.sort_by(|a, b| a.remote_path.cmp(&b.remote_path));
        files
    }

    pub fn removed(&self) -> Vec<(RemotePath, bool)> {
        self.removed.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Makes the `n`th record save of the next batch fail
    pub fn fail_save_at(&self, n: usize) {
        *self.fail_save_at.lock().unwrap() = Some(n);
    }

    fn check_reads(&self) -> anyhow::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        Ok(())
    }
}

#[async_trait]
impl IFileStorage for MemoryStorage {
    async fn get_by_path(&self, p: &RemotePath) -> anyhow::Result<Option<RemoteFile>> {
        self.check_reads()?;
        Ok(self.get(p))
    }

    async fn children_of(&self, folder_id: &FileId) -> anyhow::Result<Vec<RemoteFile>> {
        self.check_reads()?;
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.parent_id.as_ref() == Some(folder_id))
            .cloned()
            .collect())
    }

    async fn save(&self, file: &RemoteFile) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(file.clone());
        Ok(())
    }

    async fn remove(&self, file: &RemoteFile, also_local_content: bool) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files.lock().unwrap().retain(|_, f| {
            f.id != file.id && !file.remote_path.is_ancestor_of(&f.remote_path)
        });
        self.removed
            .lock()
            .unwrap()
            .push((file.remote_path.clone(), also_local_content));
        Ok(())
    }

    async fn apply_folder(
        &self,
        saves: &[RemoteFile],
        removals: &[RemoteFile],
        also_local_content: bool,
    ) -> anyhow::Result<()> {
        let fail_at = *self.fail_save_at.lock().unwrap();
        let mut files = self.files.lock().unwrap();
        let mut staged = files.clone();

        for file in removals {
            staged.retain(|_, f| {
                f.id != file.id && !file.remote_path.is_ancestor_of(&f.remote_path)
            });
        }
        for (index, file) in saves.iter().enumerate() {
            if fail_at == Some(index + 1) {
                anyhow::bail!("disk I/O error");
            }
            staged.insert(file.id, file.clone());
        }

        *files = staged;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.removed.lock().unwrap().extend(
            removals
                .iter()
                .map(|f| (f.remote_path.clone(), also_local_content)),
        );
        Ok(())
    }
}

// ============================================================================
// Notifier, scheduler and server info
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<SyncNotification>>,
    pub failed_reports: Mutex<Vec<SyncReport>>,
    pub fail_delivery: AtomicBool,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<SyncNotification> {
        self.notifications.lock().unwrap().clone()
    }

    /// Folder paths of the per-folder notifications, in order
    pub fn visited_folders(&self) -> Vec<RemotePath> {
        self.notifications()
            .into_iter()
            .filter_map(|n| n.folder_path)
            .collect()
    }

    pub fn failed_reports(&self) -> Vec<SyncReport> {
        self.failed_reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ISyncNotifier for RecordingNotifier {
    async fn notify(&self, notification: &SyncNotification) -> anyhow::Result<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        if self.fail_delivery.load(Ordering::SeqCst) {
            anyhow::bail!("receiver gone");
        }
        Ok(())
    }

    async fn notify_failed_synchronization(&self, report: &SyncReport) -> anyhow::Result<()> {
        self.failed_reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingScheduler {
    pub scheduled: Mutex<Vec<RemotePath>>,
}

#[async_trait]
impl IDownloadScheduler for RecordingScheduler {
    async fn schedule_download(&self, file: &RemoteFile) -> anyhow::Result<()> {
        self.scheduled.lock().unwrap().push(file.remote_path.clone());
        Ok(())
    }
}

pub struct FakeServerInfo(pub Result<ServerStatus, OperationResult>);

#[async_trait]
impl IServerInfo for FakeServerInfo {
    async fn server_status(&self) -> Result<ServerStatus, OperationResult> {
        self.0.clone()
    }
}
