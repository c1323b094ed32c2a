//! Single-folder synchronization
//!
//! [`SynchronizeFolderOperation`] lists one folder on the server and brings
//! the local records of that folder's immediate children in line with it:
//!
//! 1. **Listing**: one `PROPFIND` of depth 1 through [`IRemoteFolderLister`]
//! 2. **Lookups**: every local record needed is read up front
//! 3. **Merge**: the folder and each listed child are updated in memory,
//!    stamped with the session timestamp
//! 4. **Pruning**: local children the listing no longer reports, and
//!    records whose kind changed on the server, are marked for removal
//!    (local content included)
//! 5. **Apply**: everything is handed to [`IFileStorage::apply_folder`] in
//!    one batch, so a folder is either fully applied or not at all

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use ocsync_core::{
    domain::{FileId, OperationResult, RemoteFile, RemotePath, TransportFailure},
    ports::{FolderListing, IFileStorage, IRemoteFolderLister, RemoteEntry},
};

/// What one folder synchronization produced
#[derive(Debug, Clone)]
pub struct FolderSyncOutcome {
    /// Classified result of the folder as a whole
    pub result: OperationResult,
    /// Child folders, in listing order; empty on failure
    pub children: Vec<RemoteFile>,
    /// Keep-in-sync files whose remote copy is newer than the local record
    pub files_to_refresh: Vec<RemoteFile>,
}

impl FolderSyncOutcome {
    fn failed(result: OperationResult) -> Self {
        Self {
            result,
            children: Vec::new(),
            files_to_refresh: Vec::new(),
        }
    }
}

/// Records read before any write
struct Snapshot {
    folder: Option<RemoteFile>,
    entries: Vec<(RemoteEntry, Option<RemoteFile>)>,
    known_children: Vec<RemoteFile>,
}

// ============================================================================
// SynchronizeFolderOperation
// ============================================================================

/// Synchronizes the immediate children of one folder
pub struct SynchronizeFolderOperation {
    lister: Arc<dyn IRemoteFolderLister>,
    storage: Arc<dyn IFileStorage>,
}

impl SynchronizeFolderOperation {
    /// # Arguments
    /// * `lister` - Remote folder listings
    /// * `storage` - Local records of remote files
    pub fn new(lister: Arc<dyn IRemoteFolderLister>, storage: Arc<dyn IFileStorage>) -> Self {
        Self { lister, storage }
    }

    /// Lists `folder_path` and merges the listing into local storage
    ///
    /// # Arguments
    /// * `folder_path` - Folder to list
    /// * `session_ts` - Timestamp of the running session; written as
    ///   `last_sync` on every reported entry
    /// * `folder_id` - Local id of the folder; becomes the children's parent
    ///
    /// # Returns
    /// The classified result. Storage failures are reported as
    /// `UnknownError` results.
    #[tracing::instrument(skip(self, session_ts, folder_id), fields(folder = %folder_path))]
    pub async fn execute(
        &self,
        folder_path: &RemotePath,
        session_ts: DateTime<Utc>,
        folder_id: &FileId,
    ) -> FolderSyncOutcome {
        let listing = match self.lister.list_folder(folder_path).await {
            Ok(listing) => listing,
            Err(result) => {
                warn!(code = %result.code(), "Listing failed: {}", result.log_message());
                return FolderSyncOutcome::failed(result);
            }
        };

        let snapshot = match self.snapshot(folder_path, folder_id, &listing).await {
            Ok(snapshot) => snapshot,
            Err(e) => return FolderSyncOutcome::failed(storage_failure("read", e)),
        };

        match self.apply(snapshot, &listing, session_ts, folder_id).await {
            Ok(outcome) => outcome,
            Err(e) => FolderSyncOutcome::failed(storage_failure("write", e)),
        }
    }

    async fn snapshot(
        &self,
        folder_path: &RemotePath,
        folder_id: &FileId,
        listing: &FolderListing,
    ) -> anyhow::Result<Snapshot> {
        let folder = self.storage.get_by_path(folder_path).await?;
        let mut entries = Vec::with_capacity(listing.children.len());
        for entry in &listing.children {
            let existing = self.storage.get_by_path(&entry.remote_path).await?;
            entries.push((entry.clone(), existing));
        }
        let known_children = self.storage.children_of(folder_id).await?;
        Ok(Snapshot {
            folder,
            entries,
            known_children,
        })
    }

    async fn apply(
        &self,
        snapshot: Snapshot,
        listing: &FolderListing,
        session_ts: DateTime<Utc>,
        folder_id: &FileId,
    ) -> anyhow::Result<FolderSyncOutcome> {
        let mut folder = snapshot.folder.unwrap_or_else(|| {
            let mut record = RemoteFile::new(listing.folder.remote_path.clone(), listing.folder.kind);
            record.id = *folder_id;
            record
        });
        folder.etag = listing.folder.etag.clone();
        folder.modified = listing.folder.modified;
        folder.last_sync = Some(session_ts);

        let mut saves = Vec::with_capacity(snapshot.entries.len() + 1);
        saves.push(folder);
        let mut removals = Vec::new();
        let mut children = Vec::new();
        let mut files_to_refresh = Vec::new();
        let mut reported = HashSet::with_capacity(snapshot.entries.len());

        for (entry, existing) in snapshot.entries {
            let merged = merge_entry(entry, existing, folder_id, session_ts);
            if let Some(replaced) = merged.replaced {
                debug!(
                    path = %replaced.remote_path,
                    from = %replaced.kind,
                    to = %merged.record.kind,
                    "Entry changed kind on the server"
                );
                removals.push(replaced);
            }
            let record = merged.record;
            reported.insert(record.remote_path.clone());

            if merged.refresh {
                debug!(path = %record.remote_path, "Keep-in-sync file changed remotely");
                files_to_refresh.push(record.clone());
            }
            if record.is_directory() {
                children.push(record.clone());
            }
            saves.push(record);
        }

        for stale in snapshot
            .known_children
            .into_iter()
            .filter(|c| !reported.contains(&c.remote_path) && c.is_stale(session_ts))
        {
            debug!(path = %stale.remote_path, "Removing entry no longer on the server");
            removals.push(stale);
        }

        self.storage.apply_folder(&saves, &removals, true).await?;

        info!(
            entries = reported.len(),
            folders = children.len(),
            removed = removals.len(),
            refresh = files_to_refresh.len(),
            "Folder synchronized"
        );

        Ok(FolderSyncOutcome {
            result: OperationResult::from_response(true, 207),
            children,
            files_to_refresh,
        })
    }
}

/// A listed entry merged with its local record
struct MergedEntry {
    record: RemoteFile,
    /// A keep-in-sync download is due
    refresh: bool,
    /// Old record at the same path that must go because the kind changed
    replaced: Option<RemoteFile>,
}

/// Builds the record for a listed entry, keeping local identity and flags
///
/// A record whose kind differs from the entry is not reused: a former
/// folder's descendants and a former file's content both have to go.
fn merge_entry(
    entry: RemoteEntry,
    existing: Option<RemoteFile>,
    folder_id: &FileId,
    session_ts: DateTime<Utc>,
) -> MergedEntry {
    let (mut record, replaced) = match existing {
        Some(known) if known.kind == entry.kind => (known, None),
        other => (RemoteFile::new(entry.remote_path.clone(), entry.kind), other),
    };

    let refresh = record.keep_in_sync
        && !entry.is_directory()
        && match (entry.modified, record.modified) {
            (Some(remote), Some(local)) => remote > local,
            (Some(_), None) => true,
            _ => false,
        };

    record.parent_id = Some(*folder_id);
    record.size = entry.size;
    record.modified = entry.modified;
    record.mime_type = entry.mime_type;
    record.etag = entry.etag;
    record.last_sync = Some(session_ts);
    MergedEntry {
        record,
        refresh,
        replaced,
    }
}

fn storage_failure(stage: &str, err: anyhow::Error) -> OperationResult {
    warn!(error = %err, "Local storage {stage} failed");
    OperationResult::from_failure(TransportFailure::Io, format!("storage {stage}: {err:#}"))
}
