//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteFolderLister`] - Single-level WebDAV folder listings
//! - [`IServerInfo`] - Server installation and version status
//! - [`IFileStorage`] - Persistent records of remote files and folders
//! - [`ISyncNotifier`] - Progress and failure reporting
//! - [`ITransferProgressListener`] - Byte-level upload progress
//! - [`IDownloadScheduler`] - Content refresh of keep-in-sync files

pub mod file_storage;
pub mod notification;
pub mod remote;
pub mod transfer;

pub use file_storage::IFileStorage;
pub use notification::{ISyncNotifier, SyncNotification};
pub use remote::{FolderListing, IRemoteFolderLister, IServerInfo, RemoteEntry};
pub use transfer::{IDownloadScheduler, ITransferProgressListener};
