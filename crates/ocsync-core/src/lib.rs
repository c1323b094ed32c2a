//! ocsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteFile`, `SyncSession`, `OperationResult`, `ChunkPlan`
//! - **Result classifier** - maps transport failures and HTTP statuses to a closed set of codes
//! - **Port definitions** - Traits for adapters: `IRemoteFolderLister`, `IFileStorage`, `ISyncNotifier`
//! - **Configuration** - YAML-backed settings with validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
