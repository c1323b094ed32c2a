//! SyncSession domain entity
//!
//! This module defines the per-run state of a synchronization session: the
//! session timestamp every listed entry gets stamped with, the failure
//! counter and last failed result that drive the abort policy, and the
//! per-kind failure statistics reported to the caller.
//!
//! ## State machine
//!
//! ```text
//! Idle ──start──▶ Running ──complete──▶ Completed
//!                    │
//!                    ├──cancel──▶ Cancelled
//!                    └──abort───▶ Aborted(reason)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::SessionId;
use super::result::{OperationResult, ResultCode, TransportFailure};

/// Counted folder failures a session tolerates before giving up
pub const MAX_FAILED_RESULTS: u32 = 3;

/// Why a session stopped before walking the whole tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "code")]
pub enum AbortReason {
    /// A result whose code can't be fixed by retrying in this session
    Finisher(ResultCode),
    /// More than [`MAX_FAILED_RESULTS`] folders failed
    TooManyFailures,
    /// The record of the folder to start from could not be read or created
    RootUnavailable,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Finisher(code) => write!(f, "unrecoverable result {code}"),
            AbortReason::TooManyFailures => write!(f, "too many failed folders"),
            AbortReason::RootUnavailable => write!(f, "start folder record unavailable"),
        }
    }
}

/// Lifecycle state of a sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SyncState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Aborted { reason: AbortReason },
}

impl SyncState {
    /// Returns true once the session reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SyncState::Completed | SyncState::Cancelled | SyncState::Aborted { .. }
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SyncState::Running)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SyncState::Aborted { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Running => "running",
            SyncState::Completed => "completed",
            SyncState::Cancelled => "cancelled",
            SyncState::Aborted { .. } => "aborted",
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Idle
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Aborted { reason } => write!(f, "aborted: {reason}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Failure statistics collected during a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Folders synchronized successfully
    pub folders_synced: u64,
    /// Folders whose synchronization failed
    pub folders_failed: u64,
    /// Failures where the server rejected the credentials
    pub auth_failures: u64,
    /// Failures where the listing body could not be parsed
    pub parse_failures: u64,
    /// Transport-level failures
    pub io_failures: u64,
}

impl SyncStats {
    fn record_failure(&mut self, result: &OperationResult) {
        self.folders_failed += 1;
        if result.is_auth_failure() {
            self.auth_failures += 1;
        } else if let Some(failure) = result.transport_failure() {
            if *failure == TransportFailure::MalformedResponse {
                self.parse_failures += 1;
            } else {
                self.io_failures += 1;
            }
        }
    }
}

/// What the orchestrator should do after a folder failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    Continue,
    Abort(AbortReason),
}

/// State of one synchronization run
///
/// Owned by the orchestrator for the duration of a single run; never shared
/// between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSession {
    id: SessionId,
    manual: bool,
    state: SyncState,
    /// Stamped on every entry seen in this session; captured on start
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failed_results: u32,
    last_failed: Option<OperationResult>,
    stats: SyncStats,
}

impl SyncSession {
    /// Creates an idle session
    ///
    /// # Arguments
    /// * `manual` - true when a user explicitly asked for this sync
    pub fn new(manual: bool) -> Self {
        Self {
            id: SessionId::new(),
            manual,
            state: SyncState::Idle,
            started_at: None,
            finished_at: None,
            failed_results: 0,
            last_failed: None,
            stats: SyncStats::default(),
        }
    }

    // --- Getters ---

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Session timestamp, `None` until started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Number of counted folder failures
    pub fn failed_results(&self) -> u32 {
        self.failed_results
    }

    pub fn last_failed(&self) -> Option<&OperationResult> {
        self.last_failed.as_ref()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    // --- Transitions ---

    /// Enter `Running`, resetting counters and capturing the session timestamp
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidState`] unless the session is idle.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure(SyncState::Idle, SyncState::Running)?;
        self.state = SyncState::Running;
        self.started_at = Some(now);
        self.failed_results = 0;
        self.last_failed = None;
        self.stats = SyncStats::default();
        Ok(())
    }

    /// Records a folder that synchronized successfully
    pub fn record_success(&mut self) {
        self.stats.folders_synced += 1;
    }

    /// Records a failed folder and decides whether the session goes on
    ///
    /// A finisher code aborts at once; otherwise the session aborts when the
    /// counter exceeds [`MAX_FAILED_RESULTS`].
    pub fn record_failure(&mut self, result: OperationResult) -> FailureVerdict {
        self.failed_results += 1;
        self.stats.record_failure(&result);
        let code = result.code();
        self.last_failed = Some(result);

        if code.is_finisher() {
            FailureVerdict::Abort(AbortReason::Finisher(code))
        } else if self.failed_results > MAX_FAILED_RESULTS {
            FailureVerdict::Abort(AbortReason::TooManyFailures)
        } else {
            FailureVerdict::Continue
        }
    }

    /// Records a failed pre-sync check; it is kept as the last failure but
    /// not counted
    pub fn record_preflight_failure(&mut self, result: OperationResult) -> FailureVerdict {
        let code = result.code();
        self.last_failed = Some(result);
        if code.is_finisher() {
            FailureVerdict::Abort(AbortReason::Finisher(code))
        } else {
            FailureVerdict::Continue
        }
    }

    /// Running → Completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.finish(SyncState::Completed, now)
    }

    /// Running → Cancelled
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.finish(SyncState::Cancelled, now)
    }

    /// Running → Aborted
    pub fn abort(&mut self, reason: AbortReason, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.finish(SyncState::Aborted { reason }, now)
    }

    /// True when the external scheduler should not retry this run right away
    ///
    /// Set when the failure threshold was crossed, and for manual sessions
    /// with any counted failure.
    pub fn too_many_retries(&self) -> bool {
        matches!(
            self.state,
            SyncState::Aborted {
                reason: AbortReason::TooManyFailures
            }
        ) || (self.manual && self.failed_results > 0)
    }

    /// True when the user should be told that a manual sync failed
    pub fn should_notify_user(&self) -> bool {
        self.manual && self.too_many_retries()
    }

    /// Snapshot for the caller
    pub fn report(&self) -> SyncReport {
        SyncReport {
            session_id: self.id,
            manual: self.manual,
            state: self.state,
            started_at: self.started_at,
            finished_at: self.finished_at,
            failed_results: self.failed_results,
            last_failed: self.last_failed.clone(),
            too_many_retries: self.too_many_retries(),
            stats: self.stats,
        }
    }

    fn finish(&mut self, target: SyncState, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure(SyncState::Running, target)?;
        self.state = target;
        self.finished_at = Some(now);
        Ok(())
    }

    fn ensure(&self, expected: SyncState, target: SyncState) -> Result<(), DomainError> {
        if self.state != expected {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: target.name().to_string(),
            });
        }
        Ok(())
    }
}

/// Final summary of a sync session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub session_id: SessionId,
    pub manual: bool,
    pub state: SyncState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_results: u32,
    pub last_failed: Option<OperationResult>,
    pub too_many_retries: bool,
    pub stats: SyncStats,
}
