//! Sync status model and transition rules
//!
//! The reducer is a pure function over `(current display status, event)`.
//! It never does I/O and never panics; sessions are responsible for
//! discarding stale events before applying them here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a remotely-synchronized data source.
///
/// `Idle` covers both "never synced" and "previously synced, now quiescent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No sync in progress
    Idle,
    /// Sync in progress
    Syncing,
    /// Last sync completed successfully
    Success,
    /// Last sync failed (or its status is unknown)
    Error,
}

impl SyncStatus {
    /// A terminal status ends the poll loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Error)
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Idle
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Events that can change a resource's displayed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// User requested a sync; displayed immediately, before any I/O
    SyncRequested,
    /// A status poll returned the server's current status
    PollSucceeded(SyncStatus),
    /// A status poll failed in transport; display is unchanged
    PollFailed,
    /// Consecutive poll failures reached the configured limit
    PollFailureLimitReached,
    /// The success-revert timer fired
    RevertTimerFired,
}

/// Compute the next display status for an event.
///
/// Total over all `(current, event)` pairs:
/// - `SyncRequested` always shows `Syncing` (optimistic, never waits on the
///   network round trip).
/// - `PollSucceeded(s)` adopts `s`; while the server still reports
///   `Syncing` that is a no-op.
/// - `PollFailed` never changes the display; a single transient failure
///   must not flicker to error.
/// - `PollFailureLimitReached` surfaces a definitive `Error`.
/// - `RevertTimerFired` returns `Success` to `Idle` and is ignored in any
///   other state.
pub fn resolve(current: SyncStatus, event: StatusEvent) -> SyncStatus {
    match event {
        StatusEvent::SyncRequested => SyncStatus::Syncing,
        StatusEvent::PollSucceeded(status) => status,
        StatusEvent::PollFailed => current,
        StatusEvent::PollFailureLimitReached => SyncStatus::Error,
        StatusEvent::RevertTimerFired => {
            if current == SyncStatus::Success {
                SyncStatus::Idle
            } else {
                current
            }
        }
    }
}
