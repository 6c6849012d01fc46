//! Session status, events and operation reports.

use crate::notifier::RemoteChange;
use chrono::{DateTime, Utc};
use quotesync_protocol::{ConflictInfo, Payload, QuotationDocument, ResolutionStrategy};
use std::fmt;

/// Sync status of a session, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing in progress.
    #[default]
    Idle,
    /// A push or pull is in flight.
    Syncing,
    /// The network is unavailable.
    Offline,
    /// A conflict waits for a resolution.
    Conflict,
    /// The last operation failed.
    Error,
}

impl SyncStatus {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Offline => "offline",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Pushes the server accepted.
    pub pushes_accepted: u64,
    /// Pushes rejected for a stale version.
    pub pushes_rejected: u64,
    /// Automatic rebases of non-overlapping edits.
    pub fast_forwards: u64,
    /// Conflicts surfaced to the caller.
    pub conflicts_detected: u64,
    /// Conflicts resolved by a non-cancel strategy.
    pub conflicts_resolved: u64,
    /// Pulls that completed.
    pub pulls: u64,
    /// Transport retries.
    pub retries: u64,
    /// Draft reads or writes that failed.
    pub storage_failures: u64,
    /// Last time the replica matched the server.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a push cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PushReport {
    /// The replica holds no unsynced edits; nothing was pushed.
    Clean,
    /// Another push is in flight; the timer was re-armed instead.
    AlreadyInFlight,
    /// The server accepted the push.
    Accepted {
        /// New version.
        version: u64,
    },
    /// The push was rejected, rebased onto the server copy and accepted.
    FastForwarded {
        /// New version.
        version: u64,
        /// Rebases performed.
        rebases: u32,
    },
    /// The replica was rebased but the rebase limit was reached; the next
    /// timer fire pushes again.
    Deferred {
        /// Server version the replica is now based on.
        server_version: u64,
    },
    /// A conflict was surfaced.
    Conflict(ConflictInfo),
}

impl PushReport {
    /// Returns the version accepted by the server, if the push went through.
    pub fn accepted_version(&self) -> Option<u64> {
        match self {
            PushReport::Accepted { version } | PushReport::FastForwarded { version, .. } => {
                Some(*version)
            }
            _ => None,
        }
    }
}

/// Result of a pull.
#[derive(Debug, Clone, PartialEq)]
pub enum PullReport {
    /// The replica already holds the server version.
    UpToDate {
        /// Current version.
        version: u64,
    },
    /// The server copy replaced the clean replica.
    Updated {
        /// New version.
        version: u64,
    },
    /// The server is ahead but the replica has unsynced edits; the next
    /// push runs the detector.
    Suspected {
        /// Server version.
        server_version: u64,
    },
}

/// Result of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionReport {
    /// No conflict was pending.
    NothingToResolve,
    /// The conflict stays pending.
    Cancelled,
    /// Local edits were dropped in favor of the server copy.
    Adopted {
        /// Version adopted.
        version: u64,
    },
    /// The resolved payload was pushed.
    Pushed(PushReport),
    /// Resolved locally while offline; the push runs after reconnecting.
    Queued,
}

/// A discrete input to a session.
#[derive(Debug, Clone)]
pub enum SyncInput {
    /// Local edit.
    Mutate(Payload),
    /// The debounce deadline passed.
    TimerElapsed,
    /// Connectivity signal.
    Reachability(bool),
    /// Another session wrote the document.
    RemoteChanged(RemoteChange),
    /// The user picked a resolution.
    Resolve(ResolutionStrategy),
    /// Push now.
    ForcePush,
    /// Pull now.
    ForcePull,
}

/// What handling a [`SyncInput`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Nothing observable happened.
    None,
    /// A push cycle ran.
    Pushed(PushReport),
    /// A pull ran.
    Pulled(PullReport),
    /// A resolution ran.
    Resolved(ResolutionReport),
}

/// Callbacks for the UI or business layer.
///
/// Called outside the session lock, so implementations may call back into
/// the coordinator.
pub trait SyncObserver: Send + Sync {
    /// A new conflict was detected. Answer with exactly one `resolve` call.
    fn on_conflict(&self, _conflict: &ConflictInfo) {}

    /// Another session's write was pulled in without conflict.
    fn on_remote_update(&self, _document: &QuotationDocument) {}

    /// The session status changed.
    fn on_status_change(&self, _status: SyncStatus) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names() {
        assert_eq!(SyncStatus::default(), SyncStatus::Idle);
        assert_eq!(SyncStatus::Conflict.to_string(), "conflict");
        assert_eq!(SyncStatus::Offline.as_str(), "offline");
    }

    #[test]
    fn accepted_version() {
        assert_eq!(PushReport::Accepted { version: 5 }.accepted_version(), Some(5));
        assert_eq!(
            PushReport::FastForwarded { version: 6, rebases: 1 }.accepted_version(),
            Some(6)
        );
        assert_eq!(PushReport::Clean.accepted_version(), None);
    }
}
