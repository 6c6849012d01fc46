//! # quotesync_engine
//!
//! Replica synchronization for quotation documents.
//!
//! A session holds a working copy of one document, edits it optimistically
//! and keeps it consistent with the authoritative copy behind a
//! [`RemoteGateway`]. Writes use compare-and-swap on a single linear
//! version counter:
//!
//! - local edits mark the copy dirty and arm a debounced autosave
//! - a push based on a stale version is rejected with the server state
//! - non-overlapping edits are rebased and pushed again automatically
//! - overlapping edits surface a [`ConflictInfo`](quotesync_protocol::ConflictInfo)
//!   that blocks further writes until [`SyncCoordinator::resolve`] is called
//!
//! Sessions sharing a document learn about each other's writes through a
//! [`SessionBus`]. Unsynced edits survive a restart as drafts in a
//! [`PersistentStorage`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use quotesync_engine::{MemoryStorage, SyncConfig, SyncCoordinator};
//!
//! let session = SyncCoordinator::new(SyncConfig::interactive(), gateway, MemoryStorage::new());
//! session.open(id).await?;
//! session.mutate(&patch)?;
//! session.force_push().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod detector;
mod driver;
mod error;
mod gateway;
mod http;
mod notifier;
mod persistence;
mod reachability;
mod report;
mod resolution;
mod scheduler;
mod store;

pub use config::{RetryConfig, SyncConfig};
pub use coordinator::SyncCoordinator;
pub use detector::{carry_local_changes, detect, Detection};
pub use driver::run_session;
pub use error::{SyncError, SyncResult};
pub use gateway::{MockGateway, RemoteGateway};
pub use http::{
    HttpClient, HttpGateway, HttpResponse, LoopbackClient, LoopbackServer, PULL_ENDPOINT,
    PUSH_ENDPOINT,
};
pub use notifier::{RemoteChange, SessionBus};
pub use persistence::{
    DraftRecord, FileStorage, MemoryStorage, PersistentStorage, StorageError, StorageResult,
};
pub use reachability::{Reachability, ReachabilityMonitor, ReachabilityTransition};
pub use report::{
    PullReport, PushReport, ResolutionReport, SyncInput, SyncObserver, SyncOutcome, SyncStats,
    SyncStatus,
};
pub use resolution::{merge, plan, PendingConflict, ResolutionPlan};
pub use scheduler::AutosaveScheduler;
pub use store::DocumentStore;
