//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use quotesync_engine::{
    LoopbackServer, MemoryStorage, RemoteGateway, SessionBus, SyncConfig, SyncCoordinator,
    SyncError, SyncObserver, SyncResult, SyncStatus,
};
use quotesync_protocol::{
    ConflictInfo, PullRequest, PushOutcome, PushRequest, QuotationDocument,
};
use quotesync_server::{QuotationServer, ServerError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A gateway that calls an in-process server directly.
pub struct LocalGateway {
    server: Arc<QuotationServer>,
    reachable: AtomicBool,
    pushes: AtomicUsize,
    pulls: AtomicUsize,
}

impl LocalGateway {
    pub fn new(server: Arc<QuotationServer>) -> Self {
        Self {
            server,
            reachable: AtomicBool::new(true),
            pushes: AtomicUsize::new(0),
            pulls: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn push_calls(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::transport_retryable("connection refused"))
        }
    }
}

fn to_sync_error(err: ServerError) -> SyncError {
    let message = err.to_string();
    match err {
        ServerError::Validation(violations) => SyncError::Validation {
            message,
            violations,
        },
        ServerError::DocumentNotFound(_) => SyncError::DocumentNotFound,
        _ => SyncError::Protocol(message),
    }
}

impl RemoteGateway for LocalGateway {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushOutcome> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.server
            .handle_push(request.clone())
            .map(|response| response.into_outcome())
            .map_err(to_sync_error)
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<QuotationDocument> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.server
            .handle_pull(request.clone())
            .map(|response| response.into_document())
            .map_err(to_sync_error)
    }
}

/// Serves loopback HTTP requests from a shared server.
pub struct SharedServer(pub Arc<QuotationServer>);

impl LoopbackServer for SharedServer {
    fn handle_post(&self, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        self.0.handle_post(path, body)
    }
}

/// Records every observer callback.
#[derive(Default)]
pub struct Recorder {
    pub conflicts: Mutex<Vec<ConflictInfo>>,
    pub remote_updates: Mutex<Vec<u64>>,
    pub statuses: Mutex<Vec<SyncStatus>>,
}

impl SyncObserver for Recorder {
    fn on_conflict(&self, conflict: &ConflictInfo) {
        self.conflicts.lock().push(conflict.clone());
    }

    fn on_remote_update(&self, document: &QuotationDocument) {
        self.remote_updates.lock().push(document.version);
    }

    fn on_status_change(&self, status: SyncStatus) {
        self.statuses.lock().push(status);
    }
}

pub type LocalSession = SyncCoordinator<Arc<LocalGateway>, Arc<MemoryStorage>>;

/// A session with its own gateway, storage and observer.
pub struct Harness {
    pub session: Arc<LocalSession>,
    pub gateway: Arc<LocalGateway>,
    pub storage: Arc<MemoryStorage>,
    pub recorder: Arc<Recorder>,
}

impl Harness {
    pub fn new(server: &Arc<QuotationServer>) -> Self {
        Self::build(server, SyncConfig::interactive(), Arc::new(MemoryStorage::new()), None)
    }

    pub fn with_bus(server: &Arc<QuotationServer>, bus: &Arc<SessionBus>) -> Self {
        Self::build(
            server,
            SyncConfig::interactive(),
            Arc::new(MemoryStorage::new()),
            Some(Arc::clone(bus)),
        )
    }

    pub fn build(
        server: &Arc<QuotationServer>,
        config: SyncConfig,
        storage: Arc<MemoryStorage>,
        bus: Option<Arc<SessionBus>>,
    ) -> Self {
        let gateway = Arc::new(LocalGateway::new(Arc::clone(server)));
        let recorder = Arc::new(Recorder::default());
        let mut session =
            SyncCoordinator::new(config, Arc::clone(&gateway), Arc::clone(&storage))
                .with_observer(recorder.clone());
        if let Some(bus) = bus {
            session = session.with_bus(bus);
        }
        Self {
            session: Arc::new(session),
            gateway,
            storage,
            recorder,
        }
    }
}
