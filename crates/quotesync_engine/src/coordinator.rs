//! Per-session sync state machine.
//!
//! The coordinator owns the working copy of one document and reacts to
//! discrete inputs: local edits, timer fires, push and pull results,
//! reachability changes, cross-session notifications and resolutions.
//! All state sits behind one lock that is never held across an `.await`;
//! observers are called after the lock is released.

use crate::config::SyncConfig;
use crate::detector::{detect, Detection};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::notifier::{RemoteChange, SessionBus};
use crate::persistence::{DraftRecord, PersistentStorage};
use crate::reachability::{ReachabilityMonitor, ReachabilityTransition};
use crate::report::{
    PullReport, PushReport, ResolutionReport, SyncInput, SyncObserver, SyncOutcome, SyncStats,
    SyncStatus,
};
use crate::resolution::{plan, PendingConflict, ResolutionPlan};
use crate::scheduler::AutosaveScheduler;
use crate::store::DocumentStore;
use chrono::Utc;
use parking_lot::Mutex;
use quotesync_protocol::{
    ConflictInfo, DocumentId, Payload, PullRequest, PushOutcome, PushRequest, QuotationDocument,
    ResolutionStrategy,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

enum Event {
    Status(SyncStatus),
    Conflict(ConflictInfo),
    RemoteUpdate(QuotationDocument),
}

enum PushStep {
    Continue(PushRequest),
    Done(SyncResult<PushReport>),
}

struct SessionState {
    store: Option<DocumentStore>,
    status: SyncStatus,
    pending: Option<PendingConflict>,
    scheduler: AutosaveScheduler,
    monitor: ReachabilityMonitor,
    in_flight: bool,
    /// Informational only. The next push runs as usual; a stale base is
    /// caught by the server's version check, whose rejection carries the
    /// server copy the detector needs.
    conflict_suspected: bool,
    stats: SyncStats,
    events: Vec<Event>,
}

impl SessionState {
    fn new(config: &SyncConfig) -> Self {
        Self {
            store: None,
            status: SyncStatus::Idle,
            pending: None,
            scheduler: AutosaveScheduler::new(config.debounce),
            monitor: ReachabilityMonitor::new(config.reconnect_cooldown),
            in_flight: false,
            conflict_suspected: false,
            stats: SyncStats::default(),
            events: Vec::new(),
        }
    }

    fn set_status(&mut self, status: SyncStatus) {
        if self.status != status {
            self.status = status;
            self.events.push(Event::Status(status));
        }
    }

    /// Returns to the resting status for the current conditions.
    fn settle(&mut self) {
        let status = if self.pending.is_some() {
            SyncStatus::Conflict
        } else if !self.monitor.is_online() {
            SyncStatus::Offline
        } else {
            SyncStatus::Idle
        };
        self.set_status(status);
    }

    /// Settles after a successful exchange with the server.
    fn recovered(&mut self) {
        if self.pending.is_none() && self.monitor.is_online() {
            self.scheduler.resume();
        }
        self.settle();
    }

    /// Records a failed gateway call. Returns a draft to persist, if any.
    fn fail(&mut self, err: &SyncError) -> Option<DraftRecord> {
        self.stats.last_error = Some(err.to_string());
        if err.is_transport() {
            self.scheduler.pause();
            if self.monitor.is_online() && self.pending.is_none() {
                self.set_status(SyncStatus::Error);
            } else {
                self.settle();
            }
            self.draft()
        } else {
            self.set_status(SyncStatus::Error);
            None
        }
    }

    fn install(&mut self, store: DocumentStore) {
        self.store = Some(store);
        self.pending = None;
        self.in_flight = false;
        self.conflict_suspected = false;
        self.scheduler.cancel();
    }

    fn document_id(&self) -> SyncResult<DocumentId> {
        self.store
            .as_ref()
            .map(DocumentStore::id)
            .ok_or(SyncError::NoDocument)
    }

    fn draft(&self) -> Option<DraftRecord> {
        self.store
            .as_ref()
            .filter(|store| store.is_dirty())
            .map(DraftRecord::from_store)
    }
}

/// Keeps one document consistent between a session and the server.
///
/// Every method takes `&self`; share the coordinator through an `Arc` and
/// drive its timer with [`run_session`](crate::run_session), or call
/// [`on_timer`](Self::on_timer) yourself.
pub struct SyncCoordinator<G: RemoteGateway, P: PersistentStorage> {
    config: SyncConfig,
    gateway: G,
    storage: P,
    bus: Option<Arc<SessionBus>>,
    observers: Vec<Arc<dyn SyncObserver>>,
    state: Mutex<SessionState>,
    wake: Notify,
}

impl<G: RemoteGateway, P: PersistentStorage> SyncCoordinator<G, P> {
    /// Creates a coordinator with no document loaded.
    pub fn new(config: SyncConfig, gateway: G, storage: P) -> Self {
        let state = SessionState::new(&config);
        Self {
            config,
            gateway,
            storage,
            bus: None,
            observers: Vec::new(),
            state: Mutex::new(state),
            wake: Notify::new(),
        }
    }

    /// Publishes accepted pushes on `bus` and lets [`subscribe`](Self::subscribe) use it.
    pub fn with_bus(mut self, bus: Arc<SessionBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers an observer.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the session id.
    pub fn session_id(&self) -> Uuid {
        self.config.session_id
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Returns the draft storage.
    pub fn storage(&self) -> &P {
        &self.storage
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        self.state.lock().status
    }

    /// Returns the pending conflict, if any.
    pub fn conflict(&self) -> Option<ConflictInfo> {
        self.state.lock().pending.as_ref().map(|p| p.info.clone())
    }

    /// Returns a copy of the working document.
    pub fn document(&self) -> Option<QuotationDocument> {
        self.state
            .lock()
            .store
            .as_ref()
            .map(|store| store.document().clone())
    }

    /// Returns true if the working copy has unsynced edits.
    pub fn is_dirty(&self) -> bool {
        self.state
            .lock()
            .store
            .as_ref()
            .is_some_and(DocumentStore::is_dirty)
    }

    /// Returns true if another session is known to have written a newer
    /// version while this replica was dirty.
    ///
    /// The flag is for display. It does not change how the next push runs,
    /// and it clears once that push has an outcome.
    pub fn is_conflict_suspected(&self) -> bool {
        self.state.lock().conflict_suspected
    }

    /// Returns the current stats.
    pub fn stats(&self) -> SyncStats {
        self.state.lock().stats.clone()
    }

    /// Returns when the autosave timer fires next, if it can fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().scheduler.deadline()
    }

    /// Subscribes to cross-session changes of the loaded document.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<RemoteChange>> {
        let id = self.state.lock().document_id().ok()?;
        self.bus.as_ref().map(|bus| bus.subscribe(id))
    }

    pub(crate) fn wake_handle(&self) -> &Notify {
        &self.wake
    }

    /// Pulls `id` and makes it the working copy.
    ///
    /// A dirty draft of the same document left by an earlier session is
    /// restored on top of the pulled copy. When the pull fails for transport
    /// reasons and such a draft exists, the session starts offline on the
    /// draft.
    pub async fn open(&self, id: DocumentId) -> SyncResult<QuotationDocument> {
        let draft = match DraftRecord::load(&self.storage, &id) {
            Ok(draft) => draft.filter(|d| d.dirty),
            Err(err) => {
                warn!(doc_id = %id, error = %err, "failed to read draft");
                self.state.lock().stats.storage_failures += 1;
                None
            }
        };

        let gateway = &self.gateway;
        let request = PullRequest::new(id);
        let req = &request;
        let pulled = self.with_retry("pull", move || gateway.pull(req)).await;

        let document = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let now = Instant::now();
            match (pulled, draft) {
                (Ok(server), Some(draft)) => {
                    let store = draft.into_store();
                    let suspected = server.version > store.version();
                    info!(
                        doc_id = %id,
                        version = store.version(),
                        server_version = server.version,
                        "restored unsynced draft"
                    );
                    state.install(store);
                    state.conflict_suspected = suspected;
                    state.stats.pulls += 1;
                    state.scheduler.arm(now);
                    state.recovered();
                }
                (Ok(server), None) => {
                    info!(doc_id = %id, version = server.version, "document opened");
                    state.install(DocumentStore::load(server));
                    state.stats.pulls += 1;
                    state.stats.last_sync_time = Some(Utc::now());
                    state.recovered();
                }
                (Err(err), Some(draft)) if err.is_transport() => {
                    warn!(doc_id = %id, error = %err, "server unreachable, opening draft offline");
                    state.install(draft.into_store());
                    let _ = state.monitor.observe(false, now);
                    state.scheduler.arm(now);
                    state.scheduler.pause();
                    state.stats.last_error = Some(err.to_string());
                    state.settle();
                }
                (Err(err), _) => {
                    state.stats.last_error = Some(err.to_string());
                    return Err(err);
                }
            }
            state
                .store
                .as_ref()
                .map(|store| store.document().clone())
                .ok_or(SyncError::NoDocument)?
        };

        self.emit();
        self.wake.notify_one();
        Ok(document)
    }

    /// Makes `doc` the clean working copy.
    pub fn load(&self, doc: QuotationDocument) {
        {
            let mut state = self.state.lock();
            debug!(doc_id = %doc.id, version = doc.version, "document loaded");
            state.install(DocumentStore::load(doc));
            state.stats.last_sync_time = Some(Utc::now());
            state.recovered();
        }
        self.emit();
        self.wake.notify_one();
    }

    /// Applies a local edit and (re)starts the autosave timer.
    ///
    /// Never blocks on the network and never touches storage.
    pub fn mutate(&self, patch: &Payload) -> SyncResult<()> {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let store = state.store.as_mut().ok_or(SyncError::NoDocument)?;
            store.mutate(patch);
            debug!(doc_id = %store.id(), fields = patch.len(), "local edit");
            state.scheduler.arm(Instant::now());
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Runs a push cycle now.
    pub async fn force_push(&self) -> SyncResult<PushReport> {
        self.push_cycle().await
    }

    /// Pulls the server copy now.
    ///
    /// A dirty replica keeps its edits; a newer server version only marks
    /// the next push as conflict-suspected.
    pub async fn force_pull(&self) -> SyncResult<PullReport> {
        if !self.state.lock().monitor.is_online() {
            return Err(SyncError::Offline);
        }
        self.pull_and_apply().await
    }

    /// Fires the autosave timer if its deadline has passed.
    ///
    /// Persists a draft of the dirty copy, then runs a push cycle. Returns
    /// `None` when the deadline has not passed or the timer is paused.
    pub async fn on_timer(&self) -> SyncResult<Option<PushReport>> {
        let draft = {
            let mut state = self.state.lock();
            if !state.scheduler.poll(Instant::now()) {
                return Ok(None);
            }
            state.draft()
        };
        if let Some(draft) = draft {
            self.save_draft(&draft);
        }
        self.push_cycle().await.map(Some)
    }

    /// Feeds a connectivity signal.
    ///
    /// Going offline pauses autosave and persists the dirty copy. A
    /// `reconnected` transition pulls first and then pushes pending edits.
    pub async fn set_reachability(&self, online: bool) -> SyncResult<SyncOutcome> {
        let (transition, draft) = {
            let mut state = self.state.lock();
            let transition = state.monitor.observe(online, Instant::now());
            let mut draft = None;
            match transition {
                Some(ReachabilityTransition::WentOffline) => {
                    state.scheduler.pause();
                    state.settle();
                    draft = state.draft();
                }
                Some(ReachabilityTransition::CameOnline { .. }) => state.recovered(),
                None => {}
            }
            (transition, draft)
        };
        self.emit();
        if let Some(draft) = draft {
            self.save_draft(&draft);
        }

        match transition {
            Some(ReachabilityTransition::WentOffline) => {
                info!(session = %self.config.session_id, "went offline");
                Ok(SyncOutcome::None)
            }
            Some(ReachabilityTransition::CameOnline { reconnected: true }) => {
                info!(session = %self.config.session_id, "reconnected, catching up");
                self.catch_up().await
            }
            Some(ReachabilityTransition::CameOnline { reconnected: false }) => {
                debug!(session = %self.config.session_id, "back online within reconnect cooldown");
                Ok(SyncOutcome::None)
            }
            None => Ok(SyncOutcome::None),
        }
    }

    /// Reacts to another session's accepted push.
    ///
    /// Notifications from this session, for other documents, or for
    /// versions not newer than the local one are ignored.
    pub async fn handle_remote_change(&self, change: RemoteChange) -> SyncResult<Option<PullReport>> {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if change.origin == self.config.session_id {
                return Ok(None);
            }
            let Some(store) = state.store.as_ref() else {
                return Ok(None);
            };
            if store.id() != change.document_id || change.version <= store.version() {
                return Ok(None);
            }
            if store.is_dirty() || state.pending.is_some() {
                debug!(
                    doc_id = %change.document_id,
                    version = store.version(),
                    server_version = change.version,
                    "remote change while dirty"
                );
                state.conflict_suspected = true;
                return Ok(Some(PullReport::Suspected {
                    server_version: change.version,
                }));
            }
            if !state.monitor.is_online() {
                return Ok(None);
            }
        }
        self.pull_and_apply().await.map(Some)
    }

    /// Pulls after cross-session notifications were missed.
    ///
    /// Skipped while offline or with no document loaded; the reconnect
    /// catch-up pulls anyway.
    pub async fn resync(&self) -> SyncResult<Option<PullReport>> {
        {
            let state = self.state.lock();
            if state.store.is_none() || !state.monitor.is_online() {
                return Ok(None);
            }
        }
        self.pull_and_apply().await.map(Some)
    }

    /// Resolves the pending conflict.
    ///
    /// `keep-local` and `merge` push against the server version captured at
    /// detection time. `keep-server` adopts the server copy without pushing.
    /// `cancel` leaves the conflict pending. With no pending conflict every
    /// strategy is a no-op.
    pub async fn resolve(&self, strategy: ResolutionStrategy) -> SyncResult<ResolutionReport> {
        let (adopted, online) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(pending) = state.pending.as_ref() else {
                debug!(%strategy, "no conflict to resolve");
                return Ok(ResolutionReport::NothingToResolve);
            };
            let store = state.store.as_mut().ok_or(SyncError::NoDocument)?;
            let id = store.id();
            let adopted = match plan(strategy, pending, store.last_synced(), store.working()) {
                ResolutionPlan::Retain => {
                    info!(doc_id = %id, "conflict resolution cancelled");
                    return Ok(ResolutionReport::Cancelled);
                }
                ResolutionPlan::Adopt(server) => {
                    let version = server.version;
                    store.apply_authoritative(server);
                    Some((id, version))
                }
                ResolutionPlan::Push {
                    payload,
                    expected_version,
                } => {
                    debug!(doc_id = %id, expected = expected_version, "rebasing resolved payload");
                    store.rebase(pending.server.clone(), payload);
                    None
                }
            };
            info!(doc_id = %id, %strategy, "conflict resolved");
            state.pending = None;
            state.stats.conflicts_resolved += 1;
            state.scheduler.cancel();
            if adopted.is_some() {
                state.stats.last_sync_time = Some(Utc::now());
            } else if !state.monitor.is_online() {
                state.scheduler.arm(Instant::now());
            }
            state.recovered();
            (adopted, state.monitor.is_online())
        };
        self.emit();

        match adopted {
            Some((id, version)) => {
                self.remove_draft(&id);
                Ok(ResolutionReport::Adopted { version })
            }
            None if !online => Ok(ResolutionReport::Queued),
            None => Ok(ResolutionReport::Pushed(self.push_cycle().await?)),
        }
    }

    /// Stops editing the current document.
    ///
    /// Unsynced edits are persisted as a draft.
    pub fn close(&self) {
        let draft = {
            let mut state = self.state.lock();
            let draft = state.draft();
            state.store = None;
            state.pending = None;
            state.in_flight = false;
            state.conflict_suspected = false;
            state.scheduler.cancel();
            state.settle();
            draft
        };
        self.emit();
        if let Some(draft) = draft {
            self.save_draft(&draft);
        }
        self.wake.notify_one();
    }

    /// Handles one input.
    pub async fn dispatch(&self, input: SyncInput) -> SyncResult<SyncOutcome> {
        match input {
            SyncInput::Mutate(patch) => self.mutate(&patch).map(|()| SyncOutcome::None),
            SyncInput::TimerElapsed => Ok(self
                .on_timer()
                .await?
                .map_or(SyncOutcome::None, SyncOutcome::Pushed)),
            SyncInput::Reachability(online) => self.set_reachability(online).await,
            SyncInput::RemoteChanged(change) => Ok(self
                .handle_remote_change(change)
                .await?
                .map_or(SyncOutcome::None, SyncOutcome::Pulled)),
            SyncInput::Resolve(strategy) => self.resolve(strategy).await.map(SyncOutcome::Resolved),
            SyncInput::ForcePush => self.force_push().await.map(SyncOutcome::Pushed),
            SyncInput::ForcePull => self.force_pull().await.map(SyncOutcome::Pulled),
        }
    }

    async fn catch_up(&self) -> SyncResult<SyncOutcome> {
        if self.state.lock().store.is_none() {
            return Ok(SyncOutcome::None);
        }
        let pulled = self.pull_and_apply().await?;
        let needs_push = {
            let state = self.state.lock();
            state.pending.is_none() && state.store.as_ref().is_some_and(DocumentStore::is_dirty)
        };
        if needs_push {
            self.push_cycle().await.map(SyncOutcome::Pushed)
        } else {
            Ok(SyncOutcome::Pulled(pulled))
        }
    }

    async fn push_cycle(&self) -> SyncResult<PushReport> {
        let request = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(store) = state.store.as_ref() else {
                return Err(SyncError::NoDocument);
            };
            if state.pending.is_some() {
                return Err(SyncError::ConflictPending);
            }
            if !state.monitor.is_online() {
                return Err(SyncError::Offline);
            }
            if state.in_flight {
                debug!(doc_id = %store.id(), "push already in flight, re-arming autosave");
                state.scheduler.arm(Instant::now());
                return Ok(PushReport::AlreadyInFlight);
            }
            if !store.is_dirty() {
                return Ok(PushReport::Clean);
            }
            let request = PushRequest::new(store.id(), store.working().clone(), store.version());
            if state.conflict_suspected {
                debug!(doc_id = %request.id, "pushing with a suspected conflict");
            }
            state.in_flight = true;
            state.scheduler.cancel();
            state.set_status(SyncStatus::Syncing);
            request
        };
        self.emit();

        let mut request = request;
        let mut rebases = 0;
        let result = loop {
            debug!(doc_id = %request.id, expected = request.expected_version, "pushing");
            let gateway = &self.gateway;
            let req = &request;
            let outcome = self.with_retry("push", move || gateway.push(req)).await;
            match self.apply_push_outcome(request, outcome, &mut rebases) {
                PushStep::Continue(next) => request = next,
                PushStep::Done(result) => break result,
            }
        };
        self.emit();
        result
    }

    fn apply_push_outcome(
        &self,
        request: PushRequest,
        outcome: SyncResult<PushOutcome>,
        rebases: &mut u32,
    ) -> PushStep {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let store = match state.store.as_mut() {
            Some(store) if store.id() == request.id => store,
            _ => {
                state.in_flight = false;
                return PushStep::Done(Err(SyncError::NoDocument));
            }
        };
        let id = request.id;

        match outcome {
            Ok(PushOutcome::Accepted {
                new_version,
                updated_at,
            }) => {
                store.acknowledge_push(request.payload, new_version, updated_at);
                let clean = !store.is_dirty();
                state.in_flight = false;
                state.conflict_suspected = false;
                state.stats.pushes_accepted += 1;
                state.stats.last_sync_time = Some(Utc::now());
                state.recovered();
                drop(guard);

                info!(doc_id = %id, version = new_version, rebases = *rebases, "push accepted");
                if let Some(bus) = &self.bus {
                    bus.notify_remote_change(id, new_version, self.config.session_id);
                }
                if clean {
                    self.remove_draft(&id);
                }
                PushStep::Done(Ok(if *rebases == 0 {
                    PushReport::Accepted {
                        version: new_version,
                    }
                } else {
                    PushReport::FastForwarded {
                        version: new_version,
                        rebases: *rebases,
                    }
                }))
            }
            Ok(PushOutcome::Rejected {
                server_version,
                server_payload,
                server_updated_at,
            }) => {
                state.stats.pushes_rejected += 1;
                info!(
                    doc_id = %id,
                    expected = request.expected_version,
                    server_version,
                    "push rejected, stale version"
                );
                let server = QuotationDocument {
                    id,
                    version: server_version,
                    updated_at: server_updated_at,
                    payload: server_payload,
                };

                match detect(store, &server) {
                    Detection::FastForward(merged) => {
                        store.rebase(server, merged);
                        if !store.is_dirty() {
                            state.in_flight = false;
                            state.conflict_suspected = false;
                            state.stats.last_sync_time = Some(Utc::now());
                            state.recovered();
                            drop(guard);
                            debug!(doc_id = %id, version = server_version, "replica matches server");
                            self.remove_draft(&id);
                            return PushStep::Done(Ok(PushReport::Clean));
                        }
                        if *rebases >= self.config.max_fast_forwards {
                            warn!(doc_id = %id, server_version, "fast-forward limit reached");
                            state.in_flight = false;
                            state.scheduler.arm(Instant::now());
                            state.recovered();
                            return PushStep::Done(Ok(PushReport::Deferred { server_version }));
                        }
                        *rebases += 1;
                        state.stats.fast_forwards += 1;
                        info!(doc_id = %id, server_version, "fast-forward onto server version");
                        PushStep::Continue(PushRequest::new(
                            id,
                            store.working().clone(),
                            server_version,
                        ))
                    }
                    Detection::Conflict(info) => {
                        warn!(
                            doc_id = %id,
                            local_version = info.local_version,
                            server_version,
                            fields = ?info.conflicting_fields,
                            "conflict detected"
                        );
                        state.pending = Some(PendingConflict {
                            info: info.clone(),
                            server,
                        });
                        state.in_flight = false;
                        state.conflict_suspected = false;
                        state.stats.conflicts_detected += 1;
                        state.scheduler.pause();
                        state.events.push(Event::Conflict(info.clone()));
                        state.settle();
                        PushStep::Done(Ok(PushReport::Conflict(info)))
                    }
                }
            }
            Err(err) => {
                state.in_flight = false;
                state.conflict_suspected = false;
                let draft = state.fail(&err);
                drop(guard);

                warn!(doc_id = %id, error = %err, "push failed");
                if let Some(draft) = draft {
                    self.save_draft(&draft);
                }
                PushStep::Done(Err(err))
            }
        }
    }

    async fn pull_and_apply(&self) -> SyncResult<PullReport> {
        let id = self.state.lock().document_id()?;
        {
            let mut state = self.state.lock();
            if state.pending.is_none() {
                state.set_status(SyncStatus::Syncing);
            }
        }
        self.emit();

        let gateway = &self.gateway;
        let request = PullRequest::new(id);
        let req = &request;
        let pulled = self.with_retry("pull", move || gateway.pull(req)).await;

        let (result, draft, applied) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match pulled {
                Err(err) => {
                    warn!(doc_id = %id, error = %err, "pull failed");
                    let draft = state.fail(&err);
                    (Err(err), draft, false)
                }
                Ok(server) => match state.store.as_mut() {
                    Some(store) if store.id() == server.id => {
                        state.stats.pulls += 1;
                        if server.version <= store.version() {
                            let version = store.version();
                            state.recovered();
                            (Ok(PullReport::UpToDate { version }), None, false)
                        } else if store.is_dirty() || state.pending.is_some() {
                            info!(
                                doc_id = %id,
                                version = store.version(),
                                server_version = server.version,
                                "server ahead of dirty replica"
                            );
                            state.conflict_suspected = true;
                            let server_version = server.version;
                            state.recovered();
                            (Ok(PullReport::Suspected { server_version }), None, false)
                        } else {
                            let version = server.version;
                            info!(doc_id = %id, version, "pulled newer server version");
                            store.apply_authoritative(server.clone());
                            state.stats.last_sync_time = Some(Utc::now());
                            state.events.push(Event::RemoteUpdate(server));
                            state.recovered();
                            (Ok(PullReport::Updated { version }), None, true)
                        }
                    }
                    _ => {
                        state.settle();
                        (Err(SyncError::NoDocument), None, false)
                    }
                },
            }
        };

        self.emit();
        if let Some(draft) = draft {
            self.save_draft(&draft);
        }
        if applied {
            self.remove_draft(&id);
        }
        result
    }

    /// Runs a gateway call with the request timeout and retries
    /// retryable failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.config.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout),
            };
            match result {
                Err(err) if err.is_retryable() && attempt + 1 < retry.max_attempts => {
                    attempt += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    self.state.lock().stats.retries += 1;
                    warn!(op, attempt, ?delay, error = %err, "retrying after transport failure");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    fn save_draft(&self, draft: &DraftRecord) {
        match draft.save(&self.storage) {
            Ok(()) => debug!(doc_id = %draft.id, version = draft.version, "draft persisted"),
            Err(err) => {
                warn!(doc_id = %draft.id, error = %err, "failed to persist draft");
                self.state.lock().stats.storage_failures += 1;
            }
        }
    }

    fn remove_draft(&self, id: &DocumentId) {
        if let Err(err) = self.storage.remove(id) {
            warn!(doc_id = %id, error = %err, "failed to remove draft");
            self.state.lock().stats.storage_failures += 1;
        }
    }

    fn emit(&self) {
        let events = std::mem::take(&mut self.state.lock().events);
        for event in events {
            for observer in &self.observers {
                match &event {
                    Event::Status(status) => observer.on_status_change(*status),
                    Event::Conflict(info) => observer.on_conflict(info),
                    Event::RemoteUpdate(doc) => observer.on_remote_update(doc),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::persistence::MemoryStorage;
    use serde_json::json;

    type MockSession = SyncCoordinator<Arc<MockGateway>, MemoryStorage>;

    fn payload(value: serde_json::Value) -> Payload {
        Payload::from_json(value).unwrap()
    }

    fn session(config: SyncConfig) -> (MockSession, Arc<MockGateway>, DocumentId) {
        let gateway = Arc::new(MockGateway::new());
        let session = SyncCoordinator::new(config, Arc::clone(&gateway), MemoryStorage::new());
        let doc = QuotationDocument::new(DocumentId::new(), payload(json!({"price": 100})))
            .with_version(3);
        let id = doc.id;
        session.load(doc);
        (session, gateway, id)
    }

    fn rejected(version: u64, value: serde_json::Value) -> SyncResult<PushOutcome> {
        Ok(PushOutcome::Rejected {
            server_version: version,
            server_payload: payload(value),
            server_updated_at: Utc::now(),
        })
    }

    fn accepted(version: u64) -> SyncResult<PushOutcome> {
        Ok(PushOutcome::Accepted {
            new_version: version,
            updated_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn edits_need_a_document() {
        let session = SyncCoordinator::new(
            SyncConfig::interactive(),
            MockGateway::new(),
            MemoryStorage::new(),
        );
        assert!(matches!(
            session.mutate(&payload(json!({"price": 1}))),
            Err(SyncError::NoDocument)
        ));
        assert!(matches!(session.force_push().await, Err(SyncError::NoDocument)));
        assert_eq!(
            session.resolve(ResolutionStrategy::Merge).await.unwrap(),
            ResolutionReport::NothingToResolve
        );
    }

    #[tokio::test]
    async fn accepted_push_clears_dirty() {
        let (session, gateway, _) = session(SyncConfig::interactive());
        session.mutate(&payload(json!({"price": 110}))).unwrap();
        assert!(session.next_deadline().is_some());

        gateway.queue_push(accepted(4));
        let report = session.force_push().await.unwrap();

        assert_eq!(report, PushReport::Accepted { version: 4 });
        assert_eq!(gateway.pushed()[0].expected_version, 3);
        assert!(!session.is_dirty());
        assert!(session.next_deadline().is_none());
        assert_eq!(session.status(), SyncStatus::Idle);
        assert_eq!(session.stats().pushes_accepted, 1);
    }

    #[tokio::test]
    async fn rejected_push_fast_forwards() {
        let (session, gateway, _) = session(SyncConfig::interactive());
        session.mutate(&payload(json!({"discount": 10}))).unwrap();

        gateway.queue_push(rejected(4, json!({"price": 120})));
        gateway.queue_push(accepted(5));
        let report = session.force_push().await.unwrap();

        assert_eq!(report, PushReport::FastForwarded { version: 5, rebases: 1 });
        let retried = &gateway.pushed()[1];
        assert_eq!(retried.expected_version, 4);
        assert_eq!(retried.payload, payload(json!({"price": 120, "discount": 10})));
        assert_eq!(session.document().unwrap().version, 5);
        assert!(session.conflict().is_none());
    }

    #[tokio::test]
    async fn fast_forward_limit_defers_push() {
        let (session, gateway, _) = session(SyncConfig::interactive().with_max_fast_forwards(0));
        session.mutate(&payload(json!({"discount": 10}))).unwrap();

        gateway.queue_push(rejected(4, json!({"price": 120})));
        let report = session.force_push().await.unwrap();

        assert_eq!(report, PushReport::Deferred { server_version: 4 });
        assert_eq!(gateway.push_calls(), 1);
        assert!(session.is_dirty());
        assert_eq!(session.document().unwrap().version, 4);
        assert!(session.next_deadline().is_some());
    }

    #[tokio::test]
    async fn overlapping_edit_surfaces_conflict() {
        let (session, gateway, id) = session(SyncConfig::interactive());
        session.mutate(&payload(json!({"price": 110}))).unwrap();

        gateway.queue_push(rejected(4, json!({"price": 120})));
        let report = session.force_push().await.unwrap();

        let PushReport::Conflict(info) = report else {
            panic!("expected a conflict, got {report:?}");
        };
        assert_eq!(info.document_id, id);
        assert_eq!(info.conflicting_fields, vec!["price".to_string()]);
        assert_eq!(session.status(), SyncStatus::Conflict);
        assert!(session.next_deadline().is_none());
        assert!(matches!(session.force_push().await, Err(SyncError::ConflictPending)));

        gateway.queue_push(accepted(5));
        let resolved = session.resolve(ResolutionStrategy::KeepLocal).await.unwrap();
        assert_eq!(resolved, ResolutionReport::Pushed(PushReport::Accepted { version: 5 }));
        assert_eq!(gateway.pushed()[1].expected_version, 4);
        assert_eq!(session.document().unwrap().payload, payload(json!({"price": 110})));
    }

    #[tokio::test]
    async fn validation_error_keeps_edits() {
        let (session, gateway, _) = session(SyncConfig::interactive());
        session.mutate(&payload(json!({"price": -1}))).unwrap();

        gateway.queue_push(Err(SyncError::Validation {
            message: "price must not be negative".into(),
            violations: Vec::new(),
        }));
        let err = session.force_push().await.unwrap_err();

        assert!(matches!(err, SyncError::Validation { .. }));
        assert_eq!(gateway.push_calls(), 1);
        assert!(session.is_dirty());
        assert_eq!(session.status(), SyncStatus::Error);
        assert_eq!(session.stats().retries, 0);
    }

    #[tokio::test]
    async fn resync_pulls_only_while_online() {
        let (session, gateway, id) = session(SyncConfig::interactive());
        let newer = QuotationDocument::new(id, payload(json!({"price": 130}))).with_version(5);
        gateway.queue_pull(Ok(newer));

        let report = session.resync().await.unwrap();
        assert_eq!(report, Some(PullReport::Updated { version: 5 }));
        assert_eq!(session.document().unwrap().version, 5);

        session.set_reachability(false).await.unwrap();
        assert_eq!(session.resync().await.unwrap(), None);
        assert_eq!(gateway.pull_calls(), 1);
    }

    #[tokio::test]
    async fn dispatch_routes_inputs() {
        let (session, gateway, _) = session(SyncConfig::interactive());

        let outcome = session
            .dispatch(SyncInput::Mutate(payload(json!({"notes": "rush"}))))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::None);
        assert!(session.is_dirty());

        gateway.queue_push(accepted(4));
        let outcome = session.dispatch(SyncInput::ForcePush).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Pushed(PushReport::Accepted { version: 4 }));

        let outcome = session
            .dispatch(SyncInput::Resolve(ResolutionStrategy::Cancel))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Resolved(ResolutionReport::NothingToResolve));
    }
}
