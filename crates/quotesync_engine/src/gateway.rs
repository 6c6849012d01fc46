//! Remote gateway abstraction for push and pull.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use quotesync_protocol::{PullRequest, PushOutcome, PushRequest, QuotationDocument};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A remote gateway talks to the authoritative copy.
///
/// This is the only component that performs network I/O. Implementations
/// must keep transport failures (`SyncError::Transport`, `SyncError::Timeout`)
/// distinct from a stale-version rejection, which is a regular
/// [`PushOutcome::Rejected`].
pub trait RemoteGateway: Send + Sync {
    /// Pushes a payload based on `request.expected_version`.
    fn push(&self, request: &PushRequest) -> impl Future<Output = SyncResult<PushOutcome>> + Send;

    /// Pulls the current authoritative state.
    fn pull(
        &self,
        request: &PullRequest,
    ) -> impl Future<Output = SyncResult<QuotationDocument>> + Send;
}

impl<G: RemoteGateway> RemoteGateway for Arc<G> {
    fn push(&self, request: &PushRequest) -> impl Future<Output = SyncResult<PushOutcome>> + Send {
        (**self).push(request)
    }

    fn pull(
        &self,
        request: &PullRequest,
    ) -> impl Future<Output = SyncResult<QuotationDocument>> + Send {
        (**self).pull(request)
    }
}

/// A scripted gateway for testing.
///
/// Responses are consumed in the order they were queued.
pub struct MockGateway {
    connected: AtomicBool,
    delay: Mutex<Option<Duration>>,
    push_results: Mutex<VecDeque<SyncResult<PushOutcome>>>,
    pull_results: Mutex<VecDeque<SyncResult<QuotationDocument>>>,
    pushed: Mutex<Vec<PushRequest>>,
    pull_calls: AtomicU64,
}

impl MockGateway {
    /// Creates a new connected mock gateway.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            delay: Mutex::new(None),
            push_results: Mutex::new(VecDeque::new()),
            pull_results: Mutex::new(VecDeque::new()),
            pushed: Mutex::new(Vec::new()),
            pull_calls: AtomicU64::new(0),
        }
    }

    /// Queues the result of the next push.
    pub fn queue_push(&self, result: SyncResult<PushOutcome>) {
        self.push_results.lock().push_back(result);
    }

    /// Queues the result of the next pull.
    pub fn queue_pull(&self, result: SyncResult<QuotationDocument>) {
        self.pull_results.lock().push_back(result);
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every push request received so far.
    pub fn pushed(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Returns the number of push calls.
    pub fn push_calls(&self) -> usize {
        self.pushed.lock().len()
    }

    /// Returns the number of pull calls.
    pub fn pull_calls(&self) -> u64 {
        self.pull_calls.load(Ordering::SeqCst)
    }

    async fn respond<T>(&self, queue: &Mutex<VecDeque<SyncResult<T>>>, what: &str) -> SyncResult<T> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("connection refused"));
        }
        let next = queue.lock().pop_front();
        next.unwrap_or_else(|| Err(SyncError::Protocol(format!("No mock {what} response set"))))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteGateway for MockGateway {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushOutcome> {
        self.pushed.lock().push(request.clone());
        self.respond(&self.push_results, "push").await
    }

    async fn pull(&self, _request: &PullRequest) -> SyncResult<QuotationDocument> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.pull_results, "pull").await
    }
}
