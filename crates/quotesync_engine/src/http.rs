//! HTTP gateway implementation.
//!
//! This module provides an HTTP-based gateway for the sync engine.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, etc.).

use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use parking_lot::RwLock;
use quotesync_protocol::{
    ErrorKind, ErrorResponse, PullRequest, PullResponse, PushOutcome, PushRequest, PushResponse,
    QuotationDocument,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Path of the push endpoint.
pub const PUSH_ENDPOINT: &str = "/quotations/push";
/// Path of the pull endpoint.
pub const PULL_ENDPOINT: &str = "/quotations/pull";

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
/// An `Err` means the request never produced a response (connection
/// refused, DNS failure, reset); any response, even an error status, is `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response.
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

/// HTTP-based remote gateway.
///
/// Uses CBOR encoding for request/response bodies.
pub struct HttpGateway<C: HttpClient> {
    /// Base URL of the quotation service (e.g., "https://quotes.example.com").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Whether the last request reached the server.
    healthy: AtomicBool,
    /// Set once the gateway is closed.
    closed: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpGateway<C> {
    /// Creates a new HTTP gateway.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            healthy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the gateway is open and the last request got a response.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.healthy.load(Ordering::SeqCst)
    }

    /// Closes the gateway. Every later call fails with a fatal transport error.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    async fn post_cbor(&self, endpoint: &str, body: Vec<u8>) -> SyncResult<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::transport_fatal("gateway closed"));
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let response = match self.client.post(&url, body).await {
            Ok(response) => response,
            Err(e) => {
                self.set_error(&e);
                self.healthy.store(false, Ordering::SeqCst);
                return Err(SyncError::transport_retryable(e));
            }
        };
        self.healthy.store(true, Ordering::SeqCst);

        if response.status == 200 {
            *self.last_error.write() = None;
            return Ok(response.body);
        }

        let err = error_from_response(&response);
        self.set_error(&err.to_string());
        Err(err)
    }
}

/// Maps a non-200 response onto the engine's error taxonomy.
fn error_from_response(response: &HttpResponse) -> SyncError {
    match ErrorResponse::decode(&response.body) {
        Ok(error) => match error.kind {
            ErrorKind::NotFound => SyncError::DocumentNotFound,
            // The server read the request and refused its payload; the
            // session keeps its edits and autosave stays armed.
            ErrorKind::Validation | ErrorKind::InvalidRequest => SyncError::Validation {
                message: error.message,
                violations: error.violations,
            },
            ErrorKind::Internal => SyncError::transport_retryable(error.message),
        },
        Err(_) if response.status >= 500 => {
            SyncError::transport_retryable(format!("server returned {}", response.status))
        }
        Err(e) => SyncError::Protocol(format!(
            "unexpected status {} with undecodable body: {}",
            response.status, e
        )),
    }
}

impl<C: HttpClient> RemoteGateway for HttpGateway<C> {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushOutcome> {
        let body = request.encode()?;
        let bytes = self.post_cbor(PUSH_ENDPOINT, body).await?;
        Ok(PushResponse::decode(&bytes)?.into_outcome())
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<QuotationDocument> {
        let body = request.encode()?;
        let bytes = self.post_cbor(PULL_ENDPOINT, body).await?;
        Ok(PullResponse::decode(&bytes)?.into_document())
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST request and returns `(status, body)`.
    fn handle_post(&self, path: &str, body: &[u8]) -> (u16, Vec<u8>);
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead. Reachability can be
/// toggled to simulate the network going away.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    reachable: AtomicBool,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self {
            server,
            reachable: AtomicBool::new(true),
        }
    }

    /// Makes the server reachable or unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns the wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        let (status, body) = self.server.handle_post(url_path(url), &body);
        Ok(HttpResponse::new(status, body))
    }
}

/// Extracts the path component of an absolute or relative URL.
fn url_path(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotesync_protocol::{DocumentId, FieldViolation, Payload};

    struct TestServer {
        status: u16,
        body: Vec<u8>,
    }

    impl LoopbackServer for TestServer {
        fn handle_post(&self, _path: &str, _body: &[u8]) -> (u16, Vec<u8>) {
            (self.status, self.body.clone())
        }
    }

    fn gateway(status: u16, body: Vec<u8>) -> HttpGateway<LoopbackClient<TestServer>> {
        HttpGateway::new(
            "https://quotes.example.com",
            LoopbackClient::new(TestServer { status, body }),
        )
    }

    fn push_request() -> PushRequest {
        PushRequest::new(DocumentId::new(), Payload::new(), 0)
    }

    #[test]
    fn path_extraction() {
        assert_eq!(url_path("https://quotes.example.com/quotations/push"), "/quotations/push");
        assert_eq!(url_path("memory:///quotations/pull"), "/quotations/pull");
        assert_eq!(url_path("https://quotes.example.com"), "/");
        assert_eq!(url_path("/quotations/push"), "/quotations/push");
    }

    #[tokio::test]
    async fn accepted_push() {
        let doc = QuotationDocument::new(DocumentId::new(), Payload::new()).with_version(1);
        let gateway = gateway(200, PushResponse::accepted(&doc).encode().unwrap());
        assert_eq!(gateway.base_url(), "https://quotes.example.com");

        let outcome = gateway.push(&push_request()).await.unwrap();
        assert_eq!(
            outcome,
            PushOutcome::Accepted {
                new_version: 1,
                updated_at: doc.updated_at
            }
        );
        assert!(gateway.is_connected());
    }

    #[tokio::test]
    async fn validation_error() {
        let body = ErrorResponse::validation(vec![FieldViolation::new("price", "must not be negative")])
            .encode()
            .unwrap();
        let gateway = gateway(422, body);

        match gateway.push(&push_request()).await {
            Err(SyncError::Validation { violations, .. }) => {
                assert_eq!(violations[0].field, "price");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(gateway.last_error().is_some());
    }

    #[tokio::test]
    async fn invalid_request_is_not_a_transport_failure() {
        let body = ErrorResponse::new(ErrorKind::InvalidRequest, "Too many fields: 3 > 2")
            .encode()
            .unwrap();
        let gateway = gateway(400, body);

        let err = gateway.push(&push_request()).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
        assert!(!err.is_transport());
        assert!(!err.is_retryable());
        assert!(gateway.is_connected());
    }

    #[tokio::test]
    async fn unreachable_server_is_retryable() {
        let gateway = gateway(200, Vec::new());
        gateway.client.set_reachable(false);

        let err = gateway.push(&push_request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn closed_gateway_is_fatal() {
        let gateway = gateway(200, Vec::new());
        gateway.close();

        let err = gateway.pull(&PullRequest::new(DocumentId::new())).await.unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_without_body_is_retryable() {
        let gateway = gateway(503, Vec::new());
        let err = gateway.push(&push_request()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn not_found() {
        let body = ErrorResponse::new(ErrorKind::NotFound, "document not found")
            .encode()
            .unwrap();
        let gateway = gateway(404, body);
        let err = gateway.pull(&PullRequest::new(DocumentId::new())).await.unwrap_err();
        assert!(matches!(err, SyncError::DocumentNotFound));
    }
}
