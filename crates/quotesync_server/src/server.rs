//! Main quotation server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::AuthoritativeStore;
use crate::validation::{AcceptAll, PayloadValidator};
use quotesync_protocol::{
    DocumentId, Payload, PullRequest, PullResponse, PushRequest, PushResponse, QuotationDocument,
};
use std::sync::Arc;
use tracing::warn;

/// Path of the push endpoint.
pub const PUSH_PATH: &str = "/quotations/push";
/// Path of the pull endpoint.
pub const PULL_PATH: &str = "/quotations/pull";

/// The quotation server.
///
/// Holds the authoritative copy of every document and processes push and
/// pull requests from sessions.
///
/// # Example
///
/// ```
/// use quotesync_server::{QuotationServer, ServerConfig};
/// use quotesync_protocol::{Payload, PushRequest};
///
/// let server = QuotationServer::new(ServerConfig::default());
/// let doc = server.create_document(Payload::new());
///
/// let response = server
///     .handle_push(PushRequest::new(doc.id, Payload::new(), 0))
///     .unwrap();
/// assert!(response.accepted);
/// assert_eq!(response.version, 1);
/// ```
pub struct QuotationServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl QuotationServer {
    /// Creates a new server that accepts every payload.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_parts(config, Arc::new(AuthoritativeStore::new()), Box::new(AcceptAll))
    }

    /// Creates a server with an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<AuthoritativeStore>) -> Self {
        Self::with_parts(config, store, Box::new(AcceptAll))
    }

    /// Creates a server with an existing store and validator.
    pub fn with_parts(
        config: ServerConfig,
        store: Arc<AuthoritativeStore>,
        validator: Box<dyn PayloadValidator>,
    ) -> Self {
        let context = Arc::new(HandlerContext::new(config, store, validator));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Creates a document at version 0.
    pub fn create_document(&self, payload: Payload) -> QuotationDocument {
        self.context.store.create(payload)
    }

    /// Returns the current state of a document.
    pub fn document(&self, id: &DocumentId) -> Option<QuotationDocument> {
        self.context.store.get(id)
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<AuthoritativeStore> {
        &self.context.store
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: PushRequest) -> ServerResult<PushResponse> {
        self.handler.handle_push(request)
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> ServerResult<PullResponse> {
        self.handler.handle_pull(request)
    }

    /// Handles a CBOR-encoded POST request and returns `(status, body)`.
    ///
    /// Successful calls answer 200 with the encoded response message;
    /// failures answer with the error's status code and an encoded
    /// `ErrorResponse` body.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let result = match path {
            PUSH_PATH => PushRequest::decode(body)
                .map_err(ServerError::from)
                .and_then(|request| self.handle_push(request))
                .and_then(|response| response.encode().map_err(ServerError::from)),
            PULL_PATH => PullRequest::decode(body)
                .map_err(ServerError::from)
                .and_then(|request| self.handle_pull(request))
                .and_then(|response| response.encode().map_err(ServerError::from)),
            other => Err(ServerError::InvalidRequest(format!("unknown path: {other}"))),
        };

        match result {
            Ok(bytes) => (200, bytes),
            Err(err) => {
                let status = err.status_code();
                match err.to_response().encode() {
                    Ok(bytes) => (status, bytes),
                    Err(encode_err) => {
                        warn!(error = %encode_err, "failed to encode error response");
                        (500, Vec::new())
                    }
                }
            }
        }
    }

    /// Returns the number of stored documents.
    pub fn document_count(&self) -> usize {
        self.context.store.len()
    }
}
