//! Request handlers for sync endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::AuthoritativeStore;
use crate::validation::PayloadValidator;
use quotesync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use std::sync::Arc;
use tracing::info;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Document store (shared across all handlers).
    pub store: Arc<AuthoritativeStore>,
    /// Business rules checked before every write.
    validator: Box<dyn PayloadValidator>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        config: ServerConfig,
        store: Arc<AuthoritativeStore>,
        validator: Box<dyn PayloadValidator>,
    ) -> Self {
        Self {
            config,
            store,
            validator,
        }
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a push request.
    ///
    /// Validation runs before the version check, so an invalid payload is
    /// reported even when it was also based on a stale version.
    pub fn handle_push(&self, request: PushRequest) -> ServerResult<PushResponse> {
        let max_fields = self.context.config.max_payload_fields;
        if request.payload.len() > max_fields {
            return Err(ServerError::InvalidRequest(format!(
                "Too many fields: {} > {}",
                request.payload.len(),
                max_fields
            )));
        }

        let violations = self.context.validator.validate(&request.payload);
        if !violations.is_empty() {
            info!(doc_id = %request.id, count = violations.len(), "push failed validation");
            return Err(ServerError::Validation(violations));
        }

        self.context.store.compare_and_swap(
            &request.id,
            request.payload,
            request.expected_version,
        )
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> ServerResult<PullResponse> {
        self.context
            .store
            .get(&request.id)
            .map(|doc| PullResponse::from(&doc))
            .ok_or(ServerError::DocumentNotFound(request.id))
    }
}
