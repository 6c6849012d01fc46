//! Test fixtures.
//!
//! Servers seeded with a document at a chosen version, plus helpers that
//! play the part of another session writing to the server.

use quotesync_protocol::{DocumentId, Payload, PushRequest, QuotationDocument};
use quotesync_server::{FieldRules, QuotationServer, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;

/// Builds a payload from a JSON object literal.
///
/// # Panics
///
/// Panics if `value` is not a JSON object.
pub fn payload(value: Value) -> Payload {
    Payload::from_json(value).expect("payload fixture must be a JSON object")
}

/// A representative quotation payload.
pub fn sample_quotation() -> Payload {
    payload(json!({
        "customer": "Acme Corp",
        "currency": "EUR",
        "price": 100,
        "discount": 0,
        "services": [
            {"name": "Design", "hours": 12},
            {"name": "Build", "hours": 40}
        ],
        "notes": ""
    }))
}

/// Validation rules matching [`sample_quotation`].
pub fn quotation_rules() -> FieldRules {
    FieldRules::new()
        .require("customer")
        .non_negative("price")
        .non_negative("discount")
}

/// An in-memory server holding one document.
pub struct SeededServer {
    /// The server.
    pub server: Arc<QuotationServer>,
    /// The seeded document id.
    pub id: DocumentId,
}

impl SeededServer {
    /// Seeds a default server with `payload` at `version`.
    pub fn at_version(payload: Payload, version: u64) -> Self {
        Self::with_server(QuotationServer::new(ServerConfig::default()), payload, version)
    }

    /// Seeds `server` with `payload` at `version`.
    pub fn with_server(server: QuotationServer, payload: Payload, version: u64) -> Self {
        let doc = QuotationDocument::new(DocumentId::new(), payload).with_version(version);
        let id = doc.id;
        server.store().insert(doc);
        Self {
            server: Arc::new(server),
            id,
        }
    }

    /// Returns the current authoritative document.
    ///
    /// # Panics
    ///
    /// Panics if the document was removed.
    pub fn current(&self) -> QuotationDocument {
        self.server
            .document(&self.id)
            .expect("seeded document must exist")
    }

    /// Returns the current authoritative version.
    pub fn version(&self) -> u64 {
        self.current().version
    }

    /// Writes `patch` on top of the current server payload, as another
    /// session would. Returns the new document.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the write.
    pub fn advance(&self, patch: Payload) -> QuotationDocument {
        let current = self.current();
        let mut next = current.payload.clone();
        next.apply_patch(&patch);
        let response = self
            .server
            .handle_push(PushRequest::new(self.id, next, current.version))
            .expect("advance must be valid");
        assert!(response.accepted, "advance must not race");
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_server_advances_by_one() {
        let seeded = SeededServer::at_version(payload(json!({"price": 100})), 3);
        assert_eq!(seeded.version(), 3);

        let doc = seeded.advance(payload(json!({"price": 120})));
        assert_eq!(doc.version, 4);
        assert_eq!(doc.payload, payload(json!({"price": 120})));
    }

    #[test]
    fn sample_quotation_passes_rules() {
        use quotesync_server::PayloadValidator;
        assert!(quotation_rules().validate(&sample_quotation()).is_empty());
    }
}
