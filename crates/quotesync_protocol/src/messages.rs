//! Protocol messages for push and pull.

use crate::codec::{from_cbor, to_cbor};
use crate::document::{DocumentId, Payload, QuotationDocument};
use crate::error::ProtocolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Push request from a session.
///
/// The server accepts it only if `expected_version` equals its stored version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Document being written.
    pub id: DocumentId,
    /// Full payload to store.
    pub payload: Payload,
    /// Version the payload was based on.
    pub expected_version: u64,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(id: DocumentId, payload: Payload, expected_version: u64) -> Self {
        Self {
            id,
            payload,
            expected_version,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}

/// Push response from the server.
///
/// On acceptance `version` is the new version. On rejection the response
/// carries the full current server state so the caller can diff without a
/// second round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Whether the write was accepted.
    pub accepted: bool,
    /// New version if accepted, current server version otherwise.
    pub version: u64,
    /// Stored payload after the call.
    pub payload: Payload,
    /// Stored timestamp after the call.
    pub updated_at: DateTime<Utc>,
}

impl PushResponse {
    /// Creates an accepted response from the stored document.
    pub fn accepted(doc: &QuotationDocument) -> Self {
        Self {
            accepted: true,
            version: doc.version,
            payload: doc.payload.clone(),
            updated_at: doc.updated_at,
        }
    }

    /// Creates a rejected response carrying the current server document.
    pub fn rejected(doc: &QuotationDocument) -> Self {
        Self {
            accepted: false,
            version: doc.version,
            payload: doc.payload.clone(),
            updated_at: doc.updated_at,
        }
    }

    /// Converts into the outcome seen by the sync engine.
    pub fn into_outcome(self) -> PushOutcome {
        if self.accepted {
            PushOutcome::Accepted {
                new_version: self.version,
                updated_at: self.updated_at,
            }
        } else {
            PushOutcome::Rejected {
                server_version: self.version,
                server_payload: self.payload,
                server_updated_at: self.updated_at,
            }
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}

/// Result of a push as seen by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The server stored the payload.
    Accepted {
        /// Version assigned to the write.
        new_version: u64,
        /// Authoritative timestamp of the write.
        updated_at: DateTime<Utc>,
    },
    /// The push was based on a stale version.
    Rejected {
        /// Current server version.
        server_version: u64,
        /// Current server payload.
        server_payload: Payload,
        /// Current server timestamp.
        server_updated_at: DateTime<Utc>,
    },
}

impl PushOutcome {
    /// Returns true if the push was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted { .. })
    }
}

/// Pull request from a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Document to fetch.
    pub id: DocumentId,
}

impl PullRequest {
    /// Creates a new pull request.
    pub fn new(id: DocumentId) -> Self {
        Self { id }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}

/// Pull response carrying the current authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Document id.
    pub id: DocumentId,
    /// Current version.
    pub version: u64,
    /// Current payload.
    pub payload: Payload,
    /// Current timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PullResponse {
    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }

    /// Converts into a document.
    pub fn into_document(self) -> QuotationDocument {
        QuotationDocument {
            id: self.id,
            version: self.version,
            updated_at: self.updated_at,
            payload: self.payload,
        }
    }
}

impl From<&QuotationDocument> for PullResponse {
    fn from(doc: &QuotationDocument) -> Self {
        Self {
            id: doc.id,
            version: doc.version,
            payload: doc.payload.clone(),
            updated_at: doc.updated_at,
        }
    }
}

/// A business rule violated by a pushed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Offending field.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldViolation {
    /// Creates a new violation.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Unknown document id.
    NotFound,
    /// Payload failed business validation.
    Validation,
    /// Malformed or oversized request.
    InvalidRequest,
    /// Server-side failure.
    Internal,
}

/// Error body returned instead of a response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Category.
    pub kind: ErrorKind,
    /// Message.
    pub message: String,
    /// Offending fields, for validation failures.
    #[serde(default)]
    pub violations: Vec<FieldViolation>,
}

impl ErrorResponse {
    /// Creates an error response without field violations.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            violations: Vec::new(),
        }
    }

    /// Creates a validation error response.
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        Self {
            kind: ErrorKind::Validation,
            message: format!("payload rejected: {}", fields.join(", ")),
            violations,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(version: u64) -> QuotationDocument {
        let payload = Payload::from_json(json!({"price": 120, "customer": "ACME"})).unwrap();
        QuotationDocument::new(DocumentId::new(), payload).with_version(version)
    }

    #[test]
    fn rejected_response_carries_server_state() {
        let doc = document(4);
        let outcome = PushResponse::rejected(&doc).into_outcome();

        match outcome {
            PushOutcome::Rejected {
                server_version,
                server_payload,
                server_updated_at,
            } => {
                assert_eq!(server_version, 4);
                assert_eq!(server_payload, doc.payload);
                assert_eq!(server_updated_at, doc.updated_at);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn accepted_response() {
        let doc = document(5);
        let outcome = PushResponse::accepted(&doc).into_outcome();
        assert!(outcome.is_accepted());
        assert_eq!(
            outcome,
            PushOutcome::Accepted {
                new_version: 5,
                updated_at: doc.updated_at
            }
        );
    }

    #[test]
    fn push_request_wire_format() {
        let doc = document(3);
        let request = PushRequest::new(doc.id, doc.payload.clone(), 3);
        let decoded = PushRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn pull_response_into_document() {
        let doc = document(7);
        let bytes = PullResponse::from(&doc).encode().unwrap();
        let decoded = PullResponse::decode(&bytes).unwrap().into_document();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn validation_error_names_fields() {
        let response = ErrorResponse::validation(vec![
            FieldViolation::new("price", "must not be negative"),
            FieldViolation::new("customer", "is required"),
        ]);
        assert_eq!(response.kind, ErrorKind::Validation);
        assert!(response.message.contains("price"));
        assert!(response.message.contains("customer"));

        let decoded = ErrorResponse::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded.violations.len(), 2);
    }

    #[test]
    fn push_response_is_not_an_error_response() {
        let bytes = PushResponse::accepted(&document(1)).encode().unwrap();
        assert!(ErrorResponse::decode(&bytes).is_err());
    }
}
