//! Authoritative document storage.

use crate::error::{ServerError, ServerResult};
use chrono::Utc;
use parking_lot::RwLock;
use quotesync_protocol::{DocumentId, Payload, PushResponse, QuotationDocument};
use std::collections::HashMap;
use tracing::debug;

/// Server-side document store.
///
/// Writes go through [`compare_and_swap`](Self::compare_and_swap), which
/// checks and increments the version under a single write lock so exactly
/// one writer wins per version.
pub struct AuthoritativeStore {
    documents: RwLock<HashMap<DocumentId, QuotationDocument>>,
}

impl AuthoritativeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new document at version 0.
    pub fn create(&self, payload: Payload) -> QuotationDocument {
        let doc = QuotationDocument::new(DocumentId::new(), payload);
        self.documents.write().insert(doc.id, doc.clone());
        doc
    }

    /// Inserts or replaces a document as-is (seeding, migration).
    pub fn insert(&self, doc: QuotationDocument) {
        self.documents.write().insert(doc.id, doc);
    }

    /// Returns the current state of a document.
    pub fn get(&self, id: &DocumentId) -> Option<QuotationDocument> {
        self.documents.read().get(id).cloned()
    }

    /// Returns the current version of a document.
    pub fn version(&self, id: &DocumentId) -> Option<u64> {
        self.documents.read().get(id).map(|doc| doc.version)
    }

    /// Stores `payload` if `expected_version` matches the stored version.
    ///
    /// On success the version is incremented by exactly one and the
    /// timestamp is stamped from the server clock. On mismatch nothing is
    /// written and the response carries the current stored state.
    pub fn compare_and_swap(
        &self,
        id: &DocumentId,
        payload: Payload,
        expected_version: u64,
    ) -> ServerResult<PushResponse> {
        let mut documents = self.documents.write();
        let doc = documents
            .get_mut(id)
            .ok_or(ServerError::DocumentNotFound(*id))?;

        if doc.version != expected_version {
            debug!(
                doc_id = %id,
                expected = expected_version,
                actual = doc.version,
                "push rejected: stale version"
            );
            return Ok(PushResponse::rejected(doc));
        }

        doc.payload = payload;
        doc.version += 1;
        doc.updated_at = Utc::now().max(doc.updated_at);
        debug!(doc_id = %id, version = doc.version, "push accepted");

        Ok(PushResponse::accepted(doc))
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl Default for AuthoritativeStore {
    fn default() -> Self {
        Self::new()
    }
}
