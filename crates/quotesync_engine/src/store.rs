//! In-memory working copy of one document.

use chrono::{DateTime, Utc};
use quotesync_protocol::{DocumentId, Payload, QuotationDocument};

/// Holds the working copy, its version, the dirty flag and the
/// last-synced snapshot used as the common ancestor for diffing.
///
/// Pure state: nothing here blocks or performs I/O. `mutate` is the only
/// way `dirty` becomes true.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    doc: QuotationDocument,
    dirty: bool,
    last_synced: Payload,
}

impl DocumentStore {
    /// Loads a document as the working copy.
    pub fn load(doc: QuotationDocument) -> Self {
        let last_synced = doc.payload.clone();
        Self {
            doc,
            dirty: false,
            last_synced,
        }
    }

    /// Restores a working copy that may carry unsynced edits.
    pub fn restore(base: QuotationDocument, working: Payload, dirty: bool) -> Self {
        let last_synced = base.payload;
        Self {
            doc: QuotationDocument {
                payload: working,
                ..base
            },
            dirty,
            last_synced,
        }
    }

    /// Shallow-merges `patch` into the working payload and marks the copy dirty.
    pub fn mutate(&mut self, patch: &Payload) {
        self.doc.payload.apply_patch(patch);
        self.dirty = true;
    }

    /// Adopts an authoritative copy, discarding the working payload.
    pub fn apply_authoritative(&mut self, doc: QuotationDocument) {
        self.last_synced = doc.payload.clone();
        self.doc = doc;
        self.dirty = false;
    }

    /// Records that `pushed` was accepted as `version`.
    ///
    /// Edits made while the push was in flight stay in the working copy and
    /// keep it dirty.
    pub fn acknowledge_push(&mut self, pushed: Payload, version: u64, updated_at: DateTime<Utc>) {
        self.dirty = self.doc.payload != pushed;
        self.last_synced = pushed;
        self.doc.version = version;
        self.doc.updated_at = updated_at;
    }

    /// Moves the base to `server` and replaces the working payload with `working`.
    ///
    /// Used by fast-forward and by resolutions that push: the server version
    /// becomes the new expected version.
    pub fn rebase(&mut self, server: QuotationDocument, working: Payload) {
        self.dirty = working != server.payload;
        self.last_synced = server.payload;
        self.doc = QuotationDocument {
            payload: working,
            ..server
        };
    }

    /// Returns the document id.
    pub fn id(&self) -> DocumentId {
        self.doc.id
    }

    /// Returns the local version.
    pub fn version(&self) -> u64 {
        self.doc.version
    }

    /// Returns the timestamp of the local base version.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.doc.updated_at
    }

    /// Returns the working document.
    pub fn document(&self) -> &QuotationDocument {
        &self.doc
    }

    /// Returns the working payload.
    pub fn working(&self) -> &Payload {
        &self.doc.payload
    }

    /// Returns the payload as of the last successful push or pull.
    pub fn last_synced(&self) -> &Payload {
        &self.last_synced
    }

    /// Returns true if there are local edits not yet confirmed by the server.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
