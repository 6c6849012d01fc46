//! Local draft persistence.
//!
//! A draft lets a dirty working copy survive a session restart. Drafts are
//! never consulted for conflict detection; that is always re-derived from
//! the version the server returns.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use quotesync_protocol::{from_cbor, to_cbor, DocumentId, Payload, QuotationDocument};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::DocumentStore;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored draft could not be decoded.
    #[error("draft corrupted: {0}")]
    Corrupted(String),

    /// A draft could not be encoded.
    #[error("draft encoding failed: {0}")]
    Encode(String),
}

/// Blob storage keyed by document id.
pub trait PersistentStorage: Send + Sync {
    /// Reads the blob for `id`, if any.
    fn read(&self, id: &DocumentId) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the blob for `id`.
    fn write(&self, id: &DocumentId, blob: &[u8]) -> StorageResult<()>;

    /// Removes the blob for `id`. Removing a missing blob is not an error.
    fn remove(&self, id: &DocumentId) -> StorageResult<()>;
}

impl<P: PersistentStorage> PersistentStorage for std::sync::Arc<P> {
    fn read(&self, id: &DocumentId) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(id)
    }

    fn write(&self, id: &DocumentId, blob: &[u8]) -> StorageResult<()> {
        (**self).write(id, blob)
    }

    fn remove(&self, id: &DocumentId) -> StorageResult<()> {
        (**self).remove(id)
    }
}

/// In-memory storage. Drafts are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<DocumentId, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored drafts.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl PersistentStorage for MemoryStorage {
    fn read(&self, id: &DocumentId) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(id).cloned())
    }

    fn write(&self, id: &DocumentId, blob: &[u8]) -> StorageResult<()> {
        self.blobs.write().insert(*id, blob.to_vec());
        Ok(())
    }

    fn remove(&self, id: &DocumentId) -> StorageResult<()> {
        self.blobs.write().remove(id);
        Ok(())
    }
}

/// One `<id>.draft` file per document in a directory.
///
/// Writes go to a temporary file that is renamed over the draft, so a crash
/// leaves either the old or the new draft.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens storage rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Returns the storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the draft path for `id`.
    pub fn draft_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.draft"))
    }
}

impl PersistentStorage for FileStorage {
    fn read(&self, id: &DocumentId) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.draft_path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, id: &DocumentId, blob: &[u8]) -> StorageResult<()> {
        let path = self.draft_path(id);
        let tmp = path.with_extension("draft.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(blob)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, id: &DocumentId) -> StorageResult<()> {
        match fs::remove_file(self.draft_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A persisted working copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    /// Document id.
    pub id: DocumentId,
    /// Version the working copy is based on.
    pub version: u64,
    /// Timestamp of that version.
    pub updated_at: DateTime<Utc>,
    /// Working payload, possibly with unsynced edits.
    pub working: Payload,
    /// Payload as of the last sync.
    pub last_synced: Payload,
    /// Whether the working copy had unsynced edits.
    pub dirty: bool,
}

impl DraftRecord {
    /// Captures the current state of a store.
    pub fn from_store(store: &DocumentStore) -> Self {
        Self {
            id: store.id(),
            version: store.version(),
            updated_at: store.updated_at(),
            working: store.working().clone(),
            last_synced: store.last_synced().clone(),
            dirty: store.is_dirty(),
        }
    }

    /// Rebuilds a store from this draft.
    pub fn into_store(self) -> DocumentStore {
        let base = QuotationDocument::new(self.id, self.last_synced)
            .with_version(self.version)
            .with_updated_at(self.updated_at);
        DocumentStore::restore(base, self.working, self.dirty)
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        to_cbor(self).map_err(|e| StorageError::Encode(e.to_string()))
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> StorageResult<Self> {
        from_cbor(bytes).map_err(|e| StorageError::Corrupted(e.to_string()))
    }

    /// Reads and decodes the draft for `id`.
    pub fn load<P: PersistentStorage + ?Sized>(
        storage: &P,
        id: &DocumentId,
    ) -> StorageResult<Option<Self>> {
        storage.read(id)?.map(|bytes| Self::decode(&bytes)).transpose()
    }

    /// Encodes and writes this draft.
    pub fn save<P: PersistentStorage + ?Sized>(&self, storage: &P) -> StorageResult<()> {
        storage.write(&self.id, &self.encode()?)
    }
}
