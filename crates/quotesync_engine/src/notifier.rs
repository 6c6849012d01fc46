//! Cross-session change notifications.
//!
//! An in-process topic per document id. Sessions publish after every
//! accepted push; subscribers decide on their own whether to pull.

use parking_lot::Mutex;
use quotesync_protocol::DocumentId;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// A "remote changed" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteChange {
    /// Document that changed.
    pub document_id: DocumentId,
    /// Version the server accepted.
    pub version: u64,
    /// Session that wrote it.
    pub origin: Uuid,
}

/// Publish/subscribe bus keyed by document id.
#[derive(Debug, Default)]
pub struct SessionBus {
    topics: Mutex<HashMap<DocumentId, broadcast::Sender<RemoteChange>>>,
}

impl SessionBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to changes of `id`.
    pub fn subscribe(&self, id: DocumentId) -> broadcast::Receiver<RemoteChange> {
        self.topics
            .lock()
            .entry(id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes a new version of `id`. Returns the number of receivers.
    pub fn notify_remote_change(&self, id: DocumentId, version: u64, origin: Uuid) -> usize {
        let mut topics = self.topics.lock();
        let Some(sender) = topics.get(&id) else {
            return 0;
        };
        match sender.send(RemoteChange {
            document_id: id,
            version,
            origin,
        }) {
            Ok(receivers) => {
                debug!(doc_id = %id, version, receivers, "remote change published");
                receivers
            }
            Err(_) => {
                topics.remove(&id);
                0
            }
        }
    }

    /// Returns the number of live subscribers for `id`.
    pub fn subscriber_count(&self, id: &DocumentId) -> usize {
        self.topics
            .lock()
            .get(id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_changes_for_their_document() {
        let bus = SessionBus::new();
        let id = DocumentId::new();
        let other = DocumentId::new();
        let origin = Uuid::new_v4();

        let mut rx = bus.subscribe(id);
        let mut other_rx = bus.subscribe(other);

        assert_eq!(bus.notify_remote_change(id, 5, origin), 1);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.document_id, id);
        assert_eq!(change.version, 5);
        assert_eq!(change.origin, origin);

        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers() {
        let bus = SessionBus::new();
        let id = DocumentId::new();
        assert_eq!(bus.notify_remote_change(id, 1, Uuid::new_v4()), 0);

        let rx = bus.subscribe(id);
        assert_eq!(bus.subscriber_count(&id), 1);
        drop(rx);
        assert_eq!(bus.notify_remote_change(id, 2, Uuid::new_v4()), 0);
        assert_eq!(bus.subscriber_count(&id), 0);
    }
}
