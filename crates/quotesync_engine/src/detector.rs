//! Conflict detection on rejected pushes.

use crate::store::DocumentStore;
use quotesync_protocol::{changed_fields, conflicting_fields, ConflictInfo, Payload, QuotationDocument};

/// What the detector decided for a rejected push.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Only non-overlapping fields changed. The payload holds the local
    /// edits carried onto the server payload and is ready to push against
    /// the server version.
    FastForward(Payload),
    /// Both replicas changed at least one field to different values.
    Conflict(ConflictInfo),
}

impl Detection {
    /// Returns true for [`Detection::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Detection::Conflict(_))
    }
}

/// Compares the local replica with the server copy returned by a rejection.
///
/// The store's last-synced payload is the common ancestor. The working
/// payload is read at detection time, so edits made while the push was in
/// flight take part in the comparison.
pub fn detect(store: &DocumentStore, server: &QuotationDocument) -> Detection {
    let base = store.last_synced();
    let working = store.working();
    let fields = conflicting_fields(base, working, &server.payload);
    match ConflictInfo::new(
        store.id(),
        (store.version(), store.updated_at()),
        (server.version, server.updated_at),
        fields,
    ) {
        Some(info) => Detection::Conflict(info),
        None => Detection::FastForward(carry_local_changes(base, working, &server.payload)),
    }
}

/// Applies every field `working` changed since `base` onto `server`.
///
/// Fields the local replica removed are removed from the result.
pub fn carry_local_changes(base: &Payload, working: &Payload, server: &Payload) -> Payload {
    let mut merged = server.clone();
    for field in changed_fields(base, working) {
        merged.set_or_remove(&field, working.get(&field));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotesync_protocol::DocumentId;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        Payload::from_json(value).unwrap()
    }

    /// Local replica synced at v3, then edited with `patch`; server at v4.
    fn replicas(base: Value, patch: Value, server: Value) -> (DocumentStore, QuotationDocument) {
        let id = DocumentId::new();
        let mut store =
            DocumentStore::load(QuotationDocument::new(id, payload(base)).with_version(3));
        store.mutate(&payload(patch));
        let server = QuotationDocument::new(id, payload(server)).with_version(4);
        (store, server)
    }

    #[test]
    fn disjoint_edits_fast_forward() {
        let (store, server) = replicas(
            json!({"price": 100}),
            json!({"discount": 10}),
            json!({"price": 120}),
        );

        assert_eq!(
            detect(&store, &server),
            Detection::FastForward(payload(json!({"price": 120, "discount": 10})))
        );
    }

    #[test]
    fn overlapping_edit_is_conflict() {
        let (store, server) = replicas(
            json!({"price": 100}),
            json!({"price": 110}),
            json!({"price": 120}),
        );

        let detection = detect(&store, &server);
        assert!(detection.is_conflict());
        let Detection::Conflict(info) = detection else {
            unreachable!()
        };
        assert_eq!(info.conflicting_fields, vec!["price"]);
        assert_eq!(info.local_version, 3);
        assert_eq!(info.server_version, 4);
        assert_eq!(info.document_id, store.id());
    }

    #[test]
    fn same_value_on_both_sides_is_not_a_conflict() {
        let (store, server) = replicas(
            json!({"price": 100}),
            json!({"price": 120}),
            json!({"price": 120}),
        );

        assert_eq!(
            detect(&store, &server),
            Detection::FastForward(payload(json!({"price": 120})))
        );
    }

    #[test]
    fn local_removal_is_carried() {
        let base = payload(json!({"price": 100, "notes": "rush"}));
        let working = payload(json!({"price": 100}));
        let server = payload(json!({"price": 130, "notes": "rush"}));

        assert_eq!(
            carry_local_changes(&base, &working, &server),
            payload(json!({"price": 130}))
        );
    }
}
