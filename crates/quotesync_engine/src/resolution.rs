//! Resolution of surfaced conflicts.
//!
//! A plan is computed from the pending conflict alone; the coordinator
//! carries it out. Every plan that pushes uses the server version captured
//! at detection time as the expected version, so a server that moved again
//! in the meantime rejects the push and the detector runs once more.

use crate::detector::carry_local_changes;
use quotesync_protocol::{ConflictInfo, Payload, QuotationDocument, ResolutionStrategy};

/// A conflict waiting for a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConflict {
    /// The conflict as surfaced to the caller.
    pub info: ConflictInfo,
    /// The server copy returned with the rejection.
    pub server: QuotationDocument,
}

/// What to do to resolve a conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionPlan {
    /// Rebase onto the server copy and push `payload` against its version.
    Push {
        /// Payload to push.
        payload: Payload,
        /// Version the push is based on.
        expected_version: u64,
    },
    /// Drop local edits and adopt the server copy.
    Adopt(QuotationDocument),
    /// Leave the conflict in place.
    Retain,
}

/// Computes the plan for `strategy`.
pub fn plan(
    strategy: ResolutionStrategy,
    conflict: &PendingConflict,
    base: &Payload,
    working: &Payload,
) -> ResolutionPlan {
    let expected_version = conflict.server.version;
    match strategy {
        ResolutionStrategy::KeepLocal => ResolutionPlan::Push {
            payload: working.clone(),
            expected_version,
        },
        ResolutionStrategy::Merge => ResolutionPlan::Push {
            payload: merge(&conflict.info, base, working, &conflict.server.payload),
            expected_version,
        },
        ResolutionStrategy::KeepServer => ResolutionPlan::Adopt(conflict.server.clone()),
        ResolutionStrategy::Cancel => ResolutionPlan::Retain,
    }
}

/// Field-level union of both replicas.
///
/// Conflicting fields take the local value. Any other field takes the side
/// that changed it since `base`, or the common value when neither did.
pub fn merge(info: &ConflictInfo, base: &Payload, working: &Payload, server: &Payload) -> Payload {
    let mut merged = carry_local_changes(base, working, server);
    for field in &info.conflicting_fields {
        merged.set_or_remove(field, working.get(field));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quotesync_protocol::{conflicting_fields, DocumentId};
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        Payload::from_json(value).unwrap()
    }

    fn pending(base: &Payload, working: &Payload, server: Payload) -> PendingConflict {
        let id = DocumentId::new();
        let now = Utc::now();
        let fields = conflicting_fields(base, working, &server);
        PendingConflict {
            info: ConflictInfo::new(id, (3, now), (4, now), fields).unwrap(),
            server: QuotationDocument::new(id, server)
                .with_version(4)
                .with_updated_at(now),
        }
    }

    #[test]
    fn keep_local_pushes_working_against_server_version() {
        let base = payload(json!({"price": 100}));
        let working = payload(json!({"price": 110}));
        let conflict = pending(&base, &working, payload(json!({"price": 120})));

        assert_eq!(
            plan(ResolutionStrategy::KeepLocal, &conflict, &base, &working),
            ResolutionPlan::Push {
                payload: working.clone(),
                expected_version: 4,
            }
        );
    }

    #[test]
    fn keep_server_adopts() {
        let base = payload(json!({"price": 100}));
        let working = payload(json!({"price": 110}));
        let conflict = pending(&base, &working, payload(json!({"price": 120})));

        assert_eq!(
            plan(ResolutionStrategy::KeepServer, &conflict, &base, &working),
            ResolutionPlan::Adopt(conflict.server.clone())
        );
    }

    #[test]
    fn cancel_retains() {
        let base = payload(json!({"price": 100}));
        let working = payload(json!({"price": 110}));
        let conflict = pending(&base, &working, payload(json!({"price": 120})));

        assert_eq!(
            plan(ResolutionStrategy::Cancel, &conflict, &base, &working),
            ResolutionPlan::Retain
        );
    }

    #[test]
    fn merge_prefers_local_on_conflict_and_unions_the_rest() {
        let base = payload(json!({"price": 100, "discount": 0, "notes": "a", "terms": "net30"}));
        let working = payload(json!({"price": 110, "discount": 5, "notes": "a", "terms": "net30"}));
        let server = payload(json!({"price": 120, "discount": 0, "notes": "b"}));
        let conflict = pending(&base, &working, server);

        let merged = merge(&conflict.info, &base, &working, &conflict.server.payload);
        assert_eq!(
            merged,
            payload(json!({"price": 110, "discount": 5, "notes": "b"}))
        );
    }
}
