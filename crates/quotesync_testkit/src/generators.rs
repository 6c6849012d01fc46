//! Property-based test generators using proptest.
//!
//! Field names come from a small pool so that independently generated
//! payloads and patches overlap often enough to exercise conflicts.

use proptest::prelude::*;
use quotesync_protocol::Payload;
use serde_json::Value;

/// Field names used by the generators.
pub const FIELD_POOL: &[&str] = &[
    "customer", "currency", "price", "discount", "services", "notes", "terms",
];

/// Strategy for field names drawn from [`FIELD_POOL`].
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(FIELD_POOL).prop_map(str::to_string)
}

/// Strategy for opaque field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (0i64..10_000).prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for whole payloads.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..FIELD_POOL.len())
        .prop_map(Payload::from)
}

/// Strategy for non-empty patches.
pub fn patch_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 1..4)
        .prop_map(Payload::from)
}

/// Strategy for a base payload with one patch per replica.
pub fn divergence_strategy() -> impl Strategy<Value = (Payload, Payload, Payload)> {
    (payload_strategy(), patch_strategy(), patch_strategy())
}

/// Applies `patch` to a copy of `base`.
pub fn patched(base: &Payload, patch: &Payload) -> Payload {
    let mut next = base.clone();
    next.apply_patch(patch);
    next
}
