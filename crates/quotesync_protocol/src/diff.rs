//! Field-level diffing against a common ancestor.
//!
//! Diffing never descends into field values: two values are either equal
//! or they differ. An absent field compares as distinct from every present
//! value.

use crate::document::Payload;
use std::collections::BTreeSet;

/// Returns true if `field` holds different values in `a` and `b`.
pub fn field_differs(a: &Payload, b: &Payload, field: &str) -> bool {
    a.get(field) != b.get(field)
}

/// Returns the sorted union of field names across all payloads.
pub fn union_fields(payloads: &[&Payload]) -> BTreeSet<String> {
    payloads
        .iter()
        .flat_map(|p| p.field_names().cloned())
        .collect()
}

/// Returns the fields whose value changed from `from` to `to`.
pub fn changed_fields(from: &Payload, to: &Payload) -> BTreeSet<String> {
    union_fields(&[from, to])
        .into_iter()
        .filter(|field| field_differs(from, to, field))
        .collect()
}

/// Returns the fields both replicas changed since `base` to different values.
///
/// A field edited only locally or only remotely is not a conflict; it can be
/// carried over automatically. A field both sides set to the same value is
/// not a conflict either.
pub fn conflicting_fields(base: &Payload, working: &Payload, server: &Payload) -> BTreeSet<String> {
    union_fields(&[base, working, server])
        .into_iter()
        .filter(|field| {
            field_differs(base, server, field)
                && field_differs(working, base, field)
                && field_differs(working, server, field)
        })
        .collect()
}
