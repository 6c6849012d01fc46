//! The quotation document and its opaque payload.

use crate::error::ProtocolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a quotation document.
///
/// Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generates a fresh random document id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidDocumentId(s.to_string()))
    }
}

/// Business data of a quotation, keyed by top-level field name.
///
/// Sync code never looks inside a field value; it only compares values
/// field by field. Keys are kept sorted so every field listing derived
/// from a payload is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a payload from a JSON object. Returns `None` for any other JSON value.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Sets or removes a field depending on `value`.
    pub fn set_or_remove(&mut self, field: &str, value: Option<&Value>) {
        match value {
            Some(value) => {
                self.0.insert(field.to_string(), value.clone());
            }
            None => {
                self.0.remove(field);
            }
        }
    }

    /// Returns true if the field is present.
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Iterates over field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Shallow-merges `patch` into this payload.
    ///
    /// Every field in the patch replaces the field of the same name; fields
    /// not named by the patch are left alone.
    pub fn apply_patch(&mut self, patch: &Payload) {
        for (field, value) in &patch.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// Converts the payload into a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Payload {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// A replica of one quotation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationDocument {
    /// Stable identifier.
    pub id: DocumentId,
    /// Version assigned by the authoritative side. Incremented by exactly
    /// one on every accepted write.
    pub version: u64,
    /// Authoritative timestamp of the last accepted write.
    pub updated_at: DateTime<Utc>,
    /// Opaque business data.
    pub payload: Payload,
}

impl QuotationDocument {
    /// Creates a document at version 0.
    pub fn new(id: DocumentId, payload: Payload) -> Self {
        Self {
            id,
            version: 0,
            updated_at: Utc::now(),
            payload,
        }
    }

    /// Sets the version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Sets the timestamp.
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_from_json_object() {
        let payload = Payload::from_json(json!({"price": 100, "customer": "ACME"})).unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get("price"), Some(&json!(100)));

        assert!(Payload::from_json(json!([1, 2, 3])).is_none());
        assert!(Payload::from_json(json!("price")).is_none());
    }

    #[test]
    fn patch_is_shallow() {
        let mut payload =
            Payload::from_json(json!({"price": 100, "services": {"design": 1, "build": 2}}))
                .unwrap();
        let patch = Payload::from_json(json!({"services": {"design": 3}, "discount": 5})).unwrap();

        payload.apply_patch(&patch);

        assert_eq!(payload.get("price"), Some(&json!(100)));
        assert_eq!(payload.get("discount"), Some(&json!(5)));
        // Nested objects are replaced, not merged.
        assert_eq!(payload.get("services"), Some(&json!({"design": 3})));
    }

    #[test]
    fn field_names_are_sorted() {
        let payload = Payload::from_json(json!({"zeta": 1, "alpha": 2, "mid": 3})).unwrap();
        let names: Vec<_> = payload.field_names().cloned().collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn set_or_remove() {
        let mut payload = Payload::from_json(json!({"price": 100})).unwrap();
        payload.set_or_remove("price", None);
        assert!(!payload.contains_field("price"));

        payload.set_or_remove("price", Some(&json!(7)));
        assert_eq!(payload.get("price"), Some(&json!(7)));
    }

    #[test]
    fn document_id_parse() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let err = "not-a-uuid".parse::<DocumentId>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidDocumentId(_)));
    }

    #[test]
    fn new_document_starts_at_version_zero() {
        let doc = QuotationDocument::new(DocumentId::new(), Payload::new());
        assert_eq!(doc.version, 0);
        assert_eq!(doc.with_version(4).version, 4);
    }
}
