//! Payload validation.

use quotesync_protocol::{FieldViolation, Payload};
use serde_json::Value;

/// Business-rule check run on every pushed payload before it is stored.
pub trait PayloadValidator: Send + Sync {
    /// Returns every violated rule. An empty list means the payload is valid.
    fn validate(&self, payload: &Payload) -> Vec<FieldViolation>;
}

/// Validator that accepts every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl PayloadValidator for AcceptAll {
    fn validate(&self, _payload: &Payload) -> Vec<FieldViolation> {
        Vec::new()
    }
}

/// Declarative field rules.
#[derive(Debug, Default, Clone)]
pub struct FieldRules {
    required: Vec<String>,
    non_negative: Vec<String>,
}

impl FieldRules {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field` to be present and non-null.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Requires `field`, when present, to be a number no lower than zero.
    pub fn non_negative(mut self, field: impl Into<String>) -> Self {
        self.non_negative.push(field.into());
        self
    }
}

impl PayloadValidator for FieldRules {
    fn validate(&self, payload: &Payload) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        for field in &self.required {
            if matches!(payload.get(field), None | Some(Value::Null)) {
                violations.push(FieldViolation::new(field, "is required"));
            }
        }

        for field in &self.non_negative {
            match payload.get(field) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => {
                    if n.as_f64().is_some_and(|v| v < 0.0) {
                        violations.push(FieldViolation::new(field, "must not be negative"));
                    }
                }
                Some(_) => violations.push(FieldViolation::new(field, "must be a number")),
            }
        }

        violations
    }
}
