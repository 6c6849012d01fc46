//! Conflict description and resolution strategies.

use crate::document::DocumentId;
use crate::error::ProtocolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A divergence between the local replica and the authoritative copy.
///
/// Only built when at least one field was changed on both sides, so
/// `conflicting_fields` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// Document the conflict belongs to.
    pub document_id: DocumentId,
    /// Version the local replica was based on.
    pub local_version: u64,
    /// Current authoritative version.
    pub server_version: u64,
    /// Timestamp of the local base version.
    pub local_updated_at: DateTime<Utc>,
    /// Timestamp of the authoritative version.
    pub server_updated_at: DateTime<Utc>,
    /// Fields changed on both sides, in name order.
    pub conflicting_fields: Vec<String>,
}

impl ConflictInfo {
    /// Creates a conflict description. Returns `None` if no field conflicts.
    pub fn new(
        document_id: DocumentId,
        local: (u64, DateTime<Utc>),
        server: (u64, DateTime<Utc>),
        fields: BTreeSet<String>,
    ) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            document_id,
            local_version: local.0,
            server_version: server.0,
            local_updated_at: local.1,
            server_updated_at: server.1,
            conflicting_fields: fields.into_iter().collect(),
        })
    }

    /// Returns true if `field` is in conflict.
    pub fn is_conflicting(&self, field: &str) -> bool {
        self.conflicting_fields.iter().any(|f| f == field)
    }
}

/// How a surfaced conflict is resolved.
///
/// The set is closed: parsing any other name fails instead of falling back
/// to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Overwrite the server copy with the local working payload.
    KeepLocal,
    /// Discard local unsynced changes and adopt the server copy.
    KeepServer,
    /// Field-level union; local wins on conflicting fields.
    Merge,
    /// Leave the conflict in place.
    Cancel,
}

impl ResolutionStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [ResolutionStrategy; 4] = [
        ResolutionStrategy::KeepLocal,
        ResolutionStrategy::KeepServer,
        ResolutionStrategy::Merge,
        ResolutionStrategy::Cancel,
    ];

    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::KeepLocal => "keep-local",
            ResolutionStrategy::KeepServer => "keep-server",
            ResolutionStrategy::Merge => "merge",
            ResolutionStrategy::Cancel => "cancel",
        }
    }

    /// Returns true if resolving with this strategy writes to the server.
    pub fn pushes(&self) -> bool {
        matches!(self, ResolutionStrategy::KeepLocal | ResolutionStrategy::Merge)
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownStrategy(s.to_string()))
    }
}
