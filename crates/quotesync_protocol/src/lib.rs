//! # QuoteSync Protocol
//!
//! Document, conflict and wire types shared by the quotation sync engine
//! and the authoritative server.
//!
//! This crate provides:
//! - `QuotationDocument` and its opaque field-level `Payload`
//! - Field-level diffing against a common ancestor
//! - `ConflictInfo` and the closed `ResolutionStrategy` set
//! - Protocol messages (Push, Pull, Error)
//! - CBOR encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod conflict;
mod diff;
mod document;
mod error;
mod messages;

pub use codec::{from_cbor, to_cbor};
pub use conflict::{ConflictInfo, ResolutionStrategy};
pub use diff::{changed_fields, conflicting_fields, field_differs, union_fields};
pub use document::{DocumentId, Payload, QuotationDocument};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    ErrorKind, ErrorResponse, FieldViolation, PullRequest, PullResponse, PushOutcome,
    PushRequest, PushResponse,
};
