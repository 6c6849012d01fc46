//! # QuoteSync Server
//!
//! Reference authoritative side for quotation replica sync.
//!
//! This crate provides:
//! - An in-memory document store with atomic compare-and-increment writes
//! - Payload validation rules
//! - Typed and CBOR request handlers (push, pull)
//!
//! # Protocol
//!
//! Every session pushes the full payload together with the version it was
//! based on:
//! 1. If the version matches the stored one, the payload is stored, the
//!    version is incremented by exactly one and `updated_at` is stamped.
//! 2. Otherwise the push is rejected and the response carries the current
//!    stored state so the session can diff without another round trip.
//!
//! No lock is held across sessions: the version check is the only
//! coordination point, which makes writes linearizable at acceptance.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;
mod validation;

pub use config::{ServerConfig, DEFAULT_MAX_PAYLOAD_FIELDS};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::{QuotationServer, PULL_PATH, PUSH_PATH};
pub use store::AuthoritativeStore;
pub use validation::{AcceptAll, FieldRules, PayloadValidator};
