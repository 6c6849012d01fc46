//! CLI command implementations.

pub mod inspect_draft;
pub mod simulate;
