//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or parsing protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// CBOR encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// A resolution strategy name outside the closed set.
    #[error("unknown resolution strategy: {0:?}")]
    UnknownStrategy(String),

    /// A document id that is not a valid UUID.
    #[error("invalid document id: {0:?}")]
    InvalidDocumentId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::UnknownStrategy("theirs".into());
        assert_eq!(err.to_string(), "unknown resolution strategy: \"theirs\"");

        let err = ProtocolError::Decode("unexpected end".into());
        assert!(err.to_string().contains("unexpected end"));
    }
}
