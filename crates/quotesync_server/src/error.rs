//! Error types for the quotation server.

use quotesync_protocol::{DocumentId, ErrorKind, ErrorResponse, FieldViolation, ProtocolError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the quotation server.
///
/// A stale `expected_version` is not an error: it produces a rejected
/// push response.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown document.
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Payload failed business validation.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    /// Request or response could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::DocumentNotFound(_)
                | ServerError::Validation(_)
                | ServerError::Codec(_)
        )
    }

    /// Returns the HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Codec(_) => 400,
            ServerError::DocumentNotFound(_) => 404,
            ServerError::Validation(_) => 422,
            ServerError::Internal(_) => 500,
        }
    }

    /// Converts into the wire error body.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            ServerError::Validation(violations) => ErrorResponse::validation(violations.clone()),
            ServerError::DocumentNotFound(_) => {
                ErrorResponse::new(ErrorKind::NotFound, self.to_string())
            }
            ServerError::InvalidRequest(_) | ServerError::Codec(_) => {
                ErrorResponse::new(ErrorKind::InvalidRequest, self.to_string())
            }
            ServerError::Internal(_) => ErrorResponse::new(ErrorKind::Internal, self.to_string()),
        }
    }
}
