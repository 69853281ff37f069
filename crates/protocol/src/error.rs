//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while framing or parsing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message was not on channel {expected}")]
    WrongChannel { expected: String },

    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message has no `type` field")]
    MissingType,

    #[error("Unrecognized message type {0}")]
    UnknownType(String),

    #[error("Malformed grid snapshot: {0}")]
    InvalidGrid(serde_json::Error),
}
