// Error types for message handling

use std::time::Duration;
use thiserror::Error;

/// Result type for message operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The message was closed; its body can no longer be accessed.
    #[error("message is already closed")]
    AlreadyClosed,

    /// The live body stream was handed off to a consumer.
    #[error("message body stream was already consumed")]
    BodyConsumed,

    /// The body is a live stream that has not been memorized yet.
    #[error("message body is an unread stream; memorize it first")]
    NotMemorized,

    /// Only messages with replayable content can be cloned.
    #[error("message is not cloneable")]
    NotCloneable,

    /// Memorization read more than the allowed number of bytes.
    #[error("message body exceeds the {limit} byte buffer limit")]
    BufferOverflow { limit: u64 },

    /// Memorization did not finish within the allotted time.
    #[error("message body transfer timed out after {0:?}")]
    Timeout(Duration),

    /// The body could not be converted to the requested representation.
    #[error("invalid message body: {0}")]
    InvalidBody(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a memorization timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Check if this error signals reuse of a closed or drained message.
    ///
    /// These are programming errors on the caller's side.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::AlreadyClosed | Error::BodyConsumed)
    }
}
