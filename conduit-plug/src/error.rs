//! Plug error types.

use conduit_core::Status;
use std::time::Duration;
use thiserror::Error;

/// Result type for plug operations.
pub type Result<T> = std::result::Result<T, PlugError>;

/// Errors raised by endpoints and the typed verb helpers.
///
/// The invocation pipeline itself never returns these: it folds every
/// failure into a [`Message`](conduit_core::Message) with a synthetic
/// status. Endpoints report failures through this type so that the
/// pipeline can classify them.
#[derive(Debug, Error)]
pub enum PlugError {
    /// The endpoint gave up waiting.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Could not reach the remote side.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport-level failure after the connection was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The invocation completed with a non-success status.
    #[error("Response error: {status} - {message}")]
    Response {
        /// Final status of the invocation.
        status: Status,
        /// Error message taken from the response body when available.
        message: String,
    },

    /// Invalid URI.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// A pre or post handler failed.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Message body error.
    #[error(transparent)]
    Core(#[from] conduit_core::Error),
}

impl PlugError {
    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            Self::Core(e) => e.is_timeout(),
            Self::Response { status, .. } => {
                *status == Status::REQUEST_CONNECTION_TIMEOUT
                    || *status == Status::RESPONSE_DATA_TRANSFER_TIMEOUT
            }
            _ => false,
        }
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_)) || matches!(self, Self::Http(e) if e.is_connect())
    }

    /// Get the status if this is a response error.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| Status::from_code(s.as_u16())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(PlugError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(PlugError::Core(conduit_core::Error::Timeout(Duration::from_secs(1))).is_timeout());
        assert!(
            PlugError::Response {
                status: Status::RESPONSE_DATA_TRANSFER_TIMEOUT,
                message: String::new(),
            }
            .is_timeout()
        );
        assert!(!PlugError::Connection("refused".into()).is_timeout());
    }

    #[test]
    fn test_status_accessor() {
        let err = PlugError::Response {
            status: Status::NOT_FOUND,
            message: "missing".into(),
        };
        assert_eq!(err.status(), Some(Status::NOT_FOUND));
        assert_eq!(err.to_string(), "Response error: 404 Not Found - missing");
        assert_eq!(PlugError::Handler("x".into()).status(), None);
    }
}
