//! Feature registration and execution errors.

use conduit_core::{Message, Status};
use thiserror::Error;

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, Error)]
pub enum FeatureError {
    /// The route signature does not follow the grammar.
    #[error("invalid feature signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    /// The verb is neither `*` nor a valid HTTP method.
    #[error("invalid feature verb '{0}'")]
    InvalidVerb(String),

    /// A handler parameter cannot be bound the way it was declared.
    #[error("cannot bind parameter '{parameter}': {reason}")]
    BindingType { parameter: String, reason: String },

    /// Two handler parameters share a name.
    #[error("duplicate handler parameter '{0}'")]
    DuplicateParameter(String),

    /// A feature was registered without a main handler.
    #[error("feature '{0}' has no handler")]
    MissingHandler(String),

    /// A request value could not be converted to the declared type.
    #[error("invalid value for '{parameter}': {message}")]
    BadArgument { parameter: String, message: String },

    /// The handler reported a failure.
    #[error("handler fault: {0}")]
    Handler(String),

    #[error(transparent)]
    Core(#[from] conduit_core::Error),
}

impl FeatureError {
    /// Check if this error is raised while registering a feature.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature { .. }
                | Self::InvalidVerb(_)
                | Self::BindingType { .. }
                | Self::DuplicateParameter(_)
                | Self::MissingHandler(_)
        )
    }

    /// Status reported to the caller when this error ends a request.
    pub fn status(&self) -> Status {
        match self {
            Self::BadArgument { .. } => Status::BAD_REQUEST,
            _ => Status::INTERNAL_ERROR,
        }
    }

    /// Convert into a response with the structured error body.
    pub fn into_message(self) -> Message {
        Message::error(self.status(), self.to_string())
    }
}
