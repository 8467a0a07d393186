//! # Conduit Core
//!
//! The payload types threaded through the Conduit invocation pipeline and
//! feature dispatcher.
//!
//! ## Features
//!
//! - **Status codes**: HTTP codes plus the synthetic sub-200 pipeline codes
//! - **Headers**: ordered, case-insensitive multimap
//! - **Cookies**: URI-scoped cookies with `Set-Cookie` parsing
//! - **Messages**: lazily converted document / bytes / stream bodies
//! - **Logging**: `tracing-subscriber` bootstrap
//!
//! ## Quick Start
//!
//! ```rust
//! use conduit_core::{Message, Status};
//!
//! let mut msg = Message::ok_text("hello");
//! assert_eq!(msg.status(), Status::OK);
//! assert_eq!(msg.to_text().unwrap(), "hello");
//!
//! msg.close();
//! assert!(msg.to_bytes().is_err());
//! ```

pub mod cookie;
pub mod error;
pub mod headers;
pub mod logging;
pub mod message;
pub mod status;
pub mod uri;

pub use cookie::Cookie;
pub use error::{Error, Result};
pub use headers::{Header, Headers};
pub use message::{BodyStream, MIME_BINARY, MIME_JSON, MIME_TEXT, Message};
pub use status::Status;
