//! # Conduit Plug
//!
//! Immutable invocation handles for addressing any resource by URI: remote
//! HTTP services, in-process services, or anything else a registered
//! endpoint knows how to reach.
//!
//! ## Features
//!
//! - **Pluggable endpoints**: URIs are resolved against scored transports
//! - **Timeout governance**: one budget covers dispatch and body transfer
//! - **Cookie jars**: per-plug, per-task or process-wide
//! - **Redirects**: followed up to a per-plug budget
//! - **Handlers**: pre/post chains that can rewrite or veto a call
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conduit_plug::Plug;
//! use http::Method;
//! use conduit_core::Message;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plug = Plug::parse("https://api.example.com/users")?;
//!
//!     // invoke never fails; failures come back as synthetic statuses
//!     let response = plug.invoke(Method::GET, Message::ok()).await;
//!     println!("Status: {}", response.status());
//!
//!     // the verb helpers turn non-success statuses into errors
//!     let mut user = plug.at(["42"]).get().await?;
//!     println!("{}", user.to_text()?);
//!     Ok(())
//! }
//! ```

mod config;
mod cookie_jar;
mod endpoint;
mod environment;
mod error;
mod handler;
mod plug;
mod registry;

pub mod endpoints;

pub use config::{
    DEFAULT_MAX_AUTO_REDIRECTS, DEFAULT_MAX_MEMORIZE_BYTES, DEFAULT_TIMEOUT, PlugConfig,
    PlugConfigBuilder, RedirectHeaders,
};
pub use cookie_jar::{CookieJar, CookieJarStrategy, TaskLocalCookieJars, with_ambient_cookie_jar};
pub use endpoint::{PlugEndpoint, SCORE_FORCED, SCORE_NONE, SCORE_SCHEME};
pub use environment::PlugEnvironment;
pub use error::{PlugError, Result};
pub use handler::{FnHandler, LoggingHandler, PlugHandler, handler_fn};
pub use plug::{Credentials, Plug};
pub use registry::{EndpointMatch, EndpointRegistry};
