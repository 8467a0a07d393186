//! # Conduit Dispatch
//!
//! Routes requests to the features of registered services.
//!
//! ## Features
//!
//! - **Signatures**: route patterns with named, positional, optional and
//!   trailing captures
//! - **Binding plans**: handler parameters validated at registration and
//!   replayed per request
//! - **Stages**: prologue, main and epilogue handlers with fault isolation
//! - **Access levels**: public, internal and private features
//! - **Local endpoint**: `local://` plugs served in-process
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conduit_dispatch::prelude::*;
//! use conduit_core::Message;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.register(
//!     Service::new("users", "/users").feature(
//!         Feature::builder("GET", "{id}")
//!             .param(ParamSpec::auto("id", ParamKind::Int))
//!             .handler(sync_handler(|args| {
//!                 Ok(Message::ok_json(json!({ "id": args.int("id") })))
//!             })),
//!     ),
//! )?;
//!
//! let endpoint = LocalEndpoint::new("app", dispatcher)?;
//! # let _ = endpoint;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod feature;
pub mod local;
pub mod service;
pub mod signature;

pub use binding::{Arg, BindingPlan, Extractor, FeatureArgs, ParamKind, ParamSource, ParamSpec};
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use context::FeatureContext;
pub use dispatcher::Dispatcher;
pub use error::{FeatureError, Result};
pub use feature::{
    AccessLevel, Feature, FeatureBuilder, FeatureInfo, StageHandler, async_handler, sync_handler,
};
pub use local::LocalEndpoint;
pub use service::Service;
pub use signature::{FeatureSignature, PathArguments, UNBOUNDED};

pub mod prelude {
    pub use crate::binding::{FeatureArgs, ParamKind, ParamSpec};
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::FeatureError;
    pub use crate::feature::{AccessLevel, Feature, async_handler, sync_handler};
    pub use crate::local::LocalEndpoint;
    pub use crate::service::Service;
}
