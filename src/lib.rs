// Conduit - URI-addressed invocation plugs and an in-process feature dispatcher
//
// A `Plug` addresses any resource by URI and carries the policy for calling
// it: headers, credentials, cookie jar, redirect budget and timeout. Plugs
// resolve their target through scored endpoints, so the same call reaches a
// remote HTTP service or an in-process `Dispatcher` without changing shape.

// Re-export the member crates
pub use conduit_core as core;
pub use conduit_dispatch as dispatch;
pub use conduit_plug as plug;

pub use conduit_core::{BodyStream, Cookie, Error, Header, Headers, Message, Status};
pub use conduit_dispatch::{
    AccessLevel, DispatchConfig, Dispatcher, Feature, FeatureArgs, FeatureContext, FeatureError,
    LocalEndpoint, ParamKind, ParamSource, ParamSpec, Service, async_handler, sync_handler,
};
pub use conduit_plug::{
    CookieJar, Plug, PlugConfig, PlugEndpoint, PlugEnvironment, PlugError, PlugHandler, RedirectHeaders,
    handler_fn,
};

// Re-export commonly used dependencies
pub use async_trait::async_trait;
pub use http::Method;
pub use serde_json::{Value, json};
pub use url::Url;

/// Prelude for common imports.
///
/// ```rust,no_run
/// use conduit::prelude::*;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = std::sync::Arc::new(Dispatcher::new());
/// dispatcher.register(
///     Service::new("hello", "/hello").feature(
///         Feature::builder("GET", "{name}")
///             .param(ParamSpec::auto("name", ParamKind::Text))
///             .handler(sync_handler(|args| {
///                 Ok(Message::ok_text(format!("hello {}", args.text("name").unwrap_or("world"))))
///             })),
///     ),
/// )?;
///
/// let env = PlugEnvironment::global();
/// env.registry().add(std::sync::Arc::new(LocalEndpoint::new("app", dispatcher)?));
///
/// let mut greeting = Plug::parse("local://app/hello/ada")?.get().await?;
/// println!("{}", greeting.to_text()?);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::{
        AccessLevel, Cookie, CookieJar, Dispatcher, Feature, FeatureArgs, FeatureError, Headers, LocalEndpoint,
        Message, Method, ParamKind, ParamSpec, Plug, PlugConfig, PlugEndpoint, PlugEnvironment, PlugError,
        PlugHandler, Service, Status, Url, async_handler, async_trait, json, sync_handler,
    };
}
