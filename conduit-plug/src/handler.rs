//! Pre and post handlers.
//!
//! Pre-handlers see the request after plug headers and cookies have been
//! merged and before it is dispatched; post-handlers see the response
//! before it is returned. Both run in registration order. Returning
//! `None` aborts the invocation with a `RequestIsNull` / `ResponseIsNull`
//! status.

use async_trait::async_trait;
use conduit_core::Message;
use http::Method;
use std::future::Future;
use url::Url;

/// Inspects or rewrites a message flowing through a plug.
#[async_trait]
pub trait PlugHandler: Send + Sync {
    /// `uri` is the plug URI, `normalized` the endpoint's rewrite of it.
    async fn handle(&self, verb: &Method, uri: &Url, normalized: &Url, message: Message) -> Option<Message>;
}

/// Handler backed by a closure. See [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`PlugHandler`].
///
/// ```rust,ignore
/// let plug = plug.with_pre_handler(handler_fn(|_verb, _uri, _normalized, mut msg: Message| async move {
///     msg.headers_mut().insert("X-Trace", "1");
///     Some(msg)
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Method, Url, Url, Message) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Message>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> PlugHandler for FnHandler<F>
where
    F: Fn(Method, Url, Url, Message) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Message>> + Send,
{
    async fn handle(&self, verb: &Method, uri: &Url, normalized: &Url, message: Message) -> Option<Message> {
        (self.f)(verb.clone(), uri.clone(), normalized.clone(), message).await
    }
}

/// Logs every message it sees and passes it through unchanged.
pub struct LoggingHandler {
    stage: &'static str,
    log_headers: bool,
}

impl LoggingHandler {
    /// Handler for the pre-handler chain.
    pub fn request() -> Self {
        Self {
            stage: "request",
            log_headers: false,
        }
    }

    /// Handler for the post-handler chain.
    pub fn response() -> Self {
        Self {
            stage: "response",
            log_headers: false,
        }
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

#[async_trait]
impl PlugHandler for LoggingHandler {
    async fn handle(&self, verb: &Method, uri: &Url, normalized: &Url, message: Message) -> Option<Message> {
        tracing::debug!(
            stage = self.stage,
            method = %verb,
            uri = %uri,
            normalized = %normalized,
            status = %message.status(),
            "plug message"
        );

        if self.log_headers {
            for (name, value) in message.headers() {
                tracing::trace!(stage = self.stage, header = %name, value = %value, "plug header");
            }
        }

        Some(message)
    }
}
