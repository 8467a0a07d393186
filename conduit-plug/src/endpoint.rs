//! Transport endpoint contract.

use async_trait::async_trait;
use conduit_core::Message;
use http::Method;
use std::time::Duration;
use url::Url;

use crate::{Plug, Result};

/// Score meaning "does not handle this URI".
pub const SCORE_NONE: i32 = 0;

/// Score for an endpoint that handles the URI's scheme.
pub const SCORE_SCHEME: i32 = 1;

/// Score that overrides every other endpoint (scheme rewrites,
/// loopback bridges, interceptors).
pub const SCORE_FORCED: i32 = i32::MAX;

/// A pluggable transport.
///
/// The pipeline asks every registered endpoint to [`score`](Self::score)
/// the target URI and dispatches to the highest scorer.
///
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl PlugEndpoint for Echo {
///     fn score(&self, uri: &Url) -> Option<(i32, Url)> {
///         (uri.scheme() == "echo").then(|| (SCORE_SCHEME, uri.clone()))
///     }
///
///     async fn invoke(&self, _: &Plug, _: Method, _: Url, request: Message, _: Duration) -> Result<Message> {
///         Ok(request)
///     }
/// }
/// ```
#[async_trait]
pub trait PlugEndpoint: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Score `uri` and return the normalized URI to dispatch to.
    ///
    /// `None` or a score of [`SCORE_NONE`] or below means no match.
    fn score(&self, uri: &Url) -> Option<(i32, Url)>;

    /// Send `request` to the normalized URI.
    ///
    /// `plug` is the calling configuration. The endpoint owns the request
    /// and releases its body when done.
    async fn invoke(
        &self,
        plug: &Plug,
        verb: Method,
        uri: Url,
        request: Message,
        timeout: Duration,
    ) -> Result<Message>;
}
