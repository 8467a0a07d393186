//! HTTP transport backed by `reqwest`.

use async_trait::async_trait;
use conduit_core::headers::{CONTENT_LENGTH, COOKIE, SET_COOKIE};
use conduit_core::{Cookie, Headers, MIME_BINARY, Message, Status};
use futures::{StreamExt, TryStreamExt};
use http::Method;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::endpoint::{PlugEndpoint, SCORE_SCHEME};
use crate::{Plug, PlugConfig, PlugError, Result};

/// Endpoint for `http` and `https` URIs.
///
/// Redirects are never followed here; the plug pipeline owns redirect
/// handling. The response body is returned as a live stream.
#[derive(Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(config: &PlugConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Wrap an existing client. It should not follow redirects.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(
        &self,
        verb: Method,
        uri: &Url,
        request: &mut Message,
    ) -> Result<reqwest::RequestBuilder> {
        let mut builder = self.client.request(verb, uri.clone());

        for (name, value) in request.headers() {
            if name.eq_ignore_ascii_case(CONTENT_LENGTH) || name.eq_ignore_ascii_case(COOKIE) {
                continue;
            }
            builder = builder.header(name, value);
        }
        if let Some(cookie) = cookie_header(request) {
            builder = builder.header(COOKIE, cookie);
        }

        if request.has_live_stream() {
            builder = builder.body(reqwest::Body::wrap_stream(request.to_stream()?));
        } else {
            let bytes = request.to_bytes()?;
            if !bytes.is_empty() {
                builder = builder.body(bytes);
            }
        }
        request.close();
        Ok(builder)
    }
}

/// Single `Cookie` header combining raw `Cookie` headers with the typed
/// cookies of the message.
fn cookie_header(request: &Message) -> Option<String> {
    let mut parts: Vec<String> = request
        .headers()
        .iter()
        .filter(|(name, value)| name.eq_ignore_ascii_case(COOKIE) && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
        .collect();
    if request.has_cookies() {
        parts.push(Cookie::to_request_header(request.cookies()));
    }
    (!parts.is_empty()).then(|| parts.join("; "))
}

#[async_trait]
impl PlugEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        "http"
    }

    fn score(&self, uri: &Url) -> Option<(i32, Url)> {
        matches!(uri.scheme(), "http" | "https").then(|| (SCORE_SCHEME, uri.clone()))
    }

    async fn invoke(
        &self,
        _plug: &Plug,
        verb: Method,
        uri: Url,
        mut request: Message,
        timeout: Duration,
    ) -> Result<Message> {
        debug!(method = %verb, %uri, "sending HTTP request");
        let builder = self.build_request(verb, &uri, &mut request)?;

        let response = match tokio::time::timeout(timeout, builder.send()).await {
            Err(_) => return Err(PlugError::Timeout(timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(PlugError::Timeout(timeout)),
            Ok(Err(e)) if e.is_connect() => return Err(PlugError::Connection(e.to_string())),
            Ok(Err(e)) => return Err(PlugError::Http(e)),
            Ok(Ok(response)) => response,
        };

        let status = Status::from_code(response.status().as_u16());
        debug!(%uri, %status, "received HTTP response");

        let mut headers = Headers::new();
        let mut cookies = Vec::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            if name.as_str().eq_ignore_ascii_case(SET_COOKIE)
                && let Some(cookie) = Cookie::parse_set_cookie(value, &uri)
            {
                cookies.push(cookie);
            }
            headers.append(name.as_str(), value);
        }

        let content_type = headers.content_type().unwrap_or(MIME_BINARY).to_string();
        let length = response.content_length();
        let body = response.bytes_stream().map_err(io::Error::other).boxed();

        let mut message = Message::from_stream(status, headers, &content_type, body, length);
        message.cookies_mut().extend(cookies);
        Ok(message)
    }
}

impl std::fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpoint").finish_non_exhaustive()
    }
}
