//! The immutable invocation handle.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use conduit_core::headers::{AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION};
use conduit_core::uri::{append_segments, is_local, path_segments, same_origin, with_path_segments};
use conduit_core::{Cookie, Headers, Message, Status};
use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::RedirectHeaders;
use crate::cookie_jar::CookieJar;
use crate::environment::PlugEnvironment;
use crate::handler::PlugHandler;
use crate::{PlugError, Result};

/// Basic credentials attached to every request of a plug.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value.
    pub fn to_header(&self) -> String {
        format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", self.username, self.password))
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Immutable description of where and how to send a request.
///
/// Every `with_*`/`without_*` method returns a new plug; unchanged fields
/// are shared. Plugs are cheap to clone and safe to share across tasks.
///
/// ```rust,no_run
/// use conduit_plug::Plug;
/// use std::time::Duration;
///
/// # async fn run() -> conduit_plug::Result<()> {
/// let api = Plug::parse("https://api.example.com/v1")?
///     .with_timeout(Duration::from_secs(5))
///     .with_header("Accept", "application/json");
///
/// let mut user = api.at(["users", "42"]).get().await?;
/// let doc = user.to_document()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Plug {
    uri: Url,
    timeout: Duration,
    headers: Arc<Headers>,
    credentials: Option<Arc<Credentials>>,
    cookie_jar: Option<Arc<CookieJar>>,
    pre_handlers: Arc<Vec<Arc<dyn PlugHandler>>>,
    post_handlers: Arc<Vec<Arc<dyn PlugHandler>>>,
    max_auto_redirects: u16,
    redirect_headers: RedirectHeaders,
    max_memorize_bytes: u64,
    env: Arc<PlugEnvironment>,
}

impl Plug {
    /// Plug bound to the global environment.
    pub fn new(uri: Url) -> Self {
        Self::new_in(uri, PlugEnvironment::global())
    }

    /// Plug bound to `env`, starting from its configuration.
    pub fn new_in(uri: Url, env: Arc<PlugEnvironment>) -> Self {
        let config = env.config();
        Self {
            uri,
            timeout: config.timeout,
            headers: Arc::new(Headers::new()),
            credentials: None,
            cookie_jar: None,
            pre_handlers: Arc::new(Vec::new()),
            post_handlers: Arc::new(Vec::new()),
            max_auto_redirects: config.max_auto_redirects,
            redirect_headers: config.redirect_headers,
            max_memorize_bytes: config.max_memorize_bytes,
            env,
        }
    }

    /// Parse `uri` into a plug bound to the global environment.
    pub fn parse(uri: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(uri)?))
    }

    // ========== Accessors ==========

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_deref()
    }

    pub fn max_auto_redirects(&self) -> u16 {
        self.max_auto_redirects
    }

    pub fn redirect_headers(&self) -> RedirectHeaders {
        self.redirect_headers
    }

    pub fn max_memorize_bytes(&self) -> u64 {
        self.max_memorize_bytes
    }

    pub fn environment(&self) -> &Arc<PlugEnvironment> {
        &self.env
    }

    /// The jar this plug reads and stores cookies in: the explicit jar,
    /// else the ambient jar, else the global jar.
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        if let Some(jar) = &self.cookie_jar {
            return jar.clone();
        }
        let strategy = self.env.cookies();
        strategy.ambient().unwrap_or_else(|| strategy.global())
    }

    // ========== Builders ==========

    /// Append path segments. Each segment is percent-encoded.
    pub fn at<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plug = self.clone();
        plug.uri = append_segments(&self.uri, segments);
        plug
    }

    /// Append an already-encoded path such as `users/42/avatar`.
    pub fn at_path(&self, path: &str) -> Self {
        let mut segments = path_segments(&self.uri);
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut plug = self.clone();
        plug.uri = with_path_segments(&self.uri, &segments);
        plug
    }

    /// Replace the URI, keeping every other setting.
    pub fn with_uri(&self, uri: Url) -> Self {
        let mut plug = self.clone();
        plug.uri = uri;
        plug
    }

    /// Append a query parameter.
    pub fn with(&self, key: &str, value: impl ToString) -> Self {
        let mut plug = self.clone();
        plug.uri.query_pairs_mut().append_pair(key, &value.to_string());
        plug
    }

    pub fn with_params<I, K, V>(&self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut plug = self.clone();
        {
            let mut pairs = plug.uri.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key.as_ref(), value.as_ref());
            }
        }
        plug
    }

    /// Remove every query parameter named `key`.
    pub fn without(&self, key: &str) -> Self {
        let kept: Vec<(String, String)> = self
            .uri
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut plug = self.clone();
        plug.uri.set_query(None);
        if !kept.is_empty() {
            plug.uri.query_pairs_mut().extend_pairs(kept);
        }
        plug
    }

    /// Set a header sent with every request, replacing existing values.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = (*self.headers).clone();
        headers.insert(name, value);
        let mut plug = self.clone();
        plug.headers = Arc::new(headers);
        plug
    }

    pub fn with_headers(&self, headers: &Headers) -> Self {
        let mut merged = (*self.headers).clone();
        merged.merge(headers);
        let mut plug = self.clone();
        plug.headers = Arc::new(merged);
        plug
    }

    pub fn without_header(&self, name: &str) -> Self {
        let mut headers = (*self.headers).clone();
        headers.remove(name);
        let mut plug = self.clone();
        plug.headers = Arc::new(headers);
        plug
    }

    pub fn with_credentials(&self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut plug = self.clone();
        plug.credentials = Some(Arc::new(Credentials::new(username, password)));
        plug
    }

    pub fn without_credentials(&self) -> Self {
        let mut plug = self.clone();
        plug.credentials = None;
        plug
    }

    /// Use `jar` instead of the ambient or global jar.
    pub fn with_cookie_jar(&self, jar: Arc<CookieJar>) -> Self {
        let mut plug = self.clone();
        plug.cookie_jar = Some(jar);
        plug
    }

    pub fn without_cookie_jar(&self) -> Self {
        let mut plug = self.clone();
        plug.cookie_jar = None;
        plug
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut plug = self.clone();
        plug.timeout = timeout;
        plug
    }

    /// Follow at most `max` redirects. `0` disables following.
    pub fn with_auto_redirects(&self, max: u16) -> Self {
        let mut plug = self.clone();
        plug.max_auto_redirects = max;
        plug
    }

    pub fn without_auto_redirects(&self) -> Self {
        self.with_auto_redirects(0)
    }

    pub fn with_redirect_headers(&self, policy: RedirectHeaders) -> Self {
        let mut plug = self.clone();
        plug.redirect_headers = policy;
        plug
    }

    pub fn with_max_memorize_bytes(&self, max: u64) -> Self {
        let mut plug = self.clone();
        plug.max_memorize_bytes = max;
        plug
    }

    pub fn with_pre_handler<H: PlugHandler + 'static>(&self, handler: H) -> Self {
        let mut handlers = (*self.pre_handlers).clone();
        handlers.push(Arc::new(handler));
        let mut plug = self.clone();
        plug.pre_handlers = Arc::new(handlers);
        plug
    }

    pub fn with_post_handler<H: PlugHandler + 'static>(&self, handler: H) -> Self {
        let mut handlers = (*self.post_handlers).clone();
        handlers.push(Arc::new(handler));
        let mut plug = self.clone();
        plug.post_handlers = Arc::new(handlers);
        plug
    }

    /// Rebind to another environment. Per-plug settings are kept.
    pub fn with_environment(&self, env: Arc<PlugEnvironment>) -> Self {
        let mut plug = self.clone();
        plug.env = env;
        plug
    }

    // ========== Verb helpers ==========

    pub async fn get(&self) -> Result<Message> {
        self.call(Method::GET, Message::ok()).await
    }

    pub async fn head(&self) -> Result<Message> {
        self.call(Method::HEAD, Message::ok()).await
    }

    pub async fn options(&self) -> Result<Message> {
        self.call(Method::OPTIONS, Message::ok()).await
    }

    pub async fn delete(&self) -> Result<Message> {
        self.call(Method::DELETE, Message::ok()).await
    }

    pub async fn post(&self, body: Message) -> Result<Message> {
        self.call(Method::POST, body).await
    }

    pub async fn put(&self, body: Message) -> Result<Message> {
        self.call(Method::PUT, body).await
    }

    pub async fn patch(&self, body: Message) -> Result<Message> {
        self.call(Method::PATCH, body).await
    }

    async fn call(&self, verb: Method, body: Message) -> Result<Message> {
        let mut response = self.invoke(verb, body).await;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .to_document()
            .ok()
            .and_then(|doc| doc.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.reason().to_string());
        response.close();
        Err(PlugError::Response { status, message })
    }

    // ========== Invocation ==========

    /// Invoke with the plug's own timeout and memorize the response.
    pub async fn invoke(&self, verb: Method, request: Message) -> Message {
        self.invoke_with_timeout(verb, request, self.timeout).await
    }

    /// Invoke and memorize the response, all within `timeout`.
    ///
    /// Time spent before the response arrives is deducted from the budget
    /// left for reading its body.
    pub async fn invoke_with_timeout(&self, verb: Method, request: Message, timeout: Duration) -> Message {
        let started = Instant::now();
        let mut response = self.invoke_ex(verb, request, timeout).await;
        let remaining = timeout.saturating_sub(started.elapsed());

        match response.memorize(self.max_memorize_bytes, remaining).await {
            Ok(()) => response,
            Err(err) if err.is_timeout() => {
                warn!(uri = %self.uri, ?timeout, "response body transfer timed out");
                response.close();
                Message::error(Status::RESPONSE_DATA_TRANSFER_TIMEOUT, err.to_string())
            }
            Err(err) => {
                warn!(uri = %self.uri, error = %err, "failed to read response body");
                response.close();
                Message::error(Status::RESPONSE_FAILED, err.to_string())
            }
        }
    }

    /// Run the pipeline without memorizing the response body.
    ///
    /// `timeout` governs the dispatch together with the plug's own
    /// timeout; the shorter one wins.
    ///
    /// # Panics
    ///
    /// Panics if `request` is closed or its status is not `200 OK`.
    pub fn invoke_ex(&self, verb: Method, request: Message, timeout: Duration) -> BoxFuture<'static, Message> {
        assert!(!request.is_closed(), "cannot invoke a plug with a closed request message");
        assert_eq!(
            request.status(),
            Status::OK,
            "request messages must have status 200 OK"
        );

        let plug = self.clone();
        async move { plug.run(verb, request, timeout).await }.boxed()
    }

    async fn run(self, verb: Method, mut request: Message, timeout: Duration) -> Message {
        let Some(found) = self.env.registry().find(&self.uri) else {
            request.close();
            return Message::error(
                Status::NO_ENDPOINT_FOUND,
                format!("no endpoint found for {}", self.uri),
            );
        };
        let normalized = found.uri;

        // replayable copy of the request as the caller handed it over
        let replay = if self.max_auto_redirects > 0 {
            request.try_clone().ok()
        } else {
            None
        };

        let jar = self.cookie_jar();
        self.prepare(&jar, &mut request);

        for handler in self.pre_handlers.iter() {
            request = match call_handler(handler, &verb, &self.uri, &normalized, request).await {
                Ok(Some(msg)) if msg.status() == Status::OK => msg,
                Ok(Some(msg)) => {
                    debug!(uri = %self.uri, status = %msg.status(), "pre-handler short-circuited");
                    return msg;
                }
                Ok(None) => {
                    return Message::error(Status::REQUEST_IS_NULL, "pre-handler returned no request");
                }
                Err(panic) => {
                    error!(uri = %self.uri, panic = %panic_message(&*panic), "pre-handler panicked");
                    return Message::error(Status::REQUEST_FAILED, panic_message(&*panic));
                }
            };
        }

        let effective = self.timeout.min(timeout);
        let dispatch = found
            .endpoint
            .invoke(&self, verb.clone(), normalized.clone(), request, effective);
        let outcome = tokio::time::timeout(effective, AssertUnwindSafe(dispatch).catch_unwind()).await;

        let mut response = match outcome {
            Err(_) => {
                warn!(uri = %self.uri, timeout = ?effective, "request timed out");
                return Message::error(
                    Status::REQUEST_CONNECTION_TIMEOUT,
                    format!("request to {} timed out after {:?}", self.uri, effective),
                );
            }
            Ok(Err(panic)) => {
                error!(uri = %self.uri, panic = %panic_message(&*panic), "endpoint panicked");
                return Message::error(Status::REQUEST_FAILED, panic_message(&*panic));
            }
            Ok(Ok(Err(err))) if err.is_timeout() => {
                warn!(uri = %self.uri, error = %err, "request timed out");
                return Message::error(Status::REQUEST_CONNECTION_TIMEOUT, err.to_string());
            }
            Ok(Ok(Err(err))) => {
                warn!(uri = %self.uri, error = %err, "request failed");
                return Message::error(Status::REQUEST_FAILED, err.to_string());
            }
            Ok(Ok(Ok(response))) => response,
        };

        if response.has_cookies() {
            self.store_cookies(&jar, &normalized, response.cookies());
        }

        if response.status().is_followable_redirect() && self.max_auto_redirects > 0 {
            let location = response
                .headers()
                .location()
                .and_then(|location| self.uri.join(location).ok());

            match (location, replay) {
                (Some(location), Some(replay)) => {
                    debug!(
                        from = %self.uri,
                        to = %location,
                        remaining = self.max_auto_redirects - 1,
                        "following redirect"
                    );
                    response.close();
                    let (next, replay) = self.redirect_to(location, replay);
                    return next.invoke_ex(verb, replay, timeout).await;
                }
                (None, _) => debug!(uri = %self.uri, "redirect without a usable location"),
                (_, None) => debug!(uri = %self.uri, "request body cannot be replayed; not following redirect"),
            }
        }

        for handler in self.post_handlers.iter() {
            response = match call_handler(handler, &verb, &self.uri, &normalized, response).await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    return Message::error(Status::RESPONSE_IS_NULL, "post-handler returned no response");
                }
                Err(panic) => {
                    error!(uri = %self.uri, panic = %panic_message(&*panic), "post-handler panicked");
                    return Message::error(Status::RESPONSE_FAILED, panic_message(&*panic));
                }
            };
        }

        response
    }

    /// Merge jar cookies, plug headers and credentials into the request.
    fn prepare(&self, jar: &CookieJar, request: &mut Message) {
        for cookie in jar.fetch(&self.uri) {
            if !request.cookies().iter().any(|c| c.name == cookie.name) {
                request.cookies_mut().push(cookie);
            }
        }
        request.headers_mut().merge(&self.headers);
        if let Some(credentials) = &self.credentials
            && !request.headers().contains(AUTHORIZATION)
        {
            request.headers_mut().insert(AUTHORIZATION, credentials.to_header());
        }
    }

    /// Store response cookies, rebasing them onto the public URI when a
    /// public URI was served by a local endpoint.
    fn store_cookies(&self, jar: &CookieJar, normalized: &Url, cookies: &[Cookie]) {
        if !is_local(&self.uri) && is_local(normalized) {
            let public: Vec<Cookie> = cookies
                .iter()
                .map(|c| c.to_public(normalized, &self.uri))
                .collect();
            jar.update(&public, &self.uri);
        } else {
            jar.update(cookies, &self.uri);
        }
    }

    fn redirect_to(&self, location: Url, mut replay: Message) -> (Plug, Message) {
        let mut next = self.clone();
        next.max_auto_redirects = self.max_auto_redirects - 1;

        if self.redirect_headers == RedirectHeaders::SameOrigin && !same_origin(&self.uri, &location) {
            debug!(from = %self.uri, to = %location, "dropping credentials on cross-origin redirect");
            let mut headers = (*self.headers).clone();
            for name in [AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE] {
                headers.remove(name);
                replay.headers_mut().remove(name);
            }
            replay.cookies_mut().clear();
            next.headers = Arc::new(headers);
            next.credentials = None;
        }

        next.uri = location;
        (next, replay)
    }
}

async fn call_handler(
    handler: &Arc<dyn PlugHandler>,
    verb: &Method,
    uri: &Url,
    normalized: &Url,
    message: Message,
) -> std::result::Result<Option<Message>, Box<dyn Any + Send>> {
    AssertUnwindSafe(handler.handle(verb, uri, normalized, message))
        .catch_unwind()
        .await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

impl fmt::Debug for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plug")
            .field("uri", &self.uri.as_str())
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("credentials", &self.credentials)
            .field("max_auto_redirects", &self.max_auto_redirects)
            .field("pre_handlers", &self.pre_handlers.len())
            .field("post_handlers", &self.post_handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlugConfig;

    fn plug(uri: &str) -> Plug {
        let env = Arc::new(PlugEnvironment::empty(PlugConfig::default()));
        Plug::new_in(Url::parse(uri).unwrap(), env)
    }

    #[test]
    fn test_builders_do_not_mutate() {
        let base = plug("http://host/api");
        let derived = base
            .at(["users", "john doe"])
            .with("limit", 10)
            .with_header("X-A", "1")
            .with_timeout(Duration::from_secs(3))
            .with_auto_redirects(2);

        assert_eq!(base.uri().as_str(), "http://host/api");
        assert!(base.headers().is_empty());
        assert_eq!(base.max_auto_redirects(), 10);

        assert_eq!(derived.uri().as_str(), "http://host/api/users/john%20doe?limit=10");
        assert_eq!(derived.headers().get("x-a"), Some("1"));
        assert_eq!(derived.timeout(), Duration::from_secs(3));
        assert_eq!(derived.max_auto_redirects(), 2);
    }

    #[test]
    fn test_at_path_and_without() {
        let p = plug("http://host/a?x=1&y=2&x=3").at_path("/b/c/");
        assert_eq!(p.uri().path(), "/a/b/c");

        let stripped = p.without("x");
        assert_eq!(stripped.uri().query(), Some("y=2"));
        assert_eq!(stripped.without("y").uri().query(), None);
    }

    #[test]
    fn test_with_params() {
        let p = plug("http://host/").with_params([("a", "1"), ("b", "two words")]);
        assert_eq!(p.uri().query(), Some("a=1&b=two+words"));
    }

    #[test]
    fn test_credentials_header() {
        let p = plug("http://host/").with_credentials("aladdin", "opensesame");
        assert_eq!(
            p.credentials().unwrap().to_header(),
            "Basic YWxhZGRpbjpvcGVuc2VzYW1l"
        );
        assert!(p.without_credentials().credentials().is_none());
        assert!(!format!("{:?}", p).contains("opensesame"));
    }

    #[test]
    fn test_cookie_jar_override() {
        let p = plug("http://host/");
        let jar = Arc::new(CookieJar::new());
        let with_jar = p.with_cookie_jar(jar.clone());
        assert!(Arc::ptr_eq(&with_jar.cookie_jar(), &jar));
        assert!(!Arc::ptr_eq(&with_jar.without_cookie_jar().cookie_jar(), &jar));
    }

    #[test]
    fn test_cross_origin_redirect_strips_credentials() {
        let p = plug("http://a.example/")
            .with_header("Authorization", "Bearer t")
            .with_header("X-Keep", "1")
            .with_credentials("u", "p");
        let mut request = Message::ok();
        request.headers_mut().insert("Cookie", "sid=1");

        let (next, replay) = p.redirect_to(Url::parse("http://b.example/").unwrap(), request);
        assert!(next.credentials().is_none());
        assert!(!next.headers().contains("authorization"));
        assert_eq!(next.headers().get("x-keep"), Some("1"));
        assert!(!replay.headers().contains("cookie"));
        assert_eq!(next.max_auto_redirects(), 9);
    }

    #[test]
    fn test_same_origin_redirect_keeps_credentials() {
        let p = plug("http://a.example/x").with_credentials("u", "p");
        let (next, _) = p.redirect_to(Url::parse("http://a.example/y").unwrap(), Message::ok());
        assert!(next.credentials().is_some());

        let all = plug("http://a.example/")
            .with_credentials("u", "p")
            .with_redirect_headers(RedirectHeaders::All);
        let (next, _) = all.redirect_to(Url::parse("http://b.example/").unwrap(), Message::ok());
        assert!(next.credentials().is_some());
    }

    #[test]
    #[should_panic(expected = "200 OK")]
    fn test_non_ok_request_panics() {
        let _ = plug("http://host/").invoke_ex(Method::GET, Message::not_found("x"), Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "closed")]
    fn test_closed_request_panics() {
        let mut request = Message::ok();
        request.close();
        let _ = plug("http://host/").invoke_ex(Method::GET, request, Duration::from_secs(1));
    }
}
