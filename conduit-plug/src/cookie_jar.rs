//! Cookie jars and jar resolution.
//!
//! A plug picks its jar in three tiers: an explicit jar set with
//! `Plug::with_cookie_jar`, then the ambient jar of the current task (see
//! [`with_ambient_cookie_jar`]), then the process-wide jar owned by the
//! environment's [`CookieJarStrategy`].

use conduit_core::Cookie;
use conduit_core::cookie::default_path;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use url::Url;

tokio::task_local! {
    static AMBIENT_JAR: Arc<CookieJar>;
}

/// Lock-guarded cookie store.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cookies that apply to `uri`, most specific path first.
    pub fn fetch(&self, uri: &Url) -> Vec<Cookie> {
        let now = SystemTime::now();
        let mut cookies = self.cookies.lock();
        cookies.retain(|c| !c.is_expired(now));

        let mut matching: Vec<Cookie> = cookies
            .iter()
            .filter(|c| c.matches(uri, now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.path().len().cmp(&a.path().len()));
        matching
    }

    /// Store cookies received from `source`.
    ///
    /// Unscoped cookies are scoped to the source host and its default
    /// path. A cookie replaces any cookie with the same name and scope; an
    /// expired cookie only removes.
    pub fn update(&self, cookies: &[Cookie], source: &Url) {
        let now = SystemTime::now();
        let mut stored = self.cookies.lock();

        for cookie in cookies {
            let mut cookie = cookie.clone();
            if cookie.uri.is_none() {
                let mut scope = source.clone();
                scope.set_path(&default_path(source));
                scope.set_query(None);
                scope.set_fragment(None);
                cookie.uri = Some(scope);
            }

            stored.retain(|c| !c.same_slot(&cookie));
            if !cookie.is_expired(now) {
                stored.push(cookie);
            }
        }
        stored.retain(|c| !c.is_expired(now));
    }

    pub fn clear(&self) {
        self.cookies.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.lock().is_empty()
    }
}

/// Supplies the ambient and global jars to plugs.
pub trait CookieJarStrategy: Send + Sync {
    /// Jar scoped to the current call context, if any.
    fn ambient(&self) -> Option<Arc<CookieJar>>;

    /// Process-wide fallback jar.
    fn global(&self) -> Arc<CookieJar>;
}

/// Default strategy: a tokio task-local ambient jar over an owned global jar.
#[derive(Debug, Default)]
pub struct TaskLocalCookieJars {
    global: Arc<CookieJar>,
}

impl TaskLocalCookieJars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing jar as the global jar.
    pub fn with_global(global: Arc<CookieJar>) -> Self {
        Self { global }
    }
}

impl CookieJarStrategy for TaskLocalCookieJars {
    fn ambient(&self) -> Option<Arc<CookieJar>> {
        AMBIENT_JAR.try_with(Arc::clone).ok()
    }

    fn global(&self) -> Arc<CookieJar> {
        self.global.clone()
    }
}

/// Run `future` with `jar` as the ambient cookie jar.
///
/// Plugs invoked inside the future (and not carrying an explicit jar)
/// read and store cookies in `jar` instead of the global jar.
pub async fn with_ambient_cookie_jar<F: Future>(jar: Arc<CookieJar>, future: F) -> F::Output {
    AMBIENT_JAR.scope(jar, future).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_update_scopes_from_source() {
        let jar = CookieJar::new();
        jar.update(&[Cookie::new("sid", "1")], &url("http://host/app/login"));

        assert_eq!(jar.fetch(&url("http://host/app/users")).len(), 1);
        assert!(jar.fetch(&url("http://host/other")).is_empty());
        assert!(jar.fetch(&url("http://elsewhere/app/users")).is_empty());
    }

    #[test]
    fn test_update_replaces_same_slot() {
        let jar = CookieJar::new();
        let source = url("http://host/");
        jar.update(&[Cookie::new("sid", "1")], &source);
        jar.update(&[Cookie::new("sid", "2")], &source);

        let cookies = jar.fetch(&source);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "2");
    }

    #[test]
    fn test_expired_cookie_removes() {
        let jar = CookieJar::new();
        let source = url("http://host/");
        jar.update(&[Cookie::new("sid", "1")], &source);
        let expired = Cookie::new("sid", "").with_expires(SystemTime::now() - Duration::from_secs(5));
        jar.update(&[expired], &source);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_fetch_orders_by_path_length() {
        let jar = CookieJar::new();
        jar.update(
            &[
                Cookie::new("a", "root").with_uri(url("http://host/")),
                Cookie::new("a", "deep").with_uri(url("http://host/x/y")),
            ],
            &url("http://host/"),
        );
        let cookies = jar.fetch(&url("http://host/x/y/z"));
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].value, "deep");
    }

    #[tokio::test]
    async fn test_ambient_jar_scope() {
        let strategy = TaskLocalCookieJars::new();
        assert!(strategy.ambient().is_none());

        let jar = Arc::new(CookieJar::new());
        let seen = with_ambient_cookie_jar(jar.clone(), async { strategy.ambient() }).await;
        assert!(seen.is_some_and(|j| Arc::ptr_eq(&j, &jar)));
    }
}
