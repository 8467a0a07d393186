//! HTTP cookies with URI scopes.
//!
//! A cookie's scope is a URI combining the cookie domain (host) and path.
//! Cookies received without an explicit `Domain`/`Path` carry no scope until
//! a cookie jar assigns one from the URI that produced them.

use std::time::{Duration, SystemTime};
use url::Url;

use crate::uri::path_segments;

/// Longest lifetime honoured from `Max-Age`, in seconds (400 days).
const MAX_AGE_CEILING: u64 = 400 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Scope: host and path the cookie applies to.
    pub uri: Option<Url>,
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    /// Create an unscoped session cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            uri: None,
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn with_expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Host part of the scope, if scoped.
    pub fn domain(&self) -> Option<&str> {
        self.uri.as_ref().and_then(|u| u.host_str())
    }

    /// Path part of the scope, `/` when unscoped.
    pub fn path(&self) -> &str {
        self.uri.as_ref().map(|u| u.path()).unwrap_or("/")
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Check whether the cookie should be sent with a request to `uri`.
    pub fn matches(&self, uri: &Url, now: SystemTime) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.secure && !matches!(uri.scheme(), "https" | "local") {
            return false;
        }
        let Some(scope) = &self.uri else {
            return true;
        };

        let host_ok = match (scope.host_str(), uri.host_str()) {
            (Some(domain), Some(host)) => {
                host.eq_ignore_ascii_case(domain)
                    || (host.len() > domain.len()
                        && host.to_ascii_lowercase().ends_with(&format!(".{}", domain.to_ascii_lowercase())))
            }
            (None, None) => true,
            _ => false,
        };

        host_ok && path_covers(scope.path(), uri.path())
    }

    /// Check whether two cookies occupy the same slot in a jar.
    pub fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name
            && self.domain().map(str::to_ascii_lowercase) == other.domain().map(str::to_ascii_lowercase)
            && self.path() == other.path()
    }

    /// Parse a `Set-Cookie` header value received from `source`.
    ///
    /// Returns `None` for malformed headers (missing `=` or empty name).
    pub fn parse_set_cookie(header: &str, source: &Url) -> Option<Cookie> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));
        let mut domain: Option<String> = None;
        let mut path: Option<String> = None;
        let mut max_age: Option<i64> = None;

        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            let val = val.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    domain = Some(val.trim_start_matches('.').to_ascii_lowercase())
                }
                "path" if val.starts_with('/') => path = Some(val.to_string()),
                "expires" => cookie.expires = httpdate::parse_http_date(val).ok(),
                "max-age" => max_age = val.parse().ok(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        if let Some(seconds) = max_age {
            cookie.expires = if seconds <= 0 {
                Some(SystemTime::UNIX_EPOCH)
            } else {
                let delta = Duration::from_secs((seconds as u64).min(MAX_AGE_CEILING));
                SystemTime::now().checked_add(delta)
            };
        }

        if domain.is_some() || path.is_some() {
            let mut scope = source.clone();
            if let Some(domain) = &domain
                && scope.set_host(Some(domain)).is_err()
            {
                return None;
            }
            scope.set_path(path.as_deref().unwrap_or(&default_path(source)));
            scope.set_query(None);
            scope.set_fragment(None);
            cookie.uri = Some(scope);
        }

        Some(cookie)
    }

    /// Render the cookie as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(domain) = self.domain() {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if self.uri.is_some() {
            out.push_str("; Path=");
            out.push_str(self.path());
        }
        if let Some(expires) = self.expires {
            out.push_str("; Expires=");
            out.push_str(&httpdate::fmt_http_date(expires));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }

    /// Render cookies as a request `Cookie` header value.
    pub fn to_request_header(cookies: &[Cookie]) -> String {
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Rebase a cookie set inside the local URI space onto the public URI
    /// the caller actually used.
    ///
    /// `local_uri` is the normalized (local) request URI and `public_uri`
    /// the original one. The path prefix that differs between the two is
    /// swapped; scheme, host and port are taken from `public_uri`. Cookies
    /// scoped to a different local host are returned unchanged.
    pub fn to_public(&self, local_uri: &Url, public_uri: &Url) -> Cookie {
        let mut cookie = self.clone();
        cookie.secure = self.secure || public_uri.scheme() == "https";

        let Some(scope) = &self.uri else {
            return cookie;
        };
        if !scope
            .host_str()
            .zip(local_uri.host_str())
            .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            return cookie;
        }

        let local = path_segments(local_uri);
        let public = path_segments(public_uri);
        let shared = local
            .iter()
            .rev()
            .zip(public.iter().rev())
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();
        let local_prefix = &local[..local.len() - shared];
        let public_prefix = &public[..public.len() - shared];

        let scope_segments = path_segments(scope);
        let rebased: Vec<&str> = if scope_segments.len() >= local_prefix.len()
            && scope_segments
                .iter()
                .zip(local_prefix.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            public_prefix
                .iter()
                .chain(scope_segments[local_prefix.len()..].iter())
                .copied()
                .collect()
        } else {
            scope_segments
        };

        let mut public_scope = public_uri.clone();
        public_scope.set_path(&format!("/{}", rebased.join("/")));
        public_scope.set_query(None);
        public_scope.set_fragment(None);
        cookie.uri = Some(public_scope);
        cookie
    }
}

/// RFC 6265 default cookie path: the request path up to its last `/`.
pub fn default_path(uri: &Url) -> String {
    let path = uri.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn path_covers(scope: &str, path: &str) -> bool {
    if scope == "/" || scope == path {
        return true;
    }
    path.starts_with(scope) && (scope.ends_with('/') || path[scope.len()..].starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_set_cookie_attributes() {
        let source = url("https://api.example.com/users/login");
        let cookie = Cookie::parse_set_cookie(
            "session=abc123; Path=/users; Domain=.example.com; Secure; HttpOnly",
            &source,
        )
        .unwrap();

        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), "/users");
        assert!(cookie.secure);
        assert!(cookie.http_only);
    }

    #[test]
    fn test_parse_set_cookie_without_scope() {
        let cookie = Cookie::parse_set_cookie("a=1", &url("http://host/x")).unwrap();
        assert!(cookie.uri.is_none());
        assert!(Cookie::parse_set_cookie("novalue", &url("http://host/")).is_none());
        assert!(Cookie::parse_set_cookie("=1", &url("http://host/")).is_none());
    }

    #[test]
    fn test_max_age_zero_expires() {
        let cookie = Cookie::parse_set_cookie("a=1; Max-Age=0", &url("http://host/")).unwrap();
        assert!(cookie.is_expired(SystemTime::now()));
    }

    #[test]
    fn test_huge_max_age_is_clamped() {
        let now = SystemTime::now();
        let cookie =
            Cookie::parse_set_cookie("a=1; Max-Age=9223372036854775807", &url("http://host/")).unwrap();
        let expires = cookie.expires.unwrap();
        assert!(!cookie.is_expired(now));
        assert!(expires <= now + Duration::from_secs(MAX_AGE_CEILING + 60));
    }

    #[test]
    fn test_expires_attribute() {
        let cookie = Cookie::parse_set_cookie(
            "a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
            &url("http://host/"),
        )
        .unwrap();
        assert!(cookie.is_expired(SystemTime::now()));
    }

    #[test]
    fn test_matches_host_and_path() {
        let cookie = Cookie::new("a", "1").with_uri(url("http://example.com/app"));
        let now = SystemTime::now();

        assert!(cookie.matches(&url("http://example.com/app"), now));
        assert!(cookie.matches(&url("http://example.com/app/x"), now));
        assert!(cookie.matches(&url("http://www.example.com/app/x"), now));
        assert!(!cookie.matches(&url("http://example.com/application"), now));
        assert!(!cookie.matches(&url("http://other.com/app"), now));
    }

    #[test]
    fn test_secure_cookie_requires_https() {
        let cookie = Cookie::new("a", "1").with_secure(true);
        let now = SystemTime::now();
        assert!(!cookie.matches(&url("http://host/"), now));
        assert!(cookie.matches(&url("https://host/"), now));
    }

    #[test]
    fn test_set_cookie_rendering() {
        let cookie = Cookie::new("a", "1")
            .with_uri(url("http://example.com/app"))
            .with_http_only(true);
        assert_eq!(
            cookie.to_set_cookie(),
            "a=1; Domain=example.com; Path=/app; HttpOnly"
        );
    }

    #[test]
    fn test_request_header_rendering() {
        let cookies = vec![Cookie::new("a", "1"), Cookie::new("b", "2")];
        assert_eq!(Cookie::to_request_header(&cookies), "a=1; b=2");
    }

    #[test]
    fn test_to_public_rebases_scope() {
        let local = url("local://svc/rest");
        let public = url("https://api.example.com/app/rest");
        let cookie = Cookie::new("sid", "x").with_uri(url("local://svc/"));

        let translated = cookie.to_public(&local, &public);
        let scope = translated.uri.unwrap();
        assert_eq!(scope.scheme(), "https");
        assert_eq!(scope.host_str(), Some("api.example.com"));
        assert_eq!(scope.path(), "/app");
        assert!(translated.secure);
    }

    #[test]
    fn test_to_public_keeps_foreign_host() {
        let cookie = Cookie::new("sid", "x").with_uri(url("local://other/"));
        let translated = cookie.to_public(&url("local://svc/a"), &url("http://pub/a"));
        assert_eq!(translated.uri, cookie.uri);
    }

    #[test]
    fn test_default_path() {
        assert_eq!(default_path(&url("http://h/a/b/c")), "/a/b");
        assert_eq!(default_path(&url("http://h/a")), "/");
        assert_eq!(default_path(&url("http://h/")), "/");
    }
}
