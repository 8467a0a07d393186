//! Ordered header multimap.
//!
//! Headers keep their insertion order and may repeat (`Set-Cookie`,
//! `Via`, ...). Name lookup is ASCII case-insensitive. Most messages carry
//! only a few headers, so storage is a `SmallVec` that stays inline until
//! it grows past [`INLINE_HEADERS`] entries.

use smallvec::SmallVec;
use std::fmt;

/// Number of headers to store inline before spilling to the heap.
pub const INLINE_HEADERS: usize = 12;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const LOCATION: &str = "Location";
pub const AUTHORIZATION: &str = "Authorization";
pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const COOKIE: &str = "Cookie";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const USER_AGENT: &str = "User-Agent";

/// A header name-value pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as it was first written
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    /// Create a new header
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check if name matches (case-insensitive)
    #[inline]
    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered, case-insensitive header collection.
///
/// ```rust
/// use conduit_core::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/json");
/// headers.append("Via", "1.1 alpha");
/// headers.append("Via", "1.1 beta");
///
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// assert_eq!(headers.get_all("via"), vec!["1.1 alpha", "1.1 beta"]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: SmallVec<[Header; INLINE_HEADERS]>,
}

impl Headers {
    /// Create a new empty header collection.
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    /// Get the number of header entries (repeated names count separately).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the first value for a header name (case-insensitive).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    /// Get all values for a header name, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    /// Check if header exists (case-insensitive).
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|h| h.name_eq(name))
    }

    /// Set a header, replacing every existing entry with the same name.
    ///
    /// The first existing entry keeps its position; later duplicates are
    /// dropped. Returns the first replaced value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();

        let Some(pos) = self.inner.iter().position(|h| h.name_eq(&name)) else {
            self.inner.push(Header { name, value });
            return None;
        };

        let old = std::mem::replace(&mut self.inner[pos].value, value);
        let mut index = 0;
        self.inner.retain(|h| {
            let keep = index <= pos || !h.name_eq(&name);
            index += 1;
            keep
        });
        Some(old)
    }

    /// Append a header entry, keeping existing entries with the same name.
    #[inline]
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Remove every entry with the given name. Returns the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let first = self
            .inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.clone());
        self.inner.retain(|h| !h.name_eq(name));
        first
    }

    /// Copy every entry of `other` into `self`, replacing same-named entries.
    pub fn merge(&mut self, other: &Headers) {
        let mut seen: SmallVec<[&str; INLINE_HEADERS]> = SmallVec::new();
        for header in &other.inner {
            if seen.iter().any(|n| n.eq_ignore_ascii_case(&header.name)) {
                self.append(header.name.clone(), header.value.clone());
            } else {
                self.insert(header.name.clone(), header.value.clone());
                seen.push(&header.name);
            }
        }
    }

    /// Iterate over all entries.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|h| (h.name.as_str(), h.value.as_str()))
    }

    #[inline]
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Get Content-Type header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE)
    }

    /// Get Content-Length header as u64.
    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH)?.trim().parse().ok()
    }

    /// Get Location header.
    #[inline]
    pub fn location(&self) -> Option<&str> {
        self.get(LOCATION)
    }

    /// Set Content-Type header.
    #[inline]
    pub fn set_content_type(&mut self, value: impl Into<String>) {
        self.insert(CONTENT_TYPE, value);
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter =
        std::iter::Map<std::slice::Iter<'a, Header>, fn(&'a Header) -> (&'a str, &'a str)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter().map(|h| (h.name.as_str(), h.value.as_str()))
    }
}
