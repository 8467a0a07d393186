//! Endpoint registry and resolution.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::endpoint::{PlugEndpoint, SCORE_NONE};
use crate::endpoints::{HttpEndpoint, RewriteEndpoint};
use crate::PlugConfig;

/// Result of resolving a URI against the registry.
#[derive(Clone)]
pub struct EndpointMatch {
    pub endpoint: Arc<dyn PlugEndpoint>,
    /// URI rewritten by the endpoint.
    pub uri: Url,
    pub score: i32,
}

impl std::fmt::Debug for EndpointMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointMatch")
            .field("endpoint", &self.endpoint.name())
            .field("uri", &self.uri.as_str())
            .field("score", &self.score)
            .finish()
    }
}

/// Ordered set of endpoints.
///
/// Resolution keeps the first endpoint with the highest score, so among
/// equal scores the earliest registered endpoint wins.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: Mutex<Vec<Arc<dyn PlugEndpoint>>>,
}

impl EndpointRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the HTTP endpoint and the `ext-http`/`ext-https`
    /// scheme rewrites.
    pub fn with_defaults(config: &PlugConfig) -> Self {
        let registry = Self::new();
        registry.add(Arc::new(HttpEndpoint::new(config)));
        registry.add(Arc::new(RewriteEndpoint::new("ext-http", "http")));
        registry.add(Arc::new(RewriteEndpoint::new("ext-https", "https")));
        registry
    }

    pub fn add(&self, endpoint: Arc<dyn PlugEndpoint>) {
        debug!(endpoint = endpoint.name(), "registering plug endpoint");
        self.endpoints.lock().push(endpoint);
    }

    /// Remove a previously added endpoint. Returns `false` if it was not
    /// registered.
    pub fn remove(&self, endpoint: &Arc<dyn PlugEndpoint>) -> bool {
        let mut endpoints = self.endpoints.lock();
        let before = endpoints.len();
        endpoints.retain(|e| !std::ptr::addr_eq(Arc::as_ptr(e), Arc::as_ptr(endpoint)));
        endpoints.len() != before
    }

    /// Find the endpoint with the strictly highest positive score.
    pub fn find(&self, uri: &Url) -> Option<EndpointMatch> {
        let endpoints = self.endpoints.lock();
        let mut best: Option<EndpointMatch> = None;

        for endpoint in endpoints.iter() {
            let Some((score, normalized)) = endpoint.score(uri) else {
                continue;
            };
            if score <= SCORE_NONE || best.as_ref().is_some_and(|b| score <= b.score) {
                continue;
            }
            best = Some(EndpointMatch {
                endpoint: endpoint.clone(),
                uri: normalized,
                score,
            });
        }

        match &best {
            Some(found) => debug!(
                %uri,
                endpoint = found.endpoint.name(),
                score = found.score,
                normalized = %found.uri,
                "resolved plug endpoint"
            ),
            None => debug!(%uri, "no plug endpoint matches"),
        }
        best
    }

    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoints = self.endpoints.lock();
        f.debug_list()
            .entries(endpoints.iter().map(|e| e.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{SCORE_FORCED, SCORE_SCHEME};
    use crate::{Plug, Result};
    use async_trait::async_trait;
    use conduit_core::Message;
    use http::Method;
    use std::time::Duration;

    struct Fixed {
        label: &'static str,
        scheme: &'static str,
        score: i32,
    }

    #[async_trait]
    impl PlugEndpoint for Fixed {
        fn name(&self) -> &str {
            self.label
        }

        fn score(&self, uri: &Url) -> Option<(i32, Url)> {
            (uri.scheme() == self.scheme).then(|| (self.score, uri.clone()))
        }

        async fn invoke(&self, _: &Plug, _: Method, _: Url, _: Message, _: Duration) -> Result<Message> {
            Ok(Message::ok_text(self.label))
        }
    }

    fn fixed(label: &'static str, scheme: &'static str, score: i32) -> Arc<dyn PlugEndpoint> {
        Arc::new(Fixed { label, scheme, score })
    }

    #[test]
    fn test_highest_score_wins() {
        let registry = EndpointRegistry::new();
        registry.add(fixed("low", "mock", SCORE_SCHEME));
        registry.add(fixed("high", "mock", SCORE_FORCED));

        let found = registry.find(&Url::parse("mock://h/").unwrap()).unwrap();
        assert_eq!(found.endpoint.name(), "high");
        assert_eq!(found.score, SCORE_FORCED);
    }

    #[test]
    fn test_tie_keeps_first_registered() {
        let registry = EndpointRegistry::new();
        registry.add(fixed("first", "mock", 5));
        registry.add(fixed("second", "mock", 5));

        let found = registry.find(&Url::parse("mock://h/").unwrap()).unwrap();
        assert_eq!(found.endpoint.name(), "first");
    }

    #[test]
    fn test_non_positive_score_never_matches() {
        let registry = EndpointRegistry::new();
        registry.add(fixed("zero", "mock", SCORE_NONE));
        registry.add(fixed("negative", "mock", -3));
        assert!(registry.find(&Url::parse("mock://h/").unwrap()).is_none());
    }

    #[test]
    fn test_remove() {
        let registry = EndpointRegistry::new();
        let endpoint = fixed("only", "mock", SCORE_SCHEME);
        registry.add(endpoint.clone());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&endpoint));
        assert!(!registry.remove(&endpoint));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_defaults_resolve_http_and_rewrites() {
        let registry = EndpointRegistry::with_defaults(&PlugConfig::default());
        assert_eq!(registry.len(), 3);

        let http = registry.find(&Url::parse("http://example.com/a").unwrap()).unwrap();
        assert_eq!(http.score, SCORE_SCHEME);

        let rewritten = registry.find(&Url::parse("ext-https://example.com/a").unwrap()).unwrap();
        assert_eq!(rewritten.score, SCORE_FORCED);
        assert_eq!(rewritten.uri.as_str(), "https://example.com/a");
    }
}
