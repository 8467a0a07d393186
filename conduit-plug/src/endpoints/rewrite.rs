//! Scheme rewriting endpoint.

use async_trait::async_trait;
use conduit_core::Message;
use http::Method;
use std::time::Duration;
use url::Url;

use crate::endpoint::{PlugEndpoint, SCORE_FORCED};
use crate::{Plug, PlugError, Result};

/// Intercepts one scheme and forwards to the endpoint handling another,
/// e.g. `ext-http://host/a` to whatever serves `http://host/a`.
#[derive(Debug, Clone)]
pub struct RewriteEndpoint {
    label: String,
    from: String,
    to: String,
}

impl RewriteEndpoint {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into().to_ascii_lowercase();
        let to = to.into().to_ascii_lowercase();
        Self {
            label: format!("rewrite:{from}->{to}"),
            from,
            to,
        }
    }

    fn rewrite(&self, uri: &Url) -> Option<Url> {
        // set_scheme refuses to switch between special and non-special schemes
        let rest = &uri.as_str()[uri.scheme().len()..];
        Url::parse(&format!("{}{}", self.to, rest)).ok()
    }
}

#[async_trait]
impl PlugEndpoint for RewriteEndpoint {
    fn name(&self) -> &str {
        &self.label
    }

    fn score(&self, uri: &Url) -> Option<(i32, Url)> {
        if self.from == self.to || !uri.scheme().eq_ignore_ascii_case(&self.from) {
            return None;
        }
        self.rewrite(uri).map(|normalized| (SCORE_FORCED, normalized))
    }

    async fn invoke(
        &self,
        plug: &Plug,
        verb: Method,
        uri: Url,
        request: Message,
        timeout: Duration,
    ) -> Result<Message> {
        let Some(target) = plug.environment().registry().find(&uri) else {
            return Err(PlugError::Connection(format!("no endpoint serves {uri}")));
        };
        target
            .endpoint
            .invoke(plug, verb, target.uri, request, timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_scheme() {
        let endpoint = RewriteEndpoint::new("ext-http", "http");
        let (score, normalized) = endpoint
            .score(&Url::parse("ext-http://example.com:8080/a/b?x=1").unwrap())
            .unwrap();
        assert_eq!(score, SCORE_FORCED);
        assert_eq!(normalized.as_str(), "http://example.com:8080/a/b?x=1");
    }

    #[test]
    fn test_ignores_other_schemes() {
        let endpoint = RewriteEndpoint::new("ext-http", "http");
        assert!(endpoint.score(&Url::parse("http://example.com/").unwrap()).is_none());
        assert!(RewriteEndpoint::new("a", "a").score(&Url::parse("a://h/").unwrap()).is_none());
    }
}
