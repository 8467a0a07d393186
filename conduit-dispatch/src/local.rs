//! In-process endpoint bridging plugs into a [`Dispatcher`].
//!
//! `local://{host}/...` URIs are served by the dispatcher directly. Public
//! aliases (for example `http://api.example.com/v1`) can be attached so
//! that plugs addressing the public form are short-circuited into the
//! process: the alias prefix is replaced with `local://{host}/` and the
//! call is granted [`AccessLevel::Public`] instead of
//! [`AccessLevel::Internal`].

use async_trait::async_trait;
use conduit_core::Message;
use conduit_core::uri::{LOCAL_SCHEME, is_local, path_segments, same_origin, with_path_segments};
use conduit_plug::{Plug, PlugEndpoint, Result as PlugResult, SCORE_FORCED, SCORE_SCHEME};
use http::Method;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::dispatcher::Dispatcher;
use crate::feature::AccessLevel;

pub struct LocalEndpoint {
    host: String,
    label: String,
    local_uri: Url,
    dispatcher: Arc<Dispatcher>,
    aliases: RwLock<Vec<Url>>,
}

impl LocalEndpoint {
    /// Serve `local://{host}` from `dispatcher`.
    pub fn new(host: &str, dispatcher: Arc<Dispatcher>) -> PlugResult<Self> {
        let host = host.to_ascii_lowercase();
        let local_uri = Url::parse(&format!("{LOCAL_SCHEME}://{host}/"))?;
        Ok(Self {
            label: format!("local:{host}"),
            host,
            local_uri,
            dispatcher,
            aliases: RwLock::new(Vec::new()),
        })
    }

    /// Also serve URIs below `alias`.
    pub fn with_alias(self, alias: Url) -> Self {
        self.add_alias(alias);
        self
    }

    pub fn add_alias(&self, alias: Url) {
        self.aliases.write().push(alias);
    }

    /// `local://{host}/`
    pub fn local_uri(&self) -> &Url {
        &self.local_uri
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn serves_host(&self, uri: &Url) -> bool {
        is_local(uri) && uri.host_str().is_some_and(|h| h.eq_ignore_ascii_case(&self.host))
    }

    fn translate_alias(&self, uri: &Url) -> Option<Url> {
        let aliases = self.aliases.read();
        let segments = path_segments(uri);
        aliases.iter().find_map(|alias| {
            if !same_origin(alias, uri) {
                return None;
            }
            let prefix = path_segments(alias);
            if segments.len() < prefix.len()
                || !prefix
                    .iter()
                    .zip(&segments)
                    .all(|(a, b)| a.eq_ignore_ascii_case(b))
            {
                return None;
            }
            let mut local = with_path_segments(&self.local_uri, &segments[prefix.len()..]);
            local.set_query(uri.query());
            Some(local)
        })
    }
}

#[async_trait]
impl PlugEndpoint for LocalEndpoint {
    fn name(&self) -> &str {
        &self.label
    }

    fn score(&self, uri: &Url) -> Option<(i32, Url)> {
        if self.serves_host(uri) {
            return Some((SCORE_SCHEME, uri.clone()));
        }
        self.translate_alias(uri).map(|local| (SCORE_FORCED, local))
    }

    async fn invoke(
        &self,
        plug: &Plug,
        verb: Method,
        uri: Url,
        request: Message,
        _timeout: Duration,
    ) -> PlugResult<Message> {
        let granted = if is_local(plug.uri()) {
            AccessLevel::Internal
        } else {
            AccessLevel::Public
        };
        debug!(endpoint = %self.label, %verb, uri = %uri, %granted, "local dispatch");
        Ok(self.dispatcher.dispatch(verb, uri, request, granted).await)
    }
}

impl std::fmt::Debug for LocalEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEndpoint")
            .field("host", &self.host)
            .field("aliases", &*self.aliases.read())
            .finish()
    }
}
