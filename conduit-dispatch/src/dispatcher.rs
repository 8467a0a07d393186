//! Feature dispatch.
//!
//! The dispatcher owns the compiled features of every registered service
//! and routes requests to them. When several features match a request the
//! winner is chosen by, in order:
//!
//! - an exact verb over the `*` verb,
//! - more constant segments,
//! - fewer optional segments,
//! - earlier registration.
//!
//! A path that matches only features registered for other verbs answers
//! `405 Method Not Allowed` with an `Allow` header; an unmatched path
//! answers `404 Not Found`.

use conduit_core::uri::path_segments;
use conduit_core::{Error as CoreError, Message, Status};
use http::Method;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::config::DispatchConfig;
use crate::context::FeatureContext;
use crate::error::Result;
use crate::feature::{AccessLevel, Feature, FeatureInfo};
use crate::service::Service;

#[derive(Debug, Default)]
pub struct Dispatcher {
    features: RwLock<Vec<Arc<Feature>>>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            features: RwLock::new(Vec::new()),
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Compile and register every feature of `service`.
    ///
    /// Nothing is registered when any feature fails to compile.
    pub fn register(&self, service: Service) -> Result<()> {
        let (name, base_path, builders) = service.into_parts();
        let base: Vec<&str> = base_path.split('/').filter(|s| !s.is_empty()).collect();
        let compiled = builders
            .into_iter()
            .map(|builder| builder.build(&name, &base).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        info!(service = %name, features = compiled.len(), "service registered");
        self.features.write().extend(compiled);
        Ok(())
    }

    /// Remove every feature of the named service. Returns how many were removed.
    pub fn unregister(&self, service: &str) -> usize {
        let mut features = self.features.write();
        let before = features.len();
        features.retain(|f| f.service() != service);
        let removed = before - features.len();
        if removed > 0 {
            info!(service = %service, features = removed, "service unregistered");
        }
        removed
    }

    /// Descriptors of all registered features in registration order.
    pub fn features(&self) -> Vec<FeatureInfo> {
        self.features.read().iter().map(|f| f.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.read().is_empty()
    }

    /// Route one request to a feature and run it.
    ///
    /// `granted` is the access level of the caller.
    pub async fn dispatch(&self, verb: Method, uri: Url, mut request: Message, granted: AccessLevel) -> Message {
        let segments = path_segments(&uri);

        let (feature, allowed) = self.select(&verb, &segments);
        let Some(feature) = feature else {
            request.close();
            if allowed.is_empty() {
                debug!(%verb, uri = %uri, "no feature matched");
                return Message::not_found(format!("no feature matches {} {}", verb, uri.path()));
            }
            debug!(%verb, uri = %uri, ?allowed, "verb not allowed");
            let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
            return Message::method_not_allowed(&allowed, format!("{} is not allowed on {}", verb, uri.path()));
        };

        if granted < feature.access() {
            request.close();
            debug!(%verb, uri = %uri, required = %feature.access(), %granted, "access denied");
            return Message::forbidden(format!(
                "{} access required, caller has {}",
                feature.access(),
                granted
            ));
        }

        if let Err(err) = request
            .memorize(self.config.max_request_bytes, self.config.body_timeout)
            .await
        {
            debug!(%verb, uri = %uri, error = %err, "request body rejected");
            let status = match err {
                CoreError::BufferOverflow { .. } => Status::REQUEST_ENTITY_TOO_LARGE,
                CoreError::Timeout(_) => Status::REQUEST_TIMEOUT,
                _ => Status::BAD_REQUEST,
            };
            return Message::error(status, err.to_string());
        }
        if let Some(len) = request.content_length()
            && len > self.config.max_request_bytes
        {
            request.close();
            debug!(%verb, uri = %uri, len, "request body too large");
            return Message::error(
                Status::REQUEST_ENTITY_TOO_LARGE,
                format!("request body exceeds the {} byte limit", self.config.max_request_bytes),
            );
        }

        let path = feature
            .signature()
            .extract_arguments(&segments)
            .unwrap_or_default();
        let ctx = Arc::new(FeatureContext::new(
            feature.service(),
            feature.signature().as_str(),
            verb,
            uri.clone(),
            granted,
            path,
        ));
        debug!(
            request_id = %ctx.request_id(),
            service = %feature.service(),
            signature = %feature.signature(),
            "dispatching"
        );

        feature.execute(ctx, request).await
    }

    /// Best feature for the request, or the verbs that would have matched.
    fn select(&self, verb: &Method, segments: &[&str]) -> (Option<Arc<Feature>>, Vec<String>) {
        let features = self.features.read();
        let mut best: Option<&Arc<Feature>> = None;
        let mut allowed: Vec<String> = Vec::new();

        for feature in features.iter() {
            if !feature.signature().matches(segments) {
                continue;
            }
            if !feature.accepts(verb) {
                if let Some(v) = feature.verb().map(Method::to_string)
                    && !allowed.contains(&v)
                {
                    allowed.push(v);
                }
                continue;
            }
            if best.is_none_or(|current| rank(feature) > rank(current)) {
                best = Some(feature);
            }
        }

        (best.cloned(), allowed)
    }
}

fn rank(feature: &Feature) -> (bool, usize, Reverse<usize>) {
    (
        !feature.is_wildcard_verb(),
        feature.signature().constant_count(),
        Reverse(feature.signature().optional_count()),
    )
}
