//! Per-dispatch request context.

use http::Method;
use url::Url;
use uuid::Uuid;

use crate::feature::AccessLevel;
use crate::signature::PathArguments;

/// What a feature knows about the request it is serving.
///
/// Created once per dispatch and shared by every stage of the feature.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    request_id: Uuid,
    service: String,
    signature: String,
    verb: Method,
    uri: Url,
    access: AccessLevel,
    path: PathArguments,
    query: Vec<(String, String)>,
}

impl FeatureContext {
    pub fn new(
        service: impl Into<String>,
        signature: impl Into<String>,
        verb: Method,
        uri: Url,
        access: AccessLevel,
        path: PathArguments,
    ) -> Self {
        let query = uri
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            request_id: Uuid::new_v4(),
            service: service.into(),
            signature: signature.into(),
            verb,
            uri,
            access,
            path,
            query,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Name of the service owning the feature.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Signature of the matched feature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn verb(&self) -> &Method {
        &self.verb
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Access level granted to the caller.
    pub fn access(&self) -> AccessLevel {
        self.access
    }

    /// Trailing and unnamed wildcard segments, decoded.
    pub fn suffixes(&self) -> &[String] {
        &self.path.suffixes
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path.get(name)
    }

    pub fn path_params(&self, name: &str) -> &[String] {
        self.path.get_all(name)
    }

    /// First query value for `name` (case-insensitive).
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_all(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}
