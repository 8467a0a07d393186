//! Services group features under a base path.

use crate::feature::FeatureBuilder;

/// An ordered set of features mounted below `base_path`.
///
/// ```rust,ignore
/// let users = Service::new("users", "/api/users")
///     .feature(Feature::builder("GET", "{id}").handler(get_user))
///     .feature(Feature::builder("POST", "/").handler(create_user));
/// dispatcher.register(users)?;
/// ```
pub struct Service {
    name: String,
    base_path: String,
    features: Vec<FeatureBuilder>,
}

impl Service {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            features: Vec::new(),
        }
    }

    pub fn feature(mut self, feature: FeatureBuilder) -> Self {
        self.features.push(feature);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Non-empty segments of the base path.
    pub fn base_segments(&self) -> Vec<&str> {
        self.base_path.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub(crate) fn into_parts(self) -> (String, String, Vec<FeatureBuilder>) {
        (self.name, self.base_path, self.features)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("features", &self.features.len())
            .finish()
    }
}
