//! The collaborators a plug resolves against.

use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::PlugConfig;
use crate::cookie_jar::{CookieJarStrategy, TaskLocalCookieJars};
use crate::registry::EndpointRegistry;

static GLOBAL: Lazy<Arc<PlugEnvironment>> =
    Lazy::new(|| Arc::new(PlugEnvironment::new(PlugConfig::from_env())));

/// Endpoint registry, cookie jar strategy and default settings shared by
/// a family of plugs.
///
/// Tests build isolated environments with [`PlugEnvironment::empty`];
/// applications normally use [`PlugEnvironment::global`].
pub struct PlugEnvironment {
    registry: Arc<EndpointRegistry>,
    cookies: Arc<dyn CookieJarStrategy>,
    config: PlugConfig,
}

impl PlugEnvironment {
    /// Environment with the default endpoints and a fresh global jar.
    pub fn new(config: PlugConfig) -> Self {
        Self {
            registry: Arc::new(EndpointRegistry::with_defaults(&config)),
            cookies: Arc::new(TaskLocalCookieJars::new()),
            config,
        }
    }

    /// Environment without any endpoint.
    pub fn empty(config: PlugConfig) -> Self {
        Self {
            registry: Arc::new(EndpointRegistry::new()),
            cookies: Arc::new(TaskLocalCookieJars::new()),
            config,
        }
    }

    /// The lazily built process-wide environment.
    pub fn global() -> Arc<PlugEnvironment> {
        GLOBAL.clone()
    }

    pub fn with_registry(mut self, registry: Arc<EndpointRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cookie_strategy(mut self, strategy: Arc<dyn CookieJarStrategy>) -> Self {
        self.cookies = strategy;
        self
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn cookies(&self) -> &Arc<dyn CookieJarStrategy> {
        &self.cookies
    }

    pub fn config(&self) -> &PlugConfig {
        &self.config
    }
}

impl std::fmt::Debug for PlugEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlugEnvironment")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
