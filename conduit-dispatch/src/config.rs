//! Dispatcher configuration.

use std::env;
use std::time::Duration;

/// Limits applied to incoming request bodies before features run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Largest request body buffered for a feature.
    pub max_request_bytes: u64,
    /// Time allowed for reading the request body.
    pub body_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: 10 * 1024 * 1024,
            body_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }

    /// Defaults overridden by `CONDUIT_DISPATCH_MAX_BODY_BYTES` and
    /// `CONDUIT_DISPATCH_BODY_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(bytes) = env::var("CONDUIT_DISPATCH_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.max_request_bytes = bytes;
        }
        if let Some(ms) = env::var("CONDUIT_DISPATCH_BODY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.body_timeout = Duration::from_millis(ms);
        }
        config
    }
}

#[derive(Debug, Default)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    pub fn max_request_bytes(mut self, max: u64) -> Self {
        self.config.max_request_bytes = max;
        self
    }

    pub fn body_timeout(mut self, timeout: Duration) -> Self {
        self.config.body_timeout = timeout;
        self
    }

    pub fn build(self) -> DispatchConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = DispatchConfig::builder()
            .max_request_bytes(512)
            .body_timeout(Duration::from_millis(250))
            .build();
        assert_eq!(config.max_request_bytes, 512);
        assert_eq!(config.body_timeout, Duration::from_millis(250));
    }
}
