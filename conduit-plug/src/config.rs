//! Plug configuration.

use std::env;
use std::time::Duration;

/// Default invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of redirects a plug follows.
pub const DEFAULT_MAX_AUTO_REDIRECTS: u16 = 10;

/// Default ceiling for response bodies buffered by `Plug::invoke`.
pub const DEFAULT_MAX_MEMORIZE_BYTES: u64 = 16 * 1024 * 1024;

/// Which request headers survive an automatic redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectHeaders {
    /// Forward every header and the credentials to any target.
    All,
    /// Drop `Authorization`, `Proxy-Authorization`, `Cookie` and the plug
    /// credentials when the target has a different origin.
    #[default]
    SameOrigin,
}

/// Settings every new plug starts from.
#[derive(Debug, Clone)]
pub struct PlugConfig {
    /// Default invocation timeout.
    pub timeout: Duration,
    /// Connect timeout for the HTTP endpoint.
    pub connect_timeout: Duration,
    /// Number of 301/302/307 responses followed before giving up.
    pub max_auto_redirects: u16,
    /// Response body ceiling for memorization.
    pub max_memorize_bytes: u64,
    /// User agent sent by the HTTP endpoint.
    pub user_agent: String,
    /// Header forwarding policy on redirect.
    pub redirect_headers: RedirectHeaders,
}

impl Default for PlugConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            max_auto_redirects: DEFAULT_MAX_AUTO_REDIRECTS,
            max_memorize_bytes: DEFAULT_MAX_MEMORIZE_BYTES,
            user_agent: format!("conduit-plug/{}", env!("CARGO_PKG_VERSION")),
            redirect_headers: RedirectHeaders::default(),
        }
    }
}

impl PlugConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PlugConfigBuilder {
        PlugConfigBuilder::default()
    }

    /// Defaults overridden by environment variables.
    ///
    /// - `CONDUIT_PLUG_TIMEOUT_MS`
    /// - `CONDUIT_PLUG_MAX_REDIRECTS`
    /// - `CONDUIT_PLUG_MAX_MEMORIZE_BYTES`
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = read_env::<u64>("CONDUIT_PLUG_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(max) = read_env::<u16>("CONDUIT_PLUG_MAX_REDIRECTS") {
            config.max_auto_redirects = max;
        }
        if let Some(bytes) = read_env::<u64>("CONDUIT_PLUG_MAX_MEMORIZE_BYTES") {
            config.max_memorize_bytes = bytes;
        }
        config
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid plug configuration value");
            None
        }
    }
}

/// Builder for plug configuration.
#[derive(Debug, Default)]
pub struct PlugConfigBuilder {
    config: PlugConfig,
}

impl PlugConfigBuilder {
    /// Set the default invocation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the HTTP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the number of redirects to follow.
    pub fn max_auto_redirects(mut self, max: u16) -> Self {
        self.config.max_auto_redirects = max;
        self
    }

    /// Set the memorization ceiling.
    pub fn max_memorize_bytes(mut self, max: u64) -> Self {
        self.config.max_memorize_bytes = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the redirect header policy.
    pub fn redirect_headers(mut self, policy: RedirectHeaders) -> Self {
        self.config.redirect_headers = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> PlugConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlugConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_auto_redirects, 10);
        assert_eq!(config.max_memorize_bytes, 16 * 1024 * 1024);
        assert_eq!(config.redirect_headers, RedirectHeaders::SameOrigin);
        assert!(config.user_agent.starts_with("conduit-plug/"));
    }

    #[test]
    fn test_builder() {
        let config = PlugConfig::builder()
            .timeout(Duration::from_secs(5))
            .max_auto_redirects(2)
            .max_memorize_bytes(1024)
            .user_agent("probe")
            .redirect_headers(RedirectHeaders::All)
            .build();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_auto_redirects, 2);
        assert_eq!(config.max_memorize_bytes, 1024);
        assert_eq!(config.user_agent, "probe");
        assert_eq!(config.redirect_headers, RedirectHeaders::All);
    }
}
