//! Settings of [`crate::PortalClient`].
//!
//! [`ClientConfig`] is assembled with `with_*` calls and checked once in
//! [`ClientConfigBuilder::build`]; afterwards it is immutable. Reads use the
//! attached [`RetryPolicy`]; writes and identification never retry.

use std::time::Duration;

use bon::Builder;
use reqwest::Url;
use snafu::ensure;

use crate::error::{ConfigSnafu, InvalidUrlSnafu, Result};

/// Upper bound on one request, connect to last body byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on establishing a TCP/TLS connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `User-Agent` used when none is set.
pub const DEFAULT_USER_AGENT: &str = concat!("fingerprint-portal/", env!("CARGO_PKG_VERSION"));

/// Validated client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) endpoint: Url,
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) user_agent: String,
}

impl ClientConfig {
    /// Starts a builder with every optional setting at its default.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Base URL, always ending in `/`.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Per-request deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Connect deadline.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Backoff applied to reads.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// `User-Agent` header value.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Unchecked [`ClientConfig`] under construction.
///
/// Only the endpoint has no default.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    retry_policy: RetryPolicy,
    user_agent: String,
}

impl ClientConfigBuilder {
    /// Base URL of the service.
    ///
    /// An absolute `http` or `https` URL, optionally with a path prefix such
    /// as `http://gateway/fingerprint/` that request paths are appended to.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Per-request deadline. Defaults to [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect deadline. Defaults to [`DEFAULT_CONNECT_TIMEOUT`].
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Backoff for reads.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// `User-Agent` header value.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Checks the settings and freezes them.
    ///
    /// # Errors
    ///
    /// [`crate::SdkError::Config`] for a missing endpoint, a zero deadline,
    /// a policy with no attempts or a blank user agent;
    /// [`crate::SdkError::InvalidUrl`] for an unusable endpoint.
    pub fn build(self) -> Result<ClientConfig> {
        let Some(raw) = self.endpoint else {
            return ConfigSnafu { message: "endpoint is required" }.fail();
        };
        let endpoint = validate_url(&raw)?;

        for (name, value) in [("timeout", self.timeout), ("connect_timeout", self.connect_timeout)]
        {
            ensure!(!value.is_zero(), ConfigSnafu { message: format!("{name} must be positive") });
        }
        ensure!(
            self.retry_policy.max_attempts > 0,
            ConfigSnafu { message: "retry max_attempts must be at least 1" }
        );
        ensure!(
            !self.user_agent.trim().is_empty(),
            ConfigSnafu { message: "user_agent must not be blank" }
        );

        Ok(ClientConfig {
            endpoint,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            retry_policy: self.retry_policy,
            user_agent: self.user_agent,
        })
    }
}

/// Exponential backoff for idempotent reads.
///
/// `max_attempts` counts the first try, so `1` disables retries.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct RetryPolicy {
    /// Tries in total.
    #[builder(default = 3)]
    pub max_attempts: u32,

    /// Delay before the second try.
    #[builder(default = Duration::from_millis(100))]
    pub initial_backoff: Duration,

    /// Cap on any single delay.
    #[builder(default = Duration::from_secs(2))]
    pub max_backoff: Duration,

    /// Growth factor between delays.
    #[builder(default = 2.0)]
    pub multiplier: f64,

    /// Randomize each delay.
    #[builder(default = true)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// One attempt, no backoff.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::builder().max_attempts(1).build()
    }
}

/// Validates that a URL is a well-formed HTTP(S) base URL.
///
/// The returned URL always ends with `/` so relative request paths are
/// appended to, rather than replacing, any path prefix.
///
/// # Errors
///
/// Returns [`crate::SdkError::InvalidUrl`] when the URL does not parse, has
/// a scheme other than `http`/`https`, or has no host.
pub fn validate_url(url: &str) -> Result<Url> {
    if url.contains(char::is_whitespace) {
        return InvalidUrlSnafu { url, message: "URL cannot contain whitespace" }.fail();
    }

    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => return InvalidUrlSnafu { url, message: e.to_string() }.fail(),
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return InvalidUrlSnafu { url, message: "URL must start with http:// or https://" }.fail();
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => {},
        _ => return InvalidUrlSnafu { url, message: "URL must have a host" }.fail(),
    }

    if parsed.query().is_some() || parsed.fragment().is_some() {
        return InvalidUrlSnafu { url, message: "URL cannot carry a query or fragment" }.fail();
    }

    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }

    Ok(parsed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::SdkError;

    fn config_error(result: Result<ClientConfig>) -> String {
        match result {
            Err(SdkError::Config { message }) => message,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_apply_when_only_endpoint_is_set() {
        let config = ClientConfig::builder().with_endpoint("http://localhost:8000").build().unwrap();

        assert_eq!(config.endpoint().as_str(), "http://localhost:8000/");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.retry_policy(), &RetryPolicy::default());
        assert!(config.user_agent().starts_with("fingerprint-portal/"));
    }

    #[test]
    fn test_endpoint_is_required() {
        assert!(config_error(ClientConfig::builder().build()).contains("endpoint"));
    }

    #[test]
    fn test_zero_deadlines_are_rejected_by_name() {
        let base = ClientConfig::builder().with_endpoint("http://localhost");
        let message = config_error(base.clone().with_timeout(Duration::ZERO).build());
        assert!(message.starts_with("timeout"), "{message}");
        let message = config_error(base.with_connect_timeout(Duration::ZERO).build());
        assert!(message.starts_with("connect_timeout"), "{message}");
    }

    #[test]
    fn test_policy_without_attempts_is_rejected() {
        let policy = RetryPolicy::builder().max_attempts(0).build();
        let result =
            ClientConfig::builder().with_endpoint("http://localhost").with_retry_policy(policy).build();
        assert!(config_error(result).contains("max_attempts"));
    }

    #[test]
    fn test_blank_user_agent_is_rejected() {
        let result =
            ClientConfig::builder().with_endpoint("http://localhost").with_user_agent("  ").build();
        assert!(config_error(result).contains("user_agent"));
    }

    #[test]
    fn test_overrides_are_kept() {
        let config = ClientConfig::builder()
            .with_endpoint("https://scanner.example.com:8443")
            .with_timeout(Duration::from_secs(3))
            .with_connect_timeout(Duration::from_millis(250))
            .with_user_agent("kiosk/2")
            .build()
            .unwrap();
        assert_eq!(config.endpoint().scheme(), "https");
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.user_agent(), "kiosk/2");
    }

    #[test]
    fn test_endpoint_shapes() {
        for bad in ["localhost:8000", "ftp://example.com", "http://", "http://local host", "http://a/?q=1"] {
            assert!(
                matches!(validate_url(bad), Err(SdkError::InvalidUrl { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_path_prefix_gets_trailing_slash() {
        let url = validate_url("https://gateway.example.com/fingerprint").unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.com/fingerprint/");
        assert_eq!(url.join("aliases").unwrap().path(), "/fingerprint/aliases");
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::builder()
            .max_attempts(5)
            .initial_backoff(Duration::from_millis(50))
            .jitter(false)
            .build();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
        assert_eq!(policy.max_backoff, Duration::from_secs(2));
        assert!(!policy.jitter);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
