//! HTTP client construction and caching.
//!
//! The [`ConnectionPool`] wraps a `reqwest` [`Client`] with:
//! - **Lazy construction**: The client is built on first use, not at pool construction
//! - **Shared ownership**: The client is wrapped in `Arc<RwLock<...>>` for thread-safe access
//! - **Configured settings**: Timeouts, keepalive and user agent from [`ClientConfig`]
//!
//! `reqwest::Client` pools keep-alive connections internally and is cheap to
//! clone, so one cached instance serves every concurrent request.
//!
//! # Example
//!
//! ```ignore
//! let config = ClientConfig::builder()
//!     .with_endpoint("http://localhost:8000")
//!     .build()?;
//!
//! let pool = ConnectionPool::new(config);
//! let client = pool.http_client()?;
//! ```

use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use reqwest::Client;
use snafu::ResultExt;

use crate::{
    config::ClientConfig,
    error::{ConnectionSnafu, Result},
};

/// TCP keepalive interval.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Idle connections are closed after this long.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Caches the HTTP client used to reach the backend.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    /// Cached client, lazily initialized.
    client: Arc<RwLock<Option<Client>>>,

    /// Client configuration for connection settings.
    config: ClientConfig,
}

impl ConnectionPool {
    /// Creates a new connection pool with the given configuration.
    ///
    /// No client is built until [`http_client`](Self::http_client) is called.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { client: Arc::new(RwLock::new(None)), config }
    }

    /// Returns the HTTP client, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SdkError::Connection`] if the TLS backend cannot be
    /// initialized.
    pub fn http_client(&self) -> Result<Client> {
        {
            let guard = self.client.read();
            if let Some(client) = guard.as_ref() {
                return Ok(client.clone());
            }
        }

        let built = self.build_client()?;

        let mut guard = self.client.write();
        // Another caller may have won the race while we were building.
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        *guard = Some(built.clone());
        Ok(built)
    }

    fn build_client(&self) -> Result<Client> {
        tracing::debug!(endpoint = %self.config.endpoint, "building HTTP client");
        Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent.clone())
            .tcp_nodelay(true)
            .tcp_keepalive(TCP_KEEPALIVE_INTERVAL)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .context(ConnectionSnafu)
    }

    /// Returns a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns `true` if a client has been built and cached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.client.read().is_some()
    }

    /// Drops the cached client and its idle connections.
    ///
    /// The next request builds a fresh client.
    pub fn reset(&self) {
        let mut guard = self.client.write();
        *guard = None;
    }
}
