//! Main `PortalClient` implementation.
//!
//! Provides the HTTP rendition of [`Backend`], orchestrating the connection
//! pool, retry of idempotent reads, and cancellation on shutdown.

use std::time::Instant;

use fingerprint_portal_types::{
    validate_fingerprint_id, AliasDirectory, FingerprintId, IdentificationResult, ValidationError,
};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{Backend, MatchHistory},
    config::ClientConfig,
    connection::ConnectionPool,
    error::{ConnectionSnafu, InvalidUrlSnafu, Result, SdkError},
    retry::with_retry_cancellable,
    wire::{
        AliasesResponse, EnrollRequest, ErrorBody, IdentifyResponse, MatchesResponse,
        MessageResponse,
    },
};

// =============================================================================
// Operations
// =============================================================================

/// Backend operations, used to pick the status mapping and for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Enroll,
    ListAliases,
    FindMatches,
    Identify,
    DeleteFingerprint,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::ListAliases => "list_aliases",
            Self::FindMatches => "find_matches",
            Self::Identify => "identify",
            Self::DeleteFingerprint => "delete_fingerprint",
        }
    }

    /// Maps a non-success status to the error the flows act on.
    ///
    /// | Status | Operation | Error |
    /// |--------|-----------|-------|
    /// | 404 | list, matches, delete | `NotFound` |
    /// | 404 | identify | `NoMatch` |
    /// | 400, 409 | enroll | `Conflict` |
    /// | 500, 501 with detail | identify | `NoHardware` |
    /// | other 5xx | any | `Unavailable` |
    /// | other 4xx | any | `Rejected` |
    fn error_for(self, status: u16, detail: Option<String>) -> SdkError {
        match (self, status) {
            (Self::ListAliases | Self::FindMatches | Self::DeleteFingerprint, 404) => {
                SdkError::NotFound { status, detail }
            },
            (Self::Identify, 404) => SdkError::NoMatch { status, detail },
            (Self::Enroll, 400 | 409) => SdkError::Conflict { status, detail },
            (Self::Identify, 500 | 501) if detail.is_some() => {
                SdkError::NoHardware { status, detail }
            },
            (_, 500..=599) => SdkError::Unavailable { status, detail },
            _ => SdkError::Rejected { status, detail },
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the fingerprint service.
///
/// Cheap to clone: clones share the connection pool and the shutdown token.
///
/// # Example
///
/// ```no_run
/// # use fingerprint_portal_sdk::{Backend, ClientConfig, PortalClient};
/// # async fn example() -> fingerprint_portal_sdk::Result<()> {
/// let config = ClientConfig::builder().with_endpoint("http://localhost:8000").build()?;
/// let client = PortalClient::new(config)?;
///
/// let directory = client.list_aliases().await?;
/// println!("next id: {:?}", directory.next_id());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PortalClient {
    pool: ConnectionPool,
    /// Cancellation token for coordinated shutdown.
    cancellation: CancellationToken,
}

impl PortalClient {
    /// Creates a new client with the given configuration.
    ///
    /// The HTTP client is built lazily on first use.
    ///
    /// # Errors
    ///
    /// Currently infallible for a built [`ClientConfig`]; the `Result` leaves
    /// room for eager connection setup.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self { pool: ConnectionPool::new(config), cancellation: CancellationToken::new() })
    }

    /// Creates a client for `endpoint` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid.
    pub fn connect(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::builder().with_endpoint(endpoint).build()?)
    }

    /// Returns the client configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.pool.config()
    }

    /// Returns the connection pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Cancels all pending and future operations.
    ///
    /// In-flight requests resolve to [`SdkError::Shutdown`]; idle connections
    /// are dropped.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
        tracing::debug!("Client shutdown initiated");
        self.pool.reset();
    }

    /// Returns `true` if the client has been shut down.
    ///
    /// After shutdown, all operations fail with `SdkError::Shutdown`.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns a token that fires when the client shuts down.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    #[inline]
    fn check_shutdown(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(SdkError::Shutdown);
        }
        Ok(())
    }

    /// Resolves a request path under the configured base URL.
    ///
    /// Each segment is percent-encoded, so aliases containing `/`, `?` or
    /// spaces stay a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config().endpoint().clone();
        let text = url.to_string();
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            },
            Err(()) => {
                return InvalidUrlSnafu { url: text, message: "URL cannot be a base" }.fail();
            },
        }
        Ok(url)
    }

    fn transport<T>(&self, result: std::result::Result<T, reqwest::Error>) -> Result<T> {
        match result {
            Err(e) if e.is_timeout() => Err(SdkError::Timeout {
                duration_ms: u64::try_from(self.config().timeout().as_millis()).unwrap_or(u64::MAX),
            }),
            other => other.context(ConnectionSnafu),
        }
    }

    /// Sends one request and turns status and body into a value or an error.
    ///
    /// The only place that looks at HTTP status codes.
    async fn execute<T, F>(&self, operation: Operation, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&Client) -> RequestBuilder,
    {
        self.check_shutdown()?;
        let client = self.pool.http_client()?;
        let request = build(&client);

        let exchange = async {
            let started = Instant::now();
            let response = self.transport(request.send().await)?;
            let status = response.status();
            let body = self.transport(response.bytes().await)?;

            tracing::debug!(
                operation = operation.as_str(),
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "backend responded"
            );

            if status.is_success() {
                serde_json::from_slice(&body).map_err(|e| SdkError::MalformedResponse {
                    operation: operation.as_str(),
                    message: e.to_string(),
                })
            } else {
                let detail = ErrorBody::parse(&body).into_message();
                Err(operation.error_for(status.as_u16(), detail))
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(SdkError::Shutdown),
            result = exchange => result,
        }
    }

    /// Runs an idempotent read under the retry policy.
    async fn read<T, F>(&self, operation: Operation, url: &Url, adapt: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client, Url) -> RequestBuilder,
    {
        let policy = self.config().retry_policy();
        let adapt = &adapt;
        let result = with_retry_cancellable(policy, &self.cancellation, move || {
            self.execute(operation, move |client| adapt(client, url.clone()))
        })
        .await;

        match result {
            Err(SdkError::Cancelled) if self.is_shutdown() => Err(SdkError::Shutdown),
            other => other,
        }
    }
}

fn require_alias(alias: &str) -> Result<()> {
    if alias.trim().is_empty() {
        return Err(ValidationError {
            field: "alias".to_string(),
            constraint: "must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

impl Backend for PortalClient {
    async fn enroll(&self, id: FingerprintId, alias: &str) -> Result<String> {
        validate_fingerprint_id(id)?;
        require_alias(alias)?;

        let url = self.url(&["enroll"])?;
        let body = EnrollRequest { id, alias: alias.to_string() };
        tracing::debug!(%id, alias, "enrolling fingerprint");

        let response: MessageResponse =
            self.execute(Operation::Enroll, |client| client.post(url).json(&body)).await?;
        tracing::info!(%id, alias, "fingerprint enrolled");
        Ok(response.message)
    }

    async fn list_aliases(&self) -> Result<AliasDirectory> {
        let url = self.url(&["aliases"])?;
        let result: Result<AliasesResponse> =
            self.read(Operation::ListAliases, &url, |client, url| client.get(url)).await;

        match result {
            Ok(response) => Ok(AliasDirectory::from(response.aliases)),
            Err(SdkError::NotFound { detail, .. }) => {
                tracing::debug!(?detail, "backend reports an empty directory");
                Ok(AliasDirectory::empty())
            },
            Err(e) => Err(e),
        }
    }

    async fn find_matches(&self, alias: &str) -> Result<MatchHistory> {
        require_alias(alias)?;

        let url = self.url(&["matches", alias])?;
        let result: Result<MatchesResponse> =
            self.read(Operation::FindMatches, &url, |client, url| client.get(url)).await;

        match result {
            Ok(response) => Ok(MatchHistory { matches: response.matches, notice: None }),
            Err(SdkError::NotFound { detail, .. }) => {
                tracing::debug!(alias, ?detail, "no match history");
                Ok(MatchHistory { matches: Vec::new(), notice: detail })
            },
            Err(e) => Err(e),
        }
    }

    async fn identify(&self) -> Result<IdentificationResult> {
        let url = self.url(&["match"])?;
        let response: IdentifyResponse =
            self.execute(Operation::Identify, |client| client.post(url)).await?;

        let result = response.into_result().map_err(|message| SdkError::MalformedResponse {
            operation: Operation::Identify.as_str(),
            message,
        })?;
        match &result.matched {
            Some(m) => tracing::info!(id = %m.id, alias = %m.alias, confidence = m.confidence, "fingerprint matched"),
            None => tracing::info!(message = %result.message, "identification returned no identity"),
        }
        Ok(result)
    }

    async fn delete_fingerprint(&self, id: FingerprintId) -> Result<String> {
        validate_fingerprint_id(id)?;

        let id_text = id.to_string();
        let url = self.url(&["fingerprint", &id_text])?;
        let response: MessageResponse =
            self.execute(Operation::DeleteFingerprint, |client| client.delete(url)).await?;
        tracing::info!(%id, "fingerprint deleted");
        Ok(response.message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use fingerprint_portal_types::AliasRecord;

    use super::*;
    use crate::{
        config::RetryPolicy,
        error::ErrorKind,
        mock::{EmptyDirectoryMode, IdentifyOutcome, MockFingerprintServer},
    };

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(3)
            .initial_backoff(Duration::from_millis(5))
            .max_backoff(Duration::from_millis(20))
            .jitter(false)
            .build()
    }

    fn client_for(server: &MockFingerprintServer) -> PortalClient {
        let config = ClientConfig::builder()
            .with_endpoint(server.endpoint())
            .with_retry_policy(fast_retry())
            .build()
            .expect("valid config");
        PortalClient::new(config).expect("client creation")
    }

    // -------------------------------------------------------------------------
    // Status mapping
    // -------------------------------------------------------------------------

    #[test]
    fn test_not_found_mapping_depends_on_operation() {
        assert_eq!(Operation::ListAliases.error_for(404, None).kind(), ErrorKind::NotFound);
        assert_eq!(Operation::FindMatches.error_for(404, None).kind(), ErrorKind::NotFound);
        assert_eq!(Operation::DeleteFingerprint.error_for(404, None).kind(), ErrorKind::NotFound);
        assert_eq!(Operation::Identify.error_for(404, None).kind(), ErrorKind::NoMatch);
        assert_eq!(Operation::Enroll.error_for(404, None).kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_enroll_conflict_statuses() {
        assert_eq!(Operation::Enroll.error_for(400, None).kind(), ErrorKind::Conflict);
        assert_eq!(Operation::Enroll.error_for(409, None).kind(), ErrorKind::Conflict);
        assert_eq!(Operation::Enroll.error_for(422, None).kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_identify_sensor_failure_needs_detail() {
        let err = Operation::Identify.error_for(500, Some("Sensor not connected".into()));
        assert_eq!(err.kind(), ErrorKind::NoHardware);
        assert!(!err.is_retryable());

        let err = Operation::Identify.error_for(500, None);
        assert!(matches!(err, SdkError::Unavailable { status: 500, .. }));
    }

    #[test]
    fn test_gateway_errors_are_unavailable() {
        for status in [502, 503, 504, 599] {
            let err = Operation::Identify.error_for(status, Some("bad gateway".into()));
            assert!(matches!(err, SdkError::Unavailable { .. }), "{status}");
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_other_client_errors_are_rejected() {
        assert_eq!(Operation::ListAliases.error_for(401, None).kind(), ErrorKind::Rejected);
        assert_eq!(Operation::DeleteFingerprint.error_for(400, None).kind(), ErrorKind::Rejected);
    }

    // -------------------------------------------------------------------------
    // URL building
    // -------------------------------------------------------------------------

    #[test]
    fn test_url_percent_encodes_alias_segment() {
        let client = PortalClient::connect("http://localhost:8000").unwrap();
        let url = client.url(&["matches", "amy pond/2?x"]).unwrap();
        assert_eq!(url.path(), "/matches/amy%20pond%2F2%3Fx");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let client = PortalClient::connect("http://localhost:8000/api").unwrap();
        let url = client.url(&["aliases"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/aliases");
    }

    #[test]
    fn test_url_appends_every_segment_in_order() {
        let client = PortalClient::connect("http://localhost:8000/api/").unwrap();
        let url = client.url(&["delete_fingerprint", "42"]).unwrap();
        assert_eq!(url.path(), "/api/delete_fingerprint/42");
        assert_eq!(client.config().endpoint().path(), "/api/");
    }

    // -------------------------------------------------------------------------
    // Against the mock backend
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_aliases_preserves_backend_order() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(3, "cara");
        server.add_alias(1, "amy");
        let client = client_for(&server);

        let directory = client.list_aliases().await.unwrap();
        let ids: Vec<i64> = directory.records().iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_list_aliases_empty_in_both_modes() {
        let server = MockFingerprintServer::start().await.unwrap();
        let client = client_for(&server);

        assert!(client.list_aliases().await.unwrap().is_empty());

        server.set_empty_directory_mode(EmptyDirectoryMode::EmptyList);
        assert!(client.list_aliases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_aliases_retries_transient_failure() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(1, "amy");
        server.inject_unavailable(2);
        let client = client_for(&server);

        let directory = client.list_aliases().await.unwrap();
        assert_eq!(directory.records(), &[AliasRecord::new(1, "amy")]);
        assert_eq!(server.read_count(), 3);
    }

    #[tokio::test]
    async fn test_enroll_is_not_retried() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.inject_unavailable(1);
        let client = client_for(&server);

        let err = client.enroll(FingerprintId::new(1), "amy").await.unwrap_err();
        assert!(matches!(err, SdkError::Unavailable { status: 503, .. }));
        assert_eq!(server.enroll_count(), 1);
        assert!(server.aliases().is_empty());
    }

    #[tokio::test]
    async fn test_enroll_duplicate_surfaces_detail() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(2, "bob");
        let client = client_for(&server);

        let err = client.enroll(FingerprintId::new(2), "bob").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.detail(), Some("duplicate id"));
    }

    #[tokio::test]
    async fn test_enroll_rejects_invalid_input_locally() {
        let server = MockFingerprintServer::start().await.unwrap();
        let client = client_for(&server);

        let err = client.enroll(FingerprintId::new(0), "amy").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = client.enroll(FingerprintId::new(1), "  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(server.enroll_count(), 0);
    }

    #[tokio::test]
    async fn test_find_matches_unknown_alias_is_empty_with_notice() {
        let server = MockFingerprintServer::start().await.unwrap();
        let client = client_for(&server);

        let history = client.find_matches("nobody").await.unwrap();
        assert!(history.is_empty());
        assert!(history.notice.unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_find_matches_alias_with_reserved_characters() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(4, "r&d/lab");
        server.add_match(FingerprintId::new(4));
        let client = client_for(&server);

        let history = client.find_matches("r&d/lab").await.unwrap();
        assert_eq!(history.matches.len(), 1);
        assert_eq!(history.matches[0].fingerprint_id, FingerprintId::new(4));
    }

    #[tokio::test]
    async fn test_identify_default_is_no_match() {
        let server = MockFingerprintServer::start().await.unwrap();
        let client = client_for(&server);

        let err = client.identify().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatch);
        assert_eq!(err.detail(), Some("No match found"));
    }

    #[tokio::test]
    async fn test_identify_match_without_confidence_is_malformed() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.queue_identification(IdentifyOutcome::Raw {
            status: 200,
            body: serde_json::json!({"message": "Match found", "id": 5, "alias": "cara"}),
        });
        let client = client_for(&server);

        let err = client.identify().await.unwrap_err();
        assert!(matches!(err, SdkError::MalformedResponse { operation: "identify", .. }));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_identify_is_not_retried() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.inject_unavailable(1);
        let client = client_for(&server);

        assert!(client.identify().await.is_err());
        assert_eq!(server.identify_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_twice_yields_not_found() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(7, "gus");
        let client = client_for(&server);

        let message = client.delete_fingerprint(FingerprintId::new(7)).await.unwrap();
        assert!(message.contains('7'));

        let err = client.delete_fingerprint(FingerprintId::new(7)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.detail(), Some("Fingerprint 7 not found"));
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_transport() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.inject_delay(500);
        let config = ClientConfig::builder()
            .with_endpoint(server.endpoint())
            .with_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let client = PortalClient::new(config).unwrap();

        let err = client.identify().await.unwrap_err();
        assert!(matches!(err, SdkError::Timeout { duration_ms: 100 }), "got {err:?}");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let config = ClientConfig::builder()
            .with_endpoint("http://127.0.0.1:1")
            .with_retry_policy(RetryPolicy::no_retry())
            .with_connect_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let client = PortalClient::new(config).unwrap();

        let err = client.list_aliases().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!err.has_response());
    }

    #[tokio::test]
    async fn test_shutdown_fails_future_calls() {
        let server = MockFingerprintServer::start().await.unwrap();
        let client = client_for(&server);

        client.shutdown();
        assert!(client.is_shutdown());
        assert!(matches!(client.identify().await, Err(SdkError::Shutdown)));
        assert!(matches!(client.list_aliases().await, Err(SdkError::Shutdown)));
        assert_eq!(server.identify_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_call() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.inject_delay(5_000);
        let client = client_for(&server);

        let trigger = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.shutdown();
        });

        let err = client.list_aliases().await.unwrap_err();
        assert!(matches!(err, SdkError::Shutdown), "got {err:?}");
    }
}
