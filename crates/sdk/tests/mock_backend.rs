//! Integration tests for the SDK against the in-process mock backend.
//!
//! Exercises the public API only, over real HTTP on localhost.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use fingerprint_portal_sdk::{
    mock::{IdentifyOutcome, MockFingerprintServer},
    Backend, ClientConfig, EncodedImage, ErrorKind, FingerprintId, PortalClient, RetryPolicy,
    SdkError,
};
use fingerprint_portal_test_utils::assert_eventually_async;

fn client_for(server: &MockFingerprintServer) -> PortalClient {
    let config = ClientConfig::builder()
        .with_endpoint(server.endpoint())
        .with_timeout(Duration::from_secs(2))
        .with_retry_policy(
            RetryPolicy::builder()
                .max_attempts(3)
                .initial_backoff(Duration::from_millis(5))
                .jitter(false)
                .build(),
        )
        .build()
        .expect("valid config");
    PortalClient::new(config).expect("client creation")
}

#[tokio::test]
async fn test_full_lifecycle() {
    let server = MockFingerprintServer::start().await.unwrap();
    let client = client_for(&server);

    // Empty directory proposes the first id.
    let first = client.list_aliases().await.unwrap().next_id().unwrap();
    assert_eq!(first, FingerprintId::FIRST);

    client.enroll(first, "amy").await.unwrap();
    let second = client.list_aliases().await.unwrap().next_id().unwrap();
    assert_eq!(second, FingerprintId::new(2));
    client.enroll(second, "bob").await.unwrap();

    server.queue_identification(IdentifyOutcome::matched(2, 0.87));
    let result = client.identify().await.unwrap();
    let matched = result.matched.unwrap();
    assert_eq!(matched.id, second);
    assert_eq!(matched.alias, "bob");

    let history = client.find_matches("bob").await.unwrap();
    assert_eq!(history.matches.len(), 1);
    assert!(history.notice.is_none());

    client.delete_fingerprint(second).await.unwrap();
    let directory = client.list_aliases().await.unwrap();
    assert!(!directory.contains(second));
    assert_eq!(directory.len(), 1);
}

#[tokio::test]
async fn test_identify_with_images_round_trips_bytes() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(5, "cara");
    let scanned = b"\x89PNG\r\n\x1a\nscanned".to_vec();
    let enrolled = [0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3].to_vec();
    server.queue_identification(
        IdentifyOutcome::matched(5, 0.92)
            .with_images(EncodedImage::from_bytes(&scanned), EncodedImage::from_bytes(&enrolled)),
    );
    let client = client_for(&server);

    let result = client.identify().await.unwrap();
    assert_eq!(result.scanned_image.unwrap().decode().unwrap(), scanned);
    assert_eq!(result.matched_image.unwrap().decode().unwrap(), enrolled);
}

#[tokio::test]
async fn test_sensor_failure_is_no_hardware() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.queue_identification(IdentifyOutcome::SensorFailure("Sensor not connected".into()));
    let client = client_for(&server);

    let err = client.identify().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoHardware);
    assert_eq!(err.user_message("Failed to match fingerprint."), "Sensor not connected");
}

#[tokio::test]
async fn test_read_retries_exhausted() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.inject_unavailable(10);
    let client = client_for(&server);

    let err = client.find_matches("amy").await.unwrap_err();
    assert!(matches!(err, SdkError::RetryExhausted { attempts: 3, .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(server.read_count(), 3);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_client() {
    let server = MockFingerprintServer::start().await.unwrap();
    server.add_alias(1, "amy");
    let client = client_for(&server);

    let (aliases, history) = tokio::join!(client.list_aliases(), client.find_matches("amy"));
    assert_eq!(aliases.unwrap().len(), 1);
    assert!(history.unwrap().is_empty());
    assert!(client.pool().is_initialized());
}

#[tokio::test]
async fn test_shutdown_server_makes_calls_fail_with_transport() {
    let server = MockFingerprintServer::start().await.unwrap();
    let endpoint = server.endpoint().to_string();
    server.shutdown();

    let config = ClientConfig::builder()
        .with_endpoint(endpoint)
        .with_retry_policy(RetryPolicy::no_retry())
        .build()
        .unwrap();
    let client = PortalClient::new(config).unwrap();

    let client = &client;
    let failed = assert_eventually_async(Duration::from_secs(2), || async move {
        matches!(client.identify().await, Err(e) if e.kind() == ErrorKind::Transport)
    })
    .await;
    assert!(failed, "identify should fail with a transport error once the server is gone");
}
