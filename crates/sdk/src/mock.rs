//! Mock HTTP backend for SDK and console integration testing.
//!
//! This module provides a controllable in-process implementation of the
//! fingerprint service for testing without real hardware.
//!
//! # Features
//!
//! - **Directory state**: Ordered alias records and match history
//! - **Scripted identification**: Queue the outcome of each `POST /match`
//! - **Failure injection**: Inject 503 answers, delays, a concurrent enrollment
//!   or a scripted enrollment rejection
//! - **Request counting**: Track requests per operation for verification
//!
//! # Example
//!
//! ```no_run
//! use fingerprint_portal_sdk::mock::{IdentifyOutcome, MockFingerprintServer};
//! use fingerprint_portal_sdk::{Backend, PortalClient};
//!
//! #[tokio::test]
//! async fn test_identify() {
//!     let server = MockFingerprintServer::start().await.unwrap();
//!     server.add_alias(5, "cara");
//!     server.queue_identification(IdentifyOutcome::matched(5, 0.92));
//!
//!     let client = PortalClient::connect(server.endpoint()).unwrap();
//!     let result = client.identify().await.unwrap();
//!     assert_eq!(result.matched.unwrap().alias, "cara");
//! }
//! ```

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use fingerprint_portal_types::{
    AliasRecord, EncodedImage, FingerprintId, MatchId, MatchRecord, Timestamp,
};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::{
    error::SdkError,
    wire::{
        AliasesResponse, Detail, DetailItem, EnrollRequest, ErrorBody, IdentifyResponse,
        MatchesResponse, MessageResponse,
    },
};

/// How `GET /aliases` answers when nothing is enrolled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyDirectoryMode {
    /// `404 { "detail": "No aliases found" }`.
    #[default]
    NotFound,
    /// `200 { "aliases": [] }`.
    EmptyList,
}

/// Scripted answer for one `POST /match`.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyOutcome {
    /// Report a match against an enrolled identity.
    ///
    /// If `id` is not enrolled when the request arrives, the server answers
    /// as for [`IdentifyOutcome::NoMatch`].
    Match {
        /// Identity to report.
        id: FingerprintId,
        /// Score to report.
        confidence: f64,
        /// Image of the capture.
        scanned_image: Option<EncodedImage>,
        /// Image of the enrolled fingerprint.
        matched_image: Option<EncodedImage>,
    },
    /// `404 { "detail": "No match found" }`.
    NoMatch,
    /// `500 { "detail": <message> }`.
    SensorFailure(String),
    /// Any status and body, sent verbatim.
    Raw {
        /// HTTP status code.
        status: u16,
        /// JSON body.
        body: serde_json::Value,
    },
}

impl IdentifyOutcome {
    /// A match without images.
    pub fn matched(id: impl Into<FingerprintId>, confidence: f64) -> Self {
        Self::Match { id: id.into(), confidence, scanned_image: None, matched_image: None }
    }

    /// Attaches images to a [`IdentifyOutcome::Match`]; other outcomes are
    /// returned unchanged.
    #[must_use]
    pub fn with_images(self, scanned: EncodedImage, matched: EncodedImage) -> Self {
        match self {
            Self::Match { id, confidence, .. } => Self::Match {
                id,
                confidence,
                scanned_image: Some(scanned),
                matched_image: Some(matched),
            },
            other => other,
        }
    }
}

/// Shared state for the mock server.
#[derive(Debug, Default)]
struct MockState {
    /// Enrolled identities in insertion order.
    aliases: RwLock<Vec<AliasRecord>>,

    /// Identification history.
    matches: RwLock<Vec<MatchRecord>>,

    /// Outcomes for upcoming `POST /match` requests.
    identifications: RwLock<VecDeque<IdentifyOutcome>>,

    empty_mode: RwLock<EmptyDirectoryMode>,

    /// Record inserted right before the next enrollment is processed.
    concurrent_enrollment: RwLock<Option<AliasRecord>>,

    /// Detail of the `400` answer to a duplicate id, if not the stock one.
    duplicate_detail: RwLock<Option<String>>,

    /// Error answer for the next enrollment, ahead of any validation.
    enroll_rejection: RwLock<Option<(StatusCode, String)>>,

    /// Last assigned match id.
    last_match_id: AtomicI64,

    /// Number of 503 answers to inject for next requests
    unavailable_count: AtomicUsize,

    /// Delay to inject for each request (milliseconds)
    delay_ms: AtomicU64,

    enroll_count: AtomicUsize,
    read_count: AtomicUsize,
    identify_count: AtomicUsize,
    delete_count: AtomicUsize,
}

impl MockState {
    /// Checks if we should inject an unavailable error, decrementing counter if so.
    fn should_inject_unavailable(&self) -> bool {
        loop {
            let current = self.unavailable_count.load(Ordering::SeqCst);
            if current == 0 {
                return false;
            }
            if self
                .unavailable_count
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    async fn maybe_delay(&self) {
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// Applies configured delay and returns an injected error, if any.
    async fn check_injection(&self) -> Option<Response> {
        self.maybe_delay().await;
        if self.should_inject_unavailable() {
            return Some(error(StatusCode::SERVICE_UNAVAILABLE, "Injected error"));
        }
        None
    }

    fn record_match(&self, fingerprint_id: FingerprintId, timestamp: Timestamp) -> MatchId {
        let match_id = MatchId::new(self.last_match_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.matches.write().push(MatchRecord { fingerprint_id, match_id, timestamp });
        match_id
    }
}

/// Mock implementation of the fingerprint service.
///
/// Serves the HTTP contract on an ephemeral localhost port. The server stops
/// when the handle is dropped or [`shutdown`](Self::shutdown) is called.
pub struct MockFingerprintServer {
    state: Arc<MockState>,
    endpoint: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockFingerprintServer {
    /// Starts a new mock server on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Config` if binding fails.
    pub async fn start() -> crate::Result<Self> {
        Self::start_on_port(0).await
    }

    /// Starts a new mock server on a specific port.
    ///
    /// Use port 0 to let the OS assign an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Config` if binding to the specified port fails.
    pub async fn start_on_port(port: u16) -> crate::Result<Self> {
        let state = Arc::new(MockState::default());

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| SdkError::Config { message: format!("Failed to bind {addr}: {e}") })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SdkError::Config { message: format!("Failed to get local addr: {e}") })?;

        let endpoint = format!("http://{local_addr}");

        let app = Router::new()
            .route("/enroll", post(enroll))
            .route("/aliases", get(list_aliases))
            .route("/matches/:alias", get(find_matches))
            .route("/match", post(identify))
            .route("/fingerprint/:id", delete(delete_fingerprint))
            .with_state(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!("Mock server error: {}", e);
            }
        });

        Ok(Self { state, endpoint, shutdown_tx: Some(shutdown_tx) })
    }

    /// Returns the base URL (e.g., `http://127.0.0.1:41234`).
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Enrolls an identity directly, bypassing the HTTP surface.
    pub fn add_alias(&self, id: impl Into<FingerprintId>, alias: impl Into<String>) {
        self.state.aliases.write().push(AliasRecord::new(id, alias));
    }

    /// Returns the enrolled identities in insertion order.
    #[must_use]
    pub fn aliases(&self) -> Vec<AliasRecord> {
        self.state.aliases.read().clone()
    }

    /// Records an identification of `fingerprint_id` happening now.
    pub fn add_match(&self, fingerprint_id: FingerprintId) -> MatchId {
        self.state.record_match(fingerprint_id, Timestamp::new(Utc::now()))
    }

    /// Records an identification at a given time.
    pub fn add_match_at(&self, fingerprint_id: FingerprintId, timestamp: Timestamp) -> MatchId {
        self.state.record_match(fingerprint_id, timestamp)
    }

    /// Returns the full identification history.
    #[must_use]
    pub fn matches(&self) -> Vec<MatchRecord> {
        self.state.matches.read().clone()
    }

    /// Queues the answer for an upcoming `POST /match`.
    ///
    /// Outcomes are consumed in order; with an empty queue the server answers
    /// as for [`IdentifyOutcome::NoMatch`].
    pub fn queue_identification(&self, outcome: IdentifyOutcome) {
        self.state.identifications.write().push_back(outcome);
    }

    /// Selects how an empty directory is reported.
    pub fn set_empty_directory_mode(&self, mode: EmptyDirectoryMode) {
        *self.state.empty_mode.write() = mode;
    }

    /// Injects 503 answers for the next `count` requests.
    pub fn inject_unavailable(&self, count: usize) {
        self.state.unavailable_count.store(count, Ordering::SeqCst);
    }

    /// Injects a delay for all subsequent requests.
    ///
    /// Sets to 0 to disable delay.
    pub fn inject_delay(&self, millis: u64) {
        self.state.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Simulates another client enrolling `alias` under `id` just before the
    /// next `POST /enroll` is processed.
    pub fn inject_concurrent_enrollment(
        &self,
        id: impl Into<FingerprintId>,
        alias: impl Into<String>,
    ) {
        *self.state.concurrent_enrollment.write() = Some(AliasRecord::new(id, alias));
    }

    /// Words the `400` answer to a duplicate id with `detail` instead of
    /// `duplicate id`.
    pub fn set_duplicate_detail(&self, detail: impl Into<String>) {
        *self.state.duplicate_detail.write() = Some(detail.into());
    }

    /// Answers the next `POST /enroll` with `status` and `detail` without
    /// looking at the request. Unknown status codes become `400`.
    pub fn reject_next_enrollment(&self, status: u16, detail: impl Into<String>) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        *self.state.enroll_rejection.write() = Some((status, detail.into()));
    }

    /// Returns the number of `POST /enroll` requests received.
    pub fn enroll_count(&self) -> usize {
        self.state.enroll_count.load(Ordering::SeqCst)
    }

    /// Returns the number of `GET /aliases` and `GET /matches/{alias}` requests received.
    pub fn read_count(&self) -> usize {
        self.state.read_count.load(Ordering::SeqCst)
    }

    /// Returns the number of `POST /match` requests received.
    pub fn identify_count(&self) -> usize {
        self.state.identify_count.load(Ordering::SeqCst)
    }

    /// Returns the number of `DELETE /fingerprint/{id}` requests received.
    pub fn delete_count(&self) -> usize {
        self.state.delete_count.load(Ordering::SeqCst)
    }

    /// Clears all state, scripted outcomes, injections and counters.
    pub fn reset(&self) {
        self.state.aliases.write().clear();
        self.state.matches.write().clear();
        self.state.identifications.write().clear();
        *self.state.empty_mode.write() = EmptyDirectoryMode::default();
        *self.state.concurrent_enrollment.write() = None;
        *self.state.duplicate_detail.write() = None;
        *self.state.enroll_rejection.write() = None;
        self.state.last_match_id.store(0, Ordering::SeqCst);
        self.state.unavailable_count.store(0, Ordering::SeqCst);
        self.state.delay_ms.store(0, Ordering::SeqCst);
        self.state.enroll_count.store(0, Ordering::SeqCst);
        self.state.read_count.store(0, Ordering::SeqCst);
        self.state.identify_count.store(0, Ordering::SeqCst);
        self.state.delete_count.store(0, Ordering::SeqCst);
    }

    /// Shuts down the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockFingerprintServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

type SharedState = State<Arc<MockState>>;

fn reply<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, Json(body)).into_response()
}

fn error(status: StatusCode, detail: impl Into<String>) -> Response {
    reply(status, &ErrorBody::text(detail))
}

/// A request-validation failure in list form, as FastAPI reports it.
fn unprocessable(msg: impl Into<String>) -> Response {
    let body = ErrorBody { detail: Some(Detail::Items(vec![DetailItem { msg: msg.into() }])) };
    reply(StatusCode::UNPROCESSABLE_ENTITY, &body)
}

async fn enroll(State(state): SharedState, body: Bytes) -> Response {
    state.enroll_count.fetch_add(1, Ordering::SeqCst);
    if let Some(injected) = state.check_injection().await {
        return injected;
    }
    let rejection = state.enroll_rejection.write().take();
    if let Some((status, detail)) = rejection {
        return error(status, detail);
    }

    let request: EnrollRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return unprocessable(e.to_string()),
    };
    if !request.id.is_valid() {
        return unprocessable("id must be a positive integer");
    }
    if request.alias.trim().is_empty() {
        return unprocessable("alias must not be empty");
    }

    let mut aliases = state.aliases.write();
    if let Some(record) = state.concurrent_enrollment.write().take() {
        aliases.push(record);
    }
    if aliases.iter().any(|r| r.id == request.id) {
        let detail =
            state.duplicate_detail.read().clone().unwrap_or_else(|| "duplicate id".to_string());
        return error(StatusCode::BAD_REQUEST, detail);
    }

    let message = format!("Fingerprint {} registered as {}", request.id, request.alias);
    aliases.push(AliasRecord::new(request.id, request.alias));
    reply(StatusCode::OK, &MessageResponse { message })
}

async fn list_aliases(State(state): SharedState) -> Response {
    state.read_count.fetch_add(1, Ordering::SeqCst);
    if let Some(injected) = state.check_injection().await {
        return injected;
    }

    let aliases = state.aliases.read().clone();
    if aliases.is_empty() && *state.empty_mode.read() == EmptyDirectoryMode::NotFound {
        return error(StatusCode::NOT_FOUND, "No aliases found");
    }
    reply(StatusCode::OK, &AliasesResponse { aliases })
}

async fn find_matches(State(state): SharedState, Path(alias): Path<String>) -> Response {
    state.read_count.fetch_add(1, Ordering::SeqCst);
    if let Some(injected) = state.check_injection().await {
        return injected;
    }

    let ids: Vec<FingerprintId> =
        state.aliases.read().iter().filter(|r| r.alias == alias).map(|r| r.id).collect();
    if ids.is_empty() {
        return error(StatusCode::NOT_FOUND, format!("Alias {alias} not found"));
    }

    let matches = state
        .matches
        .read()
        .iter()
        .filter(|m| ids.contains(&m.fingerprint_id))
        .cloned()
        .collect();
    reply(StatusCode::OK, &MatchesResponse { matches })
}

async fn identify(State(state): SharedState) -> Response {
    state.identify_count.fetch_add(1, Ordering::SeqCst);
    if let Some(injected) = state.check_injection().await {
        return injected;
    }

    let outcome = state.identifications.write().pop_front().unwrap_or(IdentifyOutcome::NoMatch);
    match outcome {
        IdentifyOutcome::Match { id, confidence, scanned_image, matched_image } => {
            let alias = state.aliases.read().iter().find(|r| r.id == id).map(|r| r.alias.clone());
            let Some(alias) = alias else {
                return error(StatusCode::NOT_FOUND, "No match found");
            };
            state.record_match(id, Timestamp::new(Utc::now()));
            reply(
                StatusCode::OK,
                &IdentifyResponse {
                    message: "Match found".to_string(),
                    id: Some(id),
                    alias: Some(alias),
                    confidence: Some(confidence),
                    scanned_img_str: scanned_image.map(|i| i.as_str().to_string()),
                    matched_img_str: matched_image.map(|i| i.as_str().to_string()),
                },
            )
        },
        IdentifyOutcome::NoMatch => error(StatusCode::NOT_FOUND, "No match found"),
        IdentifyOutcome::SensorFailure(detail) => error(StatusCode::INTERNAL_SERVER_ERROR, detail),
        IdentifyOutcome::Raw { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            reply(status, &body)
        },
    }
}

async fn delete_fingerprint(State(state): SharedState, Path(id): Path<String>) -> Response {
    state.delete_count.fetch_add(1, Ordering::SeqCst);
    if let Some(injected) = state.check_injection().await {
        return injected;
    }

    let Ok(id) = id.parse::<i64>().map(FingerprintId::new) else {
        return unprocessable(format!("{id:?} is not an integer"));
    };

    let mut aliases = state.aliases.write();
    let before = aliases.len();
    aliases.retain(|r| r.id != id);
    if aliases.len() == before {
        return error(StatusCode::NOT_FOUND, format!("Fingerprint {id} not found"));
    }
    reply(StatusCode::OK, &MessageResponse { message: format!("Fingerprint {id} deleted successfully") })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn get(server: &MockFingerprintServer, path: &str) -> (u16, serde_json::Value) {
        let response = reqwest::get(format!("{}{path}", server.endpoint())).await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_empty_directory_modes() {
        let server = MockFingerprintServer::start().await.unwrap();

        let (status, body) = get(&server, "/aliases").await;
        assert_eq!(status, 404);
        assert_eq!(body["detail"], "No aliases found");

        server.set_empty_directory_mode(EmptyDirectoryMode::EmptyList);
        let (status, body) = get(&server, "/aliases").await;
        assert_eq!(status, 200);
        assert_eq!(body["aliases"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_enroll_validation_uses_list_detail() {
        let server = MockFingerprintServer::start().await.unwrap();
        let response = reqwest::Client::new()
            .post(format!("{}/enroll", server.endpoint()))
            .json(&serde_json::json!({"id": 1, "alias": " "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 422);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["detail"][0]["msg"], "alias must not be empty");
    }

    #[tokio::test]
    async fn test_concurrent_enrollment_applied_once() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.inject_concurrent_enrollment(1, "other");

        let client = reqwest::Client::new();
        let url = format!("{}/enroll", server.endpoint());
        let first = client
            .post(&url)
            .json(&serde_json::json!({"id": 1, "alias": "amy"}))
            .send()
            .await
            .unwrap();
        assert_eq!(first.status().as_u16(), 400);

        let second = client
            .post(&url)
            .json(&serde_json::json!({"id": 2, "alias": "amy"}))
            .send()
            .await
            .unwrap();
        assert_eq!(second.status().as_u16(), 200);
        assert_eq!(server.aliases(), vec![AliasRecord::new(1, "other"), AliasRecord::new(2, "amy")]);
    }

    #[tokio::test]
    async fn test_scripted_enrollment_answers() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(1, "amy");
        server.set_duplicate_detail("Fingerprint ID 1 is already registered");
        server.reject_next_enrollment(400, "sensor busy");

        let client = reqwest::Client::new();
        let url = format!("{}/enroll", server.endpoint());
        let send = |id: i64| {
            client.post(&url).json(&serde_json::json!({"id": id, "alias": "bob"})).send()
        };

        let body: serde_json::Value = send(2).await.unwrap().json().await.unwrap();
        assert_eq!(body["detail"], "sensor busy");
        let body: serde_json::Value = send(1).await.unwrap().json().await.unwrap();
        assert_eq!(body["detail"], "Fingerprint ID 1 is already registered");
        assert_eq!(send(2).await.unwrap().status().as_u16(), 200);
        assert_eq!(server.enroll_count(), 3);
    }

    #[tokio::test]
    async fn test_identify_records_history() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(5, "cara");
        server.queue_identification(IdentifyOutcome::matched(5, 0.92));

        let response =
            reqwest::Client::new().post(format!("{}/match", server.endpoint())).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(server.matches().len(), 1);
        assert_eq!(server.matches()[0].match_id, MatchId::new(1));

        let (status, body) = get(&server, "/matches/cara").await;
        assert_eq!(status, 200);
        assert_eq!(body["matches"][0]["fingerprint_id"], 5);
    }

    #[tokio::test]
    async fn test_inject_unavailable_counts_down() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.set_empty_directory_mode(EmptyDirectoryMode::EmptyList);
        server.inject_unavailable(1);

        assert_eq!(get(&server, "/aliases").await.0, 503);
        assert_eq!(get(&server, "/aliases").await.0, 200);
        assert_eq!(server.read_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let server = MockFingerprintServer::start().await.unwrap();
        server.add_alias(1, "amy");
        server.add_match(FingerprintId::new(1));
        server.inject_unavailable(3);
        server.reset();

        assert!(server.aliases().is_empty());
        assert!(server.matches().is_empty());
        assert_eq!(get(&server, "/aliases").await.0, 404);
    }
}
