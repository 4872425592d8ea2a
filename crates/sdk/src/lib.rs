//! Rust SDK for the fingerprint identity service.
//!
//! This SDK wraps the service's HTTP contract (enrollment, identification,
//! alias and match listing, revocation) behind the [`Backend`] trait, with
//! one request adapter that turns status codes and bodies into a closed set
//! of errors.
//!
//! # Features
//!
//! - **Typed results**: identifiers, records and identification results from
//!   `fingerprint-portal-types`
//! - **Error taxonomy**: [`SdkError::kind`] for flow decisions, backend
//!   `detail` text preserved verbatim
//! - **Resilience**: bounded timeouts, retry with backoff for idempotent reads
//! - **Cancellation**: [`PortalClient::shutdown`] fails in-flight and future calls
//! - **Mock backend**: [`mock::MockFingerprintServer`] for integration tests
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fingerprint_portal_sdk::{Backend, ClientConfig, PortalClient};
//!
//! #[tokio::main]
//! async fn main() -> fingerprint_portal_sdk::Result<()> {
//!     let config = ClientConfig::builder()
//!         .with_endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     let client = PortalClient::new(config)?;
//!
//!     let directory = client.list_aliases().await?;
//!     if let Some(id) = directory.next_id() {
//!         client.enroll(id, "amy").await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PortalClient (Backend trait)                │
//! │ .enroll() │ .list_aliases() │ .find_matches() │ .identify() │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   Request Adapter                           │
//! │   Status mapping │ Error body parsing │ Cancellation        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   Resilience Layer (backon)                 │
//! │   Retry for reads │ Exponential backoff │ Timeout           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   Connection Pool (reqwest)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod client;
mod config;
mod connection;
mod error;
pub mod mock;
mod retry;
mod wire;

// Public API exports
pub use backend::{Backend, MatchHistory};
pub use client::PortalClient;
pub use config::{
    validate_url, ClientConfig, ClientConfigBuilder, RetryPolicy, RetryPolicyBuilder,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use connection::ConnectionPool;
pub use error::{ErrorKind, Result, SdkError};
// Re-export commonly used types from fingerprint-portal-types
pub use fingerprint_portal_types::{
    AliasDirectory, AliasRecord, EncodedImage, FingerprintId, IdentificationResult, MatchId,
    MatchRecord, MatchedIdentity, Timestamp,
};
pub use retry::{with_retry, with_retry_cancellable};
