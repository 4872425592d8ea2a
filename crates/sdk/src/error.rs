//! SDK error types with recovery context.
//!
//! Every backend call resolves to either a value or one [`SdkError`]. The
//! request adapter in [`crate::client`] is the only place that looks at HTTP
//! status codes and bodies; callers branch on [`SdkError::kind`] instead.
//!
//! Errors are grouped in three tiers:
//! - **Local errors**: validation and configuration, raised before any I/O
//! - **Backend errors**: the server answered and refused (not found, conflict, no match)
//! - **Transport errors**: the server could not be reached or answered garbage

use fingerprint_portal_types::ValidationError;
use snafu::{Location, Snafu};

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Closed set of failure categories the flows act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed client input or configuration, caught before any network call.
    Validation,
    /// The backend reports absence (unknown alias, unknown id).
    NotFound,
    /// The identity number is already enrolled.
    Conflict,
    /// Identification ran but nothing passed the backend's own threshold.
    NoMatch,
    /// The backend could not drive the fingerprint sensor.
    NoHardware,
    /// The backend refused the request for another reason.
    Rejected,
    /// The backend is unreachable, timed out, or answered with a malformed body.
    Transport,
}

/// SDK error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SdkError {
    /// Client-side input validation failed.
    #[snafu(display("Invalid input: {source}"))]
    Validation {
        /// The violated constraint.
        source: ValidationError,
    },

    /// The backend reported the requested record as absent.
    #[snafu(display("Not found (status {status}){}", fmt_detail(detail)))]
    NotFound {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend.
        detail: Option<String>,
    },

    /// The backend rejected a duplicate identity number.
    #[snafu(display("Conflict (status {status}){}", fmt_detail(detail)))]
    Conflict {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend.
        detail: Option<String>,
    },

    /// Identification found no enrolled fingerprint.
    #[snafu(display("No match (status {status}){}", fmt_detail(detail)))]
    NoMatch {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend.
        detail: Option<String>,
    },

    /// The backend's fingerprint sensor failed.
    #[snafu(display("Sensor failure (status {status}){}", fmt_detail(detail)))]
    NoHardware {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend.
        detail: Option<String>,
    },

    /// The backend refused the request.
    #[snafu(display("Request rejected (status {status}){}", fmt_detail(detail)))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend.
        detail: Option<String>,
    },

    /// The backend answered with a server-side failure.
    #[snafu(display("Backend unavailable (status {status}){}", fmt_detail(detail)))]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend.
        detail: Option<String>,
    },

    /// Failed to reach the backend.
    #[snafu(display("Connection error at {location}: {source}"))]
    Connection {
        /// Underlying HTTP client error.
        source: reqwest::Error,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// Operation timed out.
    #[snafu(display("Operation timed out after {duration_ms}ms"))]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// The backend answered with a body that does not match the contract.
    #[snafu(display("Malformed response from {operation}: {message}"))]
    MalformedResponse {
        /// Operation whose response was malformed.
        operation: &'static str,
        /// Description of the mismatch.
        message: String,
    },

    /// Retry attempts exhausted.
    #[snafu(display("Retry exhausted after {attempts} attempts: {source}"))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error before giving up.
        source: Box<SdkError>,
    },

    /// Configuration validation error.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// URL parsing error.
    #[snafu(display("Invalid URL '{url}': {message}"))]
    InvalidUrl {
        /// The invalid URL.
        url: String,
        /// Parse error description.
        message: String,
    },

    /// The operation was cancelled.
    #[snafu(display("Operation cancelled"))]
    Cancelled,

    /// Client is shutting down.
    #[snafu(display("Client shutting down"))]
    Shutdown,
}

fn fmt_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl SdkError {
    /// Classifies the error into the category flows act on.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Config { .. } | Self::InvalidUrl { .. } => {
                ErrorKind::Validation
            },
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NoMatch { .. } => ErrorKind::NoMatch,
            Self::NoHardware { .. } => ErrorKind::NoHardware,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::RetryExhausted { source, .. } => source.kind(),
            Self::Unavailable { .. }
            | Self::Connection { .. }
            | Self::Timeout { .. }
            | Self::MalformedResponse { .. }
            | Self::Cancelled
            | Self::Shutdown => ErrorKind::Transport,
        }
    }

    /// Returns true if the error is transient and the operation should be retried.
    ///
    /// Retryable errors:
    /// - `Unavailable`: 5xx answer from a gateway or an overloaded backend
    /// - `Connection`: network failure before a response arrived
    /// - `Timeout`: the request deadline elapsed
    ///
    /// Everything the backend deliberately answered (not found, conflict, no
    /// match) and every local error is final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable { .. } | Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Validation { .. }
            | Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::NoMatch { .. }
            | Self::NoHardware { .. }
            | Self::Rejected { .. }
            | Self::MalformedResponse { .. }
            | Self::RetryExhausted { .. }
            | Self::Config { .. }
            | Self::InvalidUrl { .. }
            | Self::Cancelled
            | Self::Shutdown => false,
        }
    }

    /// Returns the backend's `detail` text, if the backend sent one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::NotFound { detail, .. }
            | Self::Conflict { detail, .. }
            | Self::NoMatch { detail, .. }
            | Self::NoHardware { detail, .. }
            | Self::Rejected { detail, .. }
            | Self::Unavailable { detail, .. } => detail.as_deref(),
            Self::RetryExhausted { source, .. } => source.detail(),
            _ => None,
        }
    }

    /// Returns the HTTP status if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { status, .. }
            | Self::Conflict { status, .. }
            | Self::NoMatch { status, .. }
            | Self::NoHardware { status, .. }
            | Self::Rejected { status, .. }
            | Self::Unavailable { status, .. } => Some(*status),
            Self::RetryExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true if a response was received from the backend.
    ///
    /// Distinguishes "the backend said no" from "the backend never answered".
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.status().is_some() || matches!(self, Self::MalformedResponse { .. })
    }

    /// Returns the text to show a user.
    ///
    /// Local validation errors describe the violated constraint. Everything
    /// else shows the backend's detail verbatim when present and `fallback`
    /// otherwise.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation { source } => source.to_string(),
            Self::Config { .. } | Self::InvalidUrl { .. } => self.to_string(),
            _ => self.detail().map_or_else(|| fallback.to_string(), str::to_string),
        }
    }
}

impl From<ValidationError> for SdkError {
    fn from(source: ValidationError) -> Self {
        Self::Validation { source }
    }
}
