//! Revoking an enrolled identity by number.

use fingerprint_portal_sdk::{Backend, ErrorKind};
use fingerprint_portal_types::parse_fingerprint_id;
use snafu::Snafu;

use super::{FlowSettings, StatusLine, DELETE_FALLBACK, INVALID_ID_INPUT};

/// Why a revocation did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum RevocationFailure {
    /// The input is not a positive integer.
    #[snafu(display("{message}"))]
    InvalidInput {
        /// Text shown to the user.
        message: String,
    },

    /// The backend has no such identity.
    #[snafu(display("{message}"))]
    NotFound {
        /// Backend detail or fallback text.
        message: String,
    },

    /// Any other failure.
    #[snafu(display("{message}"))]
    BackendUnavailable {
        /// Backend detail or fallback text.
        message: String,
    },
}

impl RevocationFailure {
    /// Returns the text shown to the user.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput { message }
            | Self::NotFound { message }
            | Self::BackendUnavailable { message } => message,
        }
    }
}

/// The revocation view: an id input and the outcome of the last deletion.
#[derive(Debug)]
pub struct RevocationFlow<B> {
    backend: B,
    input: String,
    status: StatusLine,
}

impl<B> RevocationFlow<B> {
    /// Current input text.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the input text.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Confirmation or error of the last deletion.
    #[must_use]
    pub fn status(&self) -> &StatusLine {
        &self.status
    }
}

impl<B: Backend> RevocationFlow<B> {
    /// Creates the view with an empty input.
    pub fn new(backend: B, _settings: &FlowSettings) -> Self {
        Self { backend, input: String::new(), status: StatusLine::default() }
    }

    /// Deletes the identity named by the current input.
    ///
    /// The input must parse as a positive integer; otherwise nothing is sent.
    /// On success the input is cleared and the backend confirmation shown
    /// verbatim. On failure the input is kept for another attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`RevocationFailure`]; its message is also shown in
    /// [`Self::status`].
    pub async fn delete_identity(&mut self) -> Result<String, RevocationFailure> {
        self.status.clear();

        let id = match parse_fingerprint_id(&self.input) {
            Ok(id) => id,
            Err(err) => {
                tracing::debug!(input = %self.input, error = %err, "Rejected revocation input");
                self.status.fail(INVALID_ID_INPUT);
                return Err(RevocationFailure::InvalidInput { message: INVALID_ID_INPUT.into() });
            },
        };

        match self.backend.delete_fingerprint(id).await {
            Ok(message) => {
                tracing::info!(id = %id, "Revoked identity");
                self.input.clear();
                self.status.succeed(message.clone());
                Ok(message)
            },
            Err(err) => {
                let message = err.user_message(DELETE_FALLBACK);
                self.status.fail(message.clone());
                Err(match err.kind() {
                    ErrorKind::NotFound => RevocationFailure::NotFound { message },
                    _ => RevocationFailure::BackendUnavailable { message },
                })
            },
        }
    }
}
