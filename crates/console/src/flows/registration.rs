//! Identity allocation and enrollment.
//!
//! The next identity number is derived from the current alias set every time
//! it is needed: `1` for an empty directory, `max(ids) + 1` otherwise. A
//! proposal is not a reservation. Once an enrollment succeeds the proposal
//! turns [`ProposalState::Stale`] and has to be loaded again.

use fingerprint_portal_sdk::{Backend, ErrorKind, SdkError};
use fingerprint_portal_types::{
    validate_alias, validate_fingerprint_id, FingerprintId, ValidationConfig, ValidationError,
};
use snafu::Snafu;

use super::{FlowSettings, StatusLine, ALIASES_FALLBACK, GENERIC_FALLBACK};
use crate::{
    config::{EnrollGuard, RegistrationSettings},
    ticket::{RequestTicket, TicketCounter},
};

/// Shown when an id is already present in the alias set, and for a
/// conflict the backend did not explain.
pub const DUPLICATE_ID: &str = "duplicate id";

/// Lifecycle of the proposed identity number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalState {
    /// Nothing loaded yet.
    Idle,
    /// The alias set is being fetched.
    Loading,
    /// The next unused id, as of the last fetch.
    Ready(FingerprintId),
    /// The alias set could not be fetched. Enrollment can still proceed
    /// with a manually supplied id.
    Failed(String),
    /// An enrollment succeeded since the last fetch.
    Stale,
}

impl ProposalState {
    /// Returns the proposed id if one is ready.
    #[must_use]
    pub fn ready_id(&self) -> Option<FingerprintId> {
        match self {
            Self::Ready(id) => Some(*id),
            _ => None,
        }
    }
}

/// A successful enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    /// Enrolled identity number.
    pub id: FingerprintId,
    /// Enrolled alias.
    pub alias: String,
    /// Backend confirmation.
    pub message: String,
}

/// Why an enrollment did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum EnrollmentFailure {
    /// The id is already enrolled.
    #[snafu(display("{message}"))]
    DuplicateId {
        /// The rejected id.
        id: FingerprintId,
        /// Backend detail, or the local explanation.
        message: String,
    },

    /// The alias was rejected, locally or by the backend.
    #[snafu(display("{message}"))]
    InvalidAlias {
        /// The violated constraint or backend detail.
        message: String,
    },

    /// No usable id was supplied and none could be proposed.
    #[snafu(display("{message}"))]
    InvalidId {
        /// What is wrong with the id.
        message: String,
    },

    /// The backend could not be reached or did not answer in time.
    #[snafu(display("{message}"))]
    BackendUnavailable {
        /// Backend detail or fallback text.
        message: String,
    },
}

impl EnrollmentFailure {
    fn from_sdk(id: FingerprintId, err: &SdkError) -> Self {
        match err.kind() {
            ErrorKind::Conflict => Self::DuplicateId { id, message: err.user_message(DUPLICATE_ID) },
            ErrorKind::Validation | ErrorKind::Rejected => {
                Self::InvalidAlias { message: err.user_message(GENERIC_FALLBACK) }
            },
            ErrorKind::NotFound
            | ErrorKind::NoMatch
            | ErrorKind::NoHardware
            | ErrorKind::Transport => {
                Self::BackendUnavailable { message: err.user_message(GENERIC_FALLBACK) }
            },
        }
    }

    /// Returns the text shown to the user.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::DuplicateId { message, .. }
            | Self::InvalidAlias { message }
            | Self::InvalidId { message }
            | Self::BackendUnavailable { message } => message,
        }
    }
}

/// The registration view: proposal, enrollment and its outcome.
#[derive(Debug)]
pub struct RegistrationFlow<B> {
    backend: B,
    validation: ValidationConfig,
    settings: RegistrationSettings,
    proposal: ProposalState,
    proposal_tickets: TicketCounter,
    status: StatusLine,
}

impl<B> RegistrationFlow<B> {
    /// Current proposal.
    #[must_use]
    pub fn proposal(&self) -> &ProposalState {
        &self.proposal
    }

    /// Confirmation or error of the last enrollment.
    #[must_use]
    pub fn status(&self) -> &StatusLine {
        &self.status
    }
}

impl<B: Backend> RegistrationFlow<B> {
    /// Creates the flow in [`ProposalState::Idle`].
    pub fn new(backend: B, settings: &FlowSettings) -> Self {
        Self {
            backend,
            validation: settings.validation.clone(),
            settings: settings.registration.clone(),
            proposal: ProposalState::Idle,
            proposal_tickets: TicketCounter::new(),
            status: StatusLine::default(),
        }
    }

    /// Fetches the alias set and derives the next unused id.
    ///
    /// An empty directory proposes [`FingerprintId::FIRST`].
    ///
    /// # Errors
    ///
    /// Returns the backend error if the alias set cannot be fetched, or a
    /// validation error if the id space is exhausted.
    pub async fn propose_next_id(&self) -> Result<FingerprintId, SdkError> {
        let directory = self.backend.list_aliases().await?;
        let id = directory.next_id().ok_or_else(|| ValidationError {
            field: "fingerprint_id".to_string(),
            constraint: "identity numbers exhausted".to_string(),
        })?;
        tracing::debug!(known = directory.len(), proposed = %id, "Proposed next identity");
        Ok(id)
    }

    /// Marks the proposal as loading and returns the ticket of the fetch.
    pub fn begin_load(&mut self) -> RequestTicket {
        self.proposal = ProposalState::Loading;
        self.proposal_tickets.issue()
    }

    /// Applies a finished proposal fetch. Stale fetches are ignored.
    ///
    /// Returns `true` if the result was applied.
    pub fn finish_load(
        &mut self,
        ticket: RequestTicket,
        result: Result<FingerprintId, SdkError>,
    ) -> bool {
        if !self.proposal_tickets.accept(ticket, "proposal") {
            return false;
        }
        self.proposal = match result {
            Ok(id) => ProposalState::Ready(id),
            Err(err) => {
                tracing::warn!(error = %err, "Could not propose an identity number");
                ProposalState::Failed(err.user_message(ALIASES_FALLBACK))
            },
        };
        true
    }

    /// Loads a fresh proposal.
    pub async fn load(&mut self) -> &ProposalState {
        let ticket = self.begin_load();
        let result = self.propose_next_id().await;
        self.finish_load(ticket, result);
        &self.proposal
    }

    /// Enrolls `alias` under `id`, or under the ready proposal when `id` is
    /// `None`.
    ///
    /// The alias and id are checked locally first. A conflict reported by the
    /// backend is shown with the backend's own detail. With the opt-in
    /// [`EnrollGuard::Verify`] the alias set is re-read and an id that is
    /// already taken is refused without contacting the enrollment endpoint.
    ///
    /// # Errors
    ///
    /// Returns an [`EnrollmentFailure`]; its message is also shown in
    /// [`Self::status`].
    pub async fn enroll(
        &mut self,
        id: Option<FingerprintId>,
        alias: &str,
    ) -> Result<Enrollment, EnrollmentFailure> {
        self.status.clear();
        let result = match id.or_else(|| self.proposal.ready_id()) {
            Some(id) => self.submit(id, alias, self.settings.guard == EnrollGuard::Verify).await,
            None => Err(EnrollmentFailure::InvalidId {
                message: "No identity number available; load a proposal or enter an id"
                    .to_string(),
            }),
        };
        self.record(result)
    }

    /// Proposes an id and enrolls `alias` under it, re-proposing after a
    /// conflict up to `max_conflict_retries` times.
    ///
    /// A conflict only counts when a fresh read lists the proposed id. A
    /// rejection of an id that is still free ends the loop as
    /// [`EnrollmentFailure::InvalidAlias`] with the backend's detail.
    ///
    /// # Errors
    ///
    /// Returns the last [`EnrollmentFailure`].
    pub async fn enroll_with_next_id(
        &mut self,
        alias: &str,
    ) -> Result<Enrollment, EnrollmentFailure> {
        self.status.clear();
        let mut conflicts = 0;
        let result = loop {
            let id = match self.propose_next_id().await {
                Ok(id) => id,
                Err(err) => break Err(EnrollmentFailure::from_sdk(FingerprintId::FIRST, &err)),
            };
            let failure = match self.submit(id, alias, false).await {
                Err(failure @ EnrollmentFailure::DuplicateId { .. }) => failure,
                other => break other,
            };
            if !self.is_taken(id).await {
                tracing::info!(id = %id, "Enrollment of a free identity rejected");
                break Err(EnrollmentFailure::InvalidAlias { message: failure.message().to_string() });
            }
            if conflicts >= self.settings.max_conflict_retries {
                break Err(failure);
            }
            conflicts += 1;
            tracing::info!(id = %id, conflicts, "Identity taken concurrently, re-proposing");
        };
        self.record(result)
    }

    fn record(
        &mut self,
        result: Result<Enrollment, EnrollmentFailure>,
    ) -> Result<Enrollment, EnrollmentFailure> {
        match &result {
            Ok(enrollment) => {
                self.proposal = ProposalState::Stale;
                self.status.succeed(enrollment.message.clone());
            },
            Err(failure) => self.status.fail(failure.message()),
        }
        result
    }

    async fn submit(
        &self,
        id: FingerprintId,
        alias: &str,
        verify: bool,
    ) -> Result<Enrollment, EnrollmentFailure> {
        validate_alias(alias, &self.validation)
            .map_err(|e| EnrollmentFailure::InvalidAlias { message: e.to_string() })?;
        validate_fingerprint_id(id)
            .map_err(|e| EnrollmentFailure::InvalidId { message: e.to_string() })?;

        if verify && self.is_taken(id).await {
            tracing::info!(id = %id, "Refusing enrollment of an id already in use");
            return Err(EnrollmentFailure::DuplicateId { id, message: DUPLICATE_ID.to_string() });
        }

        match self.backend.enroll(id, alias).await {
            Ok(message) => {
                tracing::info!(id = %id, alias, "Enrolled identity");
                Ok(Enrollment { id, alias: alias.to_string(), message })
            },
            Err(err) => Err(EnrollmentFailure::from_sdk(id, &err)),
        }
    }

    /// Whether a fresh read of the alias set lists `id`. An unreadable
    /// alias set counts as not listing it.
    async fn is_taken(&self, id: FingerprintId) -> bool {
        match self.backend.list_aliases().await {
            Ok(directory) => directory.contains(id),
            Err(err) => {
                tracing::warn!(error = %err, "Could not re-read the alias set");
                false
            },
        }
    }
}
