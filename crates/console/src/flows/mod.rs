//! The four user flows.
//!
//! Each flow owns its request/response state, talks only to a [`Backend`],
//! and turns every failure into a message it can display. Flows never call
//! each other; the [`crate::router::ViewRouter`] decides which one exists.
//!
//! [`Backend`]: fingerprint_portal_sdk::Backend

use std::path::PathBuf;

use bon::Builder;
use fingerprint_portal_types::ValidationConfig;

use crate::config::RegistrationSettings;

pub mod directory;
pub mod identification;
pub mod registration;
pub mod revocation;

pub use directory::{AliasesRegion, DirectoryBrowser, MatchesRegion};
pub use identification::{
    IdentificationFailure, IdentificationFlow, IdentificationView, ImageRole, ImageSummary,
};
pub use registration::{
    Enrollment, EnrollmentFailure, ProposalState, RegistrationFlow,
};
pub use revocation::{RevocationFailure, RevocationFlow};

/// Shown when an enrollment or lookup fails without a backend detail.
pub const GENERIC_FALLBACK: &str = "An error occurred";
/// Shown when listing aliases fails without a backend detail.
pub const ALIASES_FALLBACK: &str = "An error occurred while fetching aliases.";
/// Shown when a deletion fails without a backend detail.
pub const DELETE_FALLBACK: &str = "An error occurred while deleting the fingerprint.";
/// Shown when the backend refused an identification without a detail.
pub const IDENTIFY_FALLBACK: &str = "Failed to match fingerprint.";
/// Shown when an identification never got an answer.
pub const IDENTIFY_UNREACHABLE: &str = "An error occurred. Please try again.";
/// Shown when the revocation input is not a usable id.
pub const INVALID_ID_INPUT: &str = "Please enter a valid fingerprint ID.";

/// Settings every flow is constructed with.
#[derive(Debug, Clone, Default, Builder)]
pub struct FlowSettings {
    /// Client-side input limits.
    #[builder(default)]
    pub validation: ValidationConfig,
    /// Enrollment guard and conflict retry bound.
    #[builder(default)]
    pub registration: RegistrationSettings,
    /// Where identification images are saved, if anywhere.
    pub image_dir: Option<PathBuf>,
}

/// Confirmation or error line of a flow region.
///
/// At most one of the two is set after a request completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    /// Server confirmation shown verbatim.
    pub message: Option<String>,
    /// Failure shown to the user.
    pub error: Option<String>,
}

impl StatusLine {
    /// Clears both lines.
    pub fn clear(&mut self) {
        self.message = None;
        self.error = None;
    }

    /// Shows a confirmation, clearing any error.
    pub fn succeed(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.error = None;
    }

    /// Shows an error, clearing any confirmation.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.message = None;
        self.error = Some(error.into());
    }

    /// Returns `true` if nothing is displayed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.error.is_none()
    }
}
