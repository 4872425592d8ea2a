//! Single-selection view router.
//!
//! The router owns the active flow. Selecting a view builds a fresh flow and
//! drops the previous one together with everything it displayed; there is no
//! way back to an earlier flow's state.

use std::fmt;

use fingerprint_portal_sdk::Backend;

use crate::flows::{
    DirectoryBrowser, FlowSettings, IdentificationFlow, RegistrationFlow, RevocationFlow,
};

/// Which view is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Nothing selected.
    #[default]
    None,
    /// Enrollment.
    Registering,
    /// Identification.
    Identifying,
    /// Directory browsing.
    Browsing,
    /// Revocation.
    Revoking,
}

impl ViewKind {
    /// Parses a view name as typed in the interactive session.
    #[must_use]
    pub fn from_command(name: &str) -> Option<Self> {
        match name {
            "register" => Some(Self::Registering),
            "identify" => Some(Self::Identifying),
            "browse" => Some(Self::Browsing),
            "revoke" => Some(Self::Revoking),
            _ => None,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Registering => "register",
            Self::Identifying => "identify",
            Self::Browsing => "browse",
            Self::Revoking => "revoke",
        })
    }
}

/// The active view and its state.
#[derive(Debug)]
pub enum View<B> {
    /// Nothing selected.
    None,
    /// Enrollment.
    Registering(RegistrationFlow<B>),
    /// Identification.
    Identifying(IdentificationFlow<B>),
    /// Directory browsing.
    Browsing(DirectoryBrowser<B>),
    /// Revocation.
    Revoking(RevocationFlow<B>),
}

impl<B> View<B> {
    /// Which view this is.
    #[must_use]
    pub fn kind(&self) -> ViewKind {
        match self {
            Self::None => ViewKind::None,
            Self::Registering(_) => ViewKind::Registering,
            Self::Identifying(_) => ViewKind::Identifying,
            Self::Browsing(_) => ViewKind::Browsing,
            Self::Revoking(_) => ViewKind::Revoking,
        }
    }
}

/// Owner of "which flow is active".
#[derive(Debug)]
pub struct ViewRouter<B> {
    backend: B,
    settings: FlowSettings,
    active: View<B>,
}

impl<B: Backend + Clone> ViewRouter<B> {
    /// Creates a router with nothing selected.
    pub fn new(backend: B, settings: FlowSettings) -> Self {
        Self { backend, settings, active: View::None }
    }

    /// Selects `kind`, replacing the active view unconditionally.
    ///
    /// Selecting the active kind again also starts from a fresh state.
    pub fn select(&mut self, kind: ViewKind) -> &mut View<B> {
        let backend = self.backend.clone();
        let next = match kind {
            ViewKind::None => View::None,
            ViewKind::Registering => {
                View::Registering(RegistrationFlow::new(backend, &self.settings))
            },
            ViewKind::Identifying => {
                View::Identifying(IdentificationFlow::new(backend, &self.settings))
            },
            ViewKind::Browsing => View::Browsing(DirectoryBrowser::new(backend, &self.settings)),
            ViewKind::Revoking => View::Revoking(RevocationFlow::new(backend, &self.settings)),
        };
        tracing::debug!(from = %self.active.kind(), to = %kind, "Switching view");
        self.active = next;
        &mut self.active
    }

    /// Which view is active.
    #[must_use]
    pub fn active_kind(&self) -> ViewKind {
        self.active.kind()
    }

    /// The active view.
    #[must_use]
    pub fn active(&self) -> &View<B> {
        &self.active
    }

    /// The active view, mutably.
    pub fn active_mut(&mut self) -> &mut View<B> {
        &mut self.active
    }

    /// Settings used to build flows.
    #[must_use]
    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }
}
