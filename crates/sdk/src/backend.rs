//! The backend contract as seen by the flows.

use std::future::Future;

use fingerprint_portal_types::{AliasDirectory, FingerprintId, IdentificationResult, MatchRecord};

use crate::error::Result;

/// Match history of one alias.
///
/// An unknown alias is not an error: the backend's explanation is carried in
/// `notice` next to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchHistory {
    /// Historical identifications, in backend order.
    pub matches: Vec<MatchRecord>,
    /// Backend explanation for an empty history, if it gave one.
    pub notice: Option<String>,
}

impl MatchHistory {
    /// Returns `true` if there are no recorded matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Operations the fingerprint service offers.
///
/// Implemented by [`crate::PortalClient`] over HTTP. Every call resolves to a
/// value or exactly one [`crate::SdkError`]; implementations never panic on
/// backend misbehaviour.
pub trait Backend: Send + Sync {
    /// Enrolls `alias` under `id`, returning the backend's confirmation.
    fn enroll(
        &self,
        id: FingerprintId,
        alias: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Lists every enrolled identity in backend order.
    ///
    /// An empty directory is a success, however the backend reports it.
    fn list_aliases(&self) -> impl Future<Output = Result<AliasDirectory>> + Send;

    /// Returns the identification history of an alias (exact, case-sensitive).
    fn find_matches(&self, alias: &str) -> impl Future<Output = Result<MatchHistory>> + Send;

    /// Runs one identification against whatever the sensor captures.
    fn identify(&self) -> impl Future<Output = Result<IdentificationResult>> + Send;

    /// Revokes an enrolled identity, returning the backend's confirmation.
    fn delete_fingerprint(&self, id: FingerprintId) -> impl Future<Output = Result<String>> + Send;
}
