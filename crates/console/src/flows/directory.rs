//! Directory browsing: match history by alias and the full alias listing.
//!
//! The two regions keep separate state and tickets, so one never overwrites
//! the other no matter the order their responses arrive in.

use fingerprint_portal_sdk::{Backend, MatchHistory, SdkError};
use fingerprint_portal_types::{AliasDirectory, AliasRecord, MatchRecord};

use super::{FlowSettings, ALIASES_FALLBACK, GENERIC_FALLBACK};
use crate::ticket::{RequestTicket, TicketCounter};

/// Shown when a search is submitted without an alias.
pub const EMPTY_ALIAS: &str = "alias: must not be empty";

/// Match history region.
#[derive(Debug, Default)]
pub struct MatchesRegion {
    tickets: TicketCounter,
    /// Alias of the last search issued.
    pub alias: Option<String>,
    /// Matches of the last completed search.
    pub matches: Vec<MatchRecord>,
    /// Backend explanation for an empty result.
    pub notice: Option<String>,
    /// The last search completed successfully.
    pub searched: bool,
    /// Failure of the last search.
    pub error: Option<String>,
}

impl MatchesRegion {
    /// Clears the region and issues a ticket for a search of `alias`.
    pub fn begin(&mut self, alias: &str) -> RequestTicket {
        self.alias = Some(alias.to_string());
        self.matches.clear();
        self.notice = None;
        self.searched = false;
        self.error = None;
        self.tickets.issue()
    }

    /// Applies a finished search. Stale searches are ignored.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<MatchHistory, SdkError>,
    ) -> bool {
        if !self.tickets.accept(ticket, "matches") {
            return false;
        }
        match outcome {
            Ok(history) => {
                self.matches = history.matches;
                self.notice = history.notice;
                self.searched = true;
            },
            Err(err) => {
                tracing::debug!(error = %err, "Match search failed");
                self.error = Some(err.user_message(GENERIC_FALLBACK));
            },
        }
        true
    }
}

/// Alias listing region.
#[derive(Debug, Default)]
pub struct AliasesRegion {
    tickets: TicketCounter,
    /// Aliases of the last completed listing, in backend order.
    pub aliases: Vec<AliasRecord>,
    /// A listing has completed successfully at least once.
    pub loaded: bool,
    /// Failure of the last listing.
    pub error: Option<String>,
}

impl AliasesRegion {
    /// Clears the region and issues a ticket for a listing.
    pub fn begin(&mut self) -> RequestTicket {
        self.aliases.clear();
        self.loaded = false;
        self.error = None;
        self.tickets.issue()
    }

    /// Applies a finished listing. Stale listings are ignored.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<AliasDirectory, SdkError>,
    ) -> bool {
        if !self.tickets.accept(ticket, "aliases") {
            return false;
        }
        match outcome {
            Ok(directory) => {
                self.aliases = directory.into_records();
                self.loaded = true;
            },
            Err(err) => {
                tracing::debug!(error = %err, "Alias listing failed");
                self.error = Some(err.user_message(ALIASES_FALLBACK));
            },
        }
        true
    }
}

/// The browsing view.
#[derive(Debug)]
pub struct DirectoryBrowser<B> {
    backend: B,
    matches: MatchesRegion,
    aliases: AliasesRegion,
}

impl<B> DirectoryBrowser<B> {
    /// Match history region.
    #[must_use]
    pub fn matches(&self) -> &MatchesRegion {
        &self.matches
    }

    /// Alias listing region.
    #[must_use]
    pub fn aliases(&self) -> &AliasesRegion {
        &self.aliases
    }
}

impl<B: Backend> DirectoryBrowser<B> {
    /// Creates the view with both regions empty.
    pub fn new(backend: B, _settings: &FlowSettings) -> Self {
        Self { backend, matches: MatchesRegion::default(), aliases: AliasesRegion::default() }
    }

    /// Searches the match history of `alias` (exact, case-sensitive).
    ///
    /// An unknown alias yields an empty list with the backend's notice.
    ///
    /// # Errors
    ///
    /// Returns the displayed message if the alias is empty or the backend
    /// failed.
    pub async fn find_matches_by_alias(&mut self, alias: &str) -> Result<Vec<MatchRecord>, String> {
        if alias.trim().is_empty() {
            self.matches.begin(alias);
            self.matches.error = Some(EMPTY_ALIAS.to_string());
            return Err(EMPTY_ALIAS.to_string());
        }
        let ticket = self.matches.begin(alias);
        let outcome = self.backend.find_matches(alias).await;
        self.matches.complete(ticket, outcome);
        region_result(self.matches.error.as_ref(), &self.matches.matches)
    }

    /// Lists every enrolled alias in backend order.
    ///
    /// # Errors
    ///
    /// Returns the displayed message if the backend failed.
    pub async fn list_all_aliases(&mut self) -> Result<Vec<AliasRecord>, String> {
        let ticket = self.aliases.begin();
        let outcome = self.backend.list_aliases().await;
        self.aliases.complete(ticket, outcome);
        region_result(self.aliases.error.as_ref(), &self.aliases.aliases)
    }

    /// Searches `alias` and lists all aliases concurrently.
    ///
    /// An empty alias only fails the search region.
    pub async fn refresh_both(&mut self, alias: &str) {
        let Self { backend, matches, aliases } = self;
        let aliases_ticket = aliases.begin();
        let matches_ticket = matches.begin(alias);

        if alias.trim().is_empty() {
            matches.error = Some(EMPTY_ALIAS.to_string());
            let directory = backend.list_aliases().await;
            aliases.complete(aliases_ticket, directory);
            return;
        }

        let (history, directory) = tokio::join!(backend.find_matches(alias), backend.list_aliases());
        matches.complete(matches_ticket, history);
        aliases.complete(aliases_ticket, directory);
    }
}

fn region_result<T: Clone>(error: Option<&String>, items: &[T]) -> Result<Vec<T>, String> {
    match error {
        Some(error) => Err(error.clone()),
        None => Ok(items.to_vec()),
    }
}
