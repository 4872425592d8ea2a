//! Last-request-wins bookkeeping.
//!
//! Each display region owns a [`TicketCounter`]. Issuing a request takes a
//! fresh [`RequestTicket`]; a completion is applied only if its ticket is
//! still the region's latest. Older completions are dropped.

/// Generation number of one request issued by a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    /// Returns the generation number.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

/// Per-region generation counter.
#[derive(Debug, Default)]
pub struct TicketCounter {
    latest: u64,
}

impl TicketCounter {
    /// Creates a counter with no outstanding request.
    #[must_use]
    pub const fn new() -> Self {
        Self { latest: 0 }
    }

    /// Issues a ticket that supersedes every earlier one.
    pub fn issue(&mut self) -> RequestTicket {
        self.latest = self.latest.wrapping_add(1);
        RequestTicket(self.latest)
    }

    /// Returns `true` if `ticket` is the most recently issued one.
    #[must_use]
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest
    }

    /// Checks a completing request, logging it if it is stale.
    #[must_use]
    pub fn accept(&self, ticket: RequestTicket, region: &'static str) -> bool {
        let current = self.is_current(ticket);
        if !current {
            tracing::debug!(
                region,
                ticket = ticket.0,
                latest = self.latest,
                "Discarding stale response"
            );
        }
        current
    }
}
