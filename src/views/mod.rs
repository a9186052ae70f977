//! Per-screen state machines shared by the terminal UI and the one-shot commands.
//!
//! Each view owns its transient result, loading, and error state. Requests are
//! identified by a [`Ticket`]; a response whose ticket is no longer current (the
//! view moved on to a new subject, or the user re-triggered) is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::api::ApiError;

pub mod graph;
pub mod search;
pub mod stream_graph;
pub mod transcript;

/// Identifies one outstanding request issued by a view. Unique across every
/// tracker in the process, so a fresh view never accepts an answer meant for
/// the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Hands out tickets and remembers which one is still wanted.
#[derive(Debug, Default)]
pub struct RequestTracker {
    in_flight: Option<Ticket>,
}

impl RequestTracker {
    /// Supersede any outstanding request and return the new current ticket.
    pub fn issue(&mut self) -> Ticket {
        let ticket = Ticket(NEXT_TICKET.fetch_add(1, Ordering::Relaxed));
        self.in_flight = Some(ticket);
        ticket
    }

    /// Consume `ticket` if it is the one in flight. Stale tickets return `false`.
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            true
        } else {
            debug!(?ticket, current = ?self.in_flight, "dropping stale response");
            false
        }
    }

    /// Lose interest in whatever is in flight.
    pub fn abandon(&mut self) {
        self.in_flight = None;
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// User-visible failure of a fetch, detached from the error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl From<&ApiError> for FetchError {
    fn from(err: &ApiError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        Self::from(&err)
    }
}

/// Lifecycle of one fetch-and-show cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(FetchError),
}

impl<T> Default for Fetch<T> {
    fn default() -> Self {
        Fetch::Idle
    }
}

impl<T> Fetch<T> {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Fetch::Loading)
    }

    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Fetch::Ready(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Fetch::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Shown when a completed fetch produced nothing to display.
pub const NO_DATA_MESSAGE: &str = "No data found for the selected criteria.";
