//! # leadtime-tickets
//!
//! Point-in-time reconstruction of ticket state from append-only event
//! streams, and the burn-down aggregation built on top of it.
//!
//! A ticket's labels, assignees and open/closed state on any historical
//! date are folds over its event stream; nothing about the present is
//! consulted. The external system holding the tickets is abstracted as an
//! [`EventProvider`]; calls to it are the only thing in leadtime that may
//! block on I/O, and they go through bounded retry ([`retry`]).
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use leadtime_tickets::{Ticket, TicketEvent, TicketHistory};
//!
//! let day = |d: u32| NaiveDate::from_ymd_opt(2024, 5, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let history = TicketHistory::new(
//!     Ticket::new(42, "Fix the flaky login test").created_at(day(1)),
//!     vec![
//!         TicketEvent::labeled(day(6), "in_progress"),
//!         TicketEvent::labeled(day(8), "blocked"),
//!         TicketEvent::unlabeled(day(10), "blocked"),
//!         TicketEvent::closed(day(12)),
//!     ],
//! );
//! assert!(history.labels_on(day(9)).contains("blocked"));
//! assert!(!history.is_closed_on(day(11)));
//! assert!(history.is_closed_on(day(12)));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod burndown;
pub mod json;
pub mod retry;
pub mod state;

pub use burndown::{burndown, closed_points_per_assignee, BurndownPoint};
pub use json::JsonFileProvider;
pub use retry::{with_backoff, RetryPolicy};
pub use state::{StateInterval, StoryPointPattern};

/// Identifier of a ticket in the external system (issue number).
pub type TicketId = u64;

// ============================================================================
// Events
// ============================================================================

/// What happened to a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Labeled,
    Unlabeled,
    Assigned,
    Unassigned,
    Closed,
    Reopened,
}

/// One entry of a ticket's append-only event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketEvent {
    pub kind: EventKind,
    pub created_at: NaiveDateTime,
    /// Set for `Labeled`/`Unlabeled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Set for `Assigned`/`Unassigned`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl TicketEvent {
    pub fn labeled(created_at: NaiveDateTime, label: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Labeled,
            created_at,
            label: Some(label.into()),
            assignee: None,
        }
    }

    pub fn unlabeled(created_at: NaiveDateTime, label: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Unlabeled,
            created_at,
            label: Some(label.into()),
            assignee: None,
        }
    }

    pub fn assigned(created_at: NaiveDateTime, assignee: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Assigned,
            created_at,
            assignee: Some(assignee.into()),
            label: None,
        }
    }

    pub fn unassigned(created_at: NaiveDateTime, assignee: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Unassigned,
            created_at,
            assignee: Some(assignee.into()),
            label: None,
        }
    }

    pub fn closed(created_at: NaiveDateTime) -> Self {
        Self {
            kind: EventKind::Closed,
            created_at,
            label: None,
            assignee: None,
        }
    }

    pub fn reopened(created_at: NaiveDateTime) -> Self {
        Self {
            kind: EventKind::Reopened,
            created_at,
            label: None,
            assignee: None,
        }
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// Present-day metadata of a ticket as the provider reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    /// Labels currently on the ticket
    #[serde(default)]
    pub labels: Vec<String>,
    /// Logins currently assigned
    #[serde(default)]
    pub assignees: Vec<String>,
    pub created_at: NaiveDateTime,
    /// Set when the ticket is currently closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<NaiveDateTime>,
}

impl Ticket {
    pub fn new(id: TicketId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            labels: Vec::new(),
            assignees: Vec::new(),
            created_at: NaiveDateTime::default(),
            closed_at: None,
        }
    }

    pub fn created_at(mut self, moment: NaiveDateTime) -> Self {
        self.created_at = moment;
        self
    }

    pub fn closed_at(mut self, moment: NaiveDateTime) -> Self {
        self.closed_at = Some(moment);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn assignee(mut self, login: impl Into<String>) -> Self {
        self.assignees.push(login.into());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// A ticket together with its full event stream, ready for point-in-time
/// queries. See [`state`] for the reconstruction operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketHistory {
    pub ticket: Ticket,
    /// Events ordered by `created_at` ascending
    pub events: Vec<TicketEvent>,
}

impl TicketHistory {
    pub fn new(ticket: Ticket, mut events: Vec<TicketEvent>) -> Self {
        events.sort_by_key(|e| e.created_at);
        Self { ticket, events }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Filter for ticket listings; empty filters match everything.
#[derive(Clone, Debug, Default)]
pub struct TicketFilter {
    pub label: Option<String>,
    pub assignee: Option<String>,
}

/// The external ticket system.
///
/// Implementations may block on network I/O; everything else in leadtime
/// is pure computation. Callers wrap provider calls in
/// [`retry::with_backoff`] so transient failures are retried a bounded
/// number of times before surfacing.
pub trait EventProvider {
    /// Tickets of `repo` matching the filter.
    fn list_issues(&self, repo: &str, filter: &TicketFilter)
        -> Result<BTreeSet<TicketId>, ProviderError>;

    /// Present-day metadata of one ticket.
    fn get_ticket(&self, id: TicketId) -> Result<Ticket, ProviderError>;

    /// The ordered event stream of one ticket.
    fn get_events(&self, id: TicketId) -> Result<Vec<TicketEvent>, ProviderError>;

    /// All labels defined in `repo`.
    fn list_labels(&self, repo: &str) -> Result<BTreeSet<String>, ProviderError>;

    /// Teams of `repo` with their member logins.
    fn list_teams(&self, repo: &str) -> Result<BTreeMap<String, BTreeSet<String>>, ProviderError>;
}

/// Fetch a ticket and its events, retrying each call under `policy`.
pub fn fetch_history<P: EventProvider>(
    provider: &P,
    id: TicketId,
    policy: &RetryPolicy,
) -> Result<TicketHistory, ProviderError> {
    let ticket = with_backoff(policy, || provider.get_ticket(id))?;
    let events = with_backoff(policy, || provider.get_events(id))?;
    Ok(TicketHistory::new(ticket, events))
}

// ============================================================================
// Errors
// ============================================================================

/// Failure talking to the external ticket system.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("ticket {0} not found")]
    UnknownTicket(TicketId),

    #[error("provider I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed provider payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("provider failure: {0}")]
    Other(String),
}
