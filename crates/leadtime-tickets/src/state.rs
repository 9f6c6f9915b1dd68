//! Point-in-time reconstruction of label, assignee and open/closed state.
//!
//! All queries fold the event stream up to and including the query
//! moment. Day-resolution callers pass midnight, so an event with a
//! time-of-day counts from the following day, matching how the burn-down
//! samples its curve.
//!
//! Label events of one label alternate starting from absent. An interval
//! that is still open at the window end is closed by the window end, or by
//! the close date when the ticket was closed before that.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::warn;

use crate::{EventKind, TicketHistory};

/// Half-open `[begin, end)` span during which a tracking label was
/// present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateInterval {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Compiled story-point label pattern.
///
/// Configured with a `<value>` placeholder (for example `"<value>SPs"`);
/// group 1 of the compiled pattern captures the numeric part.
#[derive(Clone, Debug)]
pub struct StoryPointPattern {
    regex: Regex,
}

impl StoryPointPattern {
    /// Compile from a placeholder pattern; `<value>` becomes the capture
    /// group.
    pub fn from_placeholder(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&pattern.replace("<value>", "(.+?)"))?;
        Ok(Self { regex })
    }

    /// Extract the story-point value from one label.
    pub fn parse(&self, label: &str) -> Option<f64> {
        self.regex
            .captures(label)
            .and_then(|caps| caps.get(1))
            .and_then(|group| group.as_str().parse().ok())
    }
}

impl Default for StoryPointPattern {
    fn default() -> Self {
        Self::from_placeholder("<value>SPs").expect("default pattern compiles")
    }
}

impl TicketHistory {
    /// Labels present on the ticket at `moment`.
    pub fn labels_on(&self, moment: NaiveDateTime) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();
        for event in &self.events {
            if event.created_at > moment {
                break;
            }
            match (&event.kind, &event.label) {
                (EventKind::Labeled, Some(label)) => {
                    labels.insert(label.clone());
                }
                (EventKind::Unlabeled, Some(label)) => {
                    labels.remove(label);
                }
                _ => {}
            }
        }
        labels
    }

    /// Logins assigned to the ticket at `moment`.
    pub fn assignees_on(&self, moment: NaiveDateTime) -> BTreeSet<String> {
        let mut assignees = BTreeSet::new();
        for event in &self.events {
            if event.created_at > moment {
                break;
            }
            match (&event.kind, &event.assignee) {
                (EventKind::Assigned, Some(login)) => {
                    assignees.insert(login.clone());
                }
                (EventKind::Unassigned, Some(login)) => {
                    assignees.remove(login);
                }
                _ => {}
            }
        }
        assignees
    }

    /// Whether the latest close/reopen event at or before `moment` is a
    /// close.
    pub fn is_closed_on(&self, moment: NaiveDateTime) -> bool {
        let mut closed = false;
        for event in &self.events {
            if event.created_at > moment {
                break;
            }
            match event.kind {
                EventKind::Closed => closed = true,
                EventKind::Reopened => closed = false,
                _ => {}
            }
        }
        closed
    }

    /// Story points from the ticket's current labels: the first label the
    /// pattern matches, with group 1 parsed as a real. Missing points are
    /// reported once and yield `None`.
    pub fn story_points(&self, pattern: &StoryPointPattern) -> Option<f64> {
        let points = self
            .ticket
            .labels
            .iter()
            .find_map(|label| pattern.parse(label));
        if points.is_none() {
            warn!(ticket = self.ticket.id, title = %self.ticket.title, "ticket has no story points");
        }
        points
    }

    /// Story points as labeled at `moment`, reconstructed from events.
    pub fn story_points_on(&self, moment: NaiveDateTime, pattern: &StoryPointPattern) -> Option<f64> {
        self.labels_on(moment)
            .iter()
            .find_map(|label| pattern.parse(label))
    }

    /// For each tracking label, the `[begin, end)` intervals during which
    /// it was present, clipped to `window` and truncated at the close
    /// date when the ticket was closed.
    ///
    /// Labeled/unlabeled events of one label pair up in order; a label
    /// still present at the window end yields an interval closed by the
    /// window end (or the close date).
    pub fn state_intervals(
        &self,
        tracking_labels: &[String],
        window: (NaiveDateTime, NaiveDateTime),
    ) -> BTreeMap<String, Vec<StateInterval>> {
        let (window_start, window_end) = window;
        let mut out = BTreeMap::new();

        for tracking in tracking_labels {
            let mut intervals = Vec::new();
            let mut open: Option<NaiveDateTime> = None;
            for event in &self.events {
                if event.created_at > window_end {
                    break;
                }
                if event.label.as_ref() != Some(tracking) {
                    continue;
                }
                match event.kind {
                    EventKind::Labeled => {
                        if open.is_none() {
                            open = Some(event.created_at);
                        }
                    }
                    EventKind::Unlabeled => {
                        if let Some(begin) = open.take() {
                            intervals.push(StateInterval {
                                begin,
                                end: event.created_at,
                            });
                        }
                    }
                    _ => {}
                }
            }
            // Open interval closed by the window end
            if let Some(begin) = open.take() {
                intervals.push(StateInterval {
                    begin,
                    end: window_end,
                });
            }

            // A closed ticket stops being in any state at its close date
            if let Some(closed_at) = self.ticket.closed_at {
                intervals.retain(|iv| iv.begin < closed_at);
                for iv in &mut intervals {
                    iv.end = iv.end.min(closed_at);
                }
            }

            // Clip to the window
            intervals.retain(|iv| iv.end > window_start && iv.begin < window_end);
            for iv in &mut intervals {
                iv.begin = iv.begin.max(window_start);
                iv.end = iv.end.min(window_end);
            }

            out.insert(tracking.clone(), intervals);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ticket, TicketEvent};
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn t42() -> TicketHistory {
        TicketHistory::new(
            Ticket::new(42, "Checkout flow rewrite")
                .created_at(day(1))
                .closed_at(day(12))
                .label("3SPs"),
            vec![
                TicketEvent::labeled(day(6), "in_progress"),
                TicketEvent::labeled(day(8), "blocked"),
                TicketEvent::unlabeled(day(10), "blocked"),
                TicketEvent::closed(day(12)),
            ],
        )
    }

    #[test]
    fn labels_fold_in_order() {
        let history = t42();
        assert_eq!(
            history.labels_on(day(9)),
            ["in_progress", "blocked"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
        assert_eq!(
            history.labels_on(day(11)),
            ["in_progress"].iter().map(|s| s.to_string()).collect()
        );
        assert!(history.labels_on(day(5)).is_empty());
    }

    #[test]
    fn closed_state_follows_latest_event() {
        let history = t42();
        assert!(!history.is_closed_on(day(11)));
        assert!(history.is_closed_on(day(12)));

        let reopened = TicketHistory::new(
            Ticket::new(7, "Reopened bug").created_at(day(1)),
            vec![
                TicketEvent::closed(day(3)),
                TicketEvent::reopened(day(5)),
                TicketEvent::closed(day(9)),
            ],
        );
        assert!(reopened.is_closed_on(day(4)));
        assert!(!reopened.is_closed_on(day(6)));
        assert!(reopened.is_closed_on(day(20)));
    }

    #[test]
    fn assignees_fold_symmetrically() {
        let history = TicketHistory::new(
            Ticket::new(9, "Pager cleanup").created_at(day(1)),
            vec![
                TicketEvent::assigned(day(2), "ana"),
                TicketEvent::assigned(day(3), "bo"),
                TicketEvent::unassigned(day(5), "ana"),
            ],
        );
        assert_eq!(
            history.assignees_on(day(4)),
            ["ana", "bo"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            history.assignees_on(day(6)),
            ["bo"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn story_points_from_first_matching_label() {
        let pattern = StoryPointPattern::default();
        let history = t42();
        assert_eq!(history.story_points(&pattern), Some(3.0));

        let unpointed = TicketHistory::new(
            Ticket::new(1, "No points").created_at(day(1)).label("bug"),
            vec![],
        );
        assert_eq!(unpointed.story_points(&pattern), None);
    }

    #[test]
    fn story_points_on_date_use_labels_of_that_date() {
        let pattern = StoryPointPattern::default();
        let history = TicketHistory::new(
            Ticket::new(2, "Re-pointed").created_at(day(1)).label("5SPs"),
            vec![
                TicketEvent::labeled(day(2), "2SPs"),
                TicketEvent::unlabeled(day(6), "2SPs"),
                TicketEvent::labeled(day(6), "5SPs"),
            ],
        );
        assert_eq!(history.story_points_on(day(4), &pattern), Some(2.0));
        assert_eq!(history.story_points_on(day(8), &pattern), Some(5.0));
    }

    #[test]
    fn custom_placeholder_patterns() {
        let pattern = StoryPointPattern::from_placeholder("<value>pt").unwrap();
        assert_eq!(pattern.parse("8pt"), Some(8.0));
        assert_eq!(pattern.parse("2.5pt"), Some(2.5));
        assert_eq!(pattern.parse("bug"), None);
    }

    #[test]
    fn intervals_pair_label_events() {
        let history = t42();
        let intervals =
            history.state_intervals(&["blocked".into()], (day(1), day(20)));
        assert_eq!(
            intervals["blocked"],
            vec![StateInterval {
                begin: day(8),
                end: day(10),
            }]
        );
    }

    #[test]
    fn open_interval_is_closed_by_the_window_or_close_date() {
        let history = t42();
        // in_progress never gets unlabeled; the ticket closes on day 12
        let intervals =
            history.state_intervals(&["in_progress".into()], (day(1), day(20)));
        assert_eq!(
            intervals["in_progress"],
            vec![StateInterval {
                begin: day(6),
                end: day(12),
            }]
        );

        // Without a close, the window end closes it
        let open_ended = TicketHistory::new(
            Ticket::new(3, "Open").created_at(day(1)),
            vec![TicketEvent::labeled(day(6), "in_progress")],
        );
        let intervals =
            open_ended.state_intervals(&["in_progress".into()], (day(1), day(20)));
        assert_eq!(
            intervals["in_progress"],
            vec![StateInterval {
                begin: day(6),
                end: day(20),
            }]
        );
    }

    #[test]
    fn intervals_clip_to_the_window() {
        let history = TicketHistory::new(
            Ticket::new(4, "Long-running").created_at(day(1)),
            vec![
                TicketEvent::labeled(day(2), "blocked"),
                TicketEvent::unlabeled(day(18), "blocked"),
            ],
        );
        let intervals = history.state_intervals(&["blocked".into()], (day(5), day(10)));
        assert_eq!(
            intervals["blocked"],
            vec![StateInterval {
                begin: day(5),
                end: day(10),
            }]
        );
    }

    #[test]
    fn intervals_outside_the_window_vanish() {
        let history = TicketHistory::new(
            Ticket::new(5, "Early work").created_at(day(1)),
            vec![
                TicketEvent::labeled(day(2), "blocked"),
                TicketEvent::unlabeled(day(3), "blocked"),
            ],
        );
        let intervals = history.state_intervals(&["blocked".into()], (day(5), day(10)));
        assert!(intervals["blocked"].is_empty());
    }

    #[test]
    fn repeated_label_spells_make_separate_intervals() {
        let history = TicketHistory::new(
            Ticket::new(6, "On and off").created_at(day(1)),
            vec![
                TicketEvent::labeled(day(2), "blocked"),
                TicketEvent::unlabeled(day(4), "blocked"),
                TicketEvent::labeled(day(7), "blocked"),
                TicketEvent::unlabeled(day(9), "blocked"),
            ],
        );
        let intervals = history.state_intervals(&["blocked".into()], (day(1), day(20)));
        assert_eq!(
            intervals["blocked"],
            vec![
                StateInterval { begin: day(2), end: day(4) },
                StateInterval { begin: day(7), end: day(9) },
            ]
        );
    }
}
