//! Burn-down aggregation over reconstructed ticket state.
//!
//! Samples are taken at midnight of every day in the half-open report
//! range: a ticket contributes its story points on a day when the tracking
//! label was present and the ticket was not yet closed.

use chrono::{Days, NaiveDate};

use crate::{EventKind, StoryPointPattern, TicketHistory};

/// Story points in a tracked state on one day.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub story_points: f64,
}

/// Story points carrying `tracking_label` and still open, per day over
/// `[from, to)`.
///
/// Tickets without story points contribute nothing; the state module
/// reports them as it encounters them.
pub fn burndown(
    tickets: &[TicketHistory],
    tracking_label: &str,
    from: NaiveDate,
    to: NaiveDate,
    pattern: &StoryPointPattern,
) -> Vec<BurndownPoint> {
    let mut points = Vec::new();
    let mut date = from;
    while date < to {
        let moment = date.and_hms_opt(0, 0, 0).expect("midnight exists");
        let total: f64 = tickets
            .iter()
            .filter(|history| {
                history.labels_on(moment).contains(tracking_label)
                    && !history.is_closed_on(moment)
            })
            .filter_map(|history| history.story_points(pattern))
            .sum();
        points.push(BurndownPoint {
            date,
            story_points: total,
        });
        date = date + Days::new(1);
    }
    points
}

/// Story points of tickets closed inside `[from, to)`, tallied per
/// assignee. A ticket with several assignees credits each in full.
///
/// Closing instants come from the event stream, so a ticket that was
/// closed, reopened and closed again is credited for the closure that
/// actually fell inside the window; each ticket counts at most once, at
/// its latest in-window close. Credit goes to the assignees in effect at
/// that instant, not to whoever holds the ticket today.
pub fn closed_points_per_assignee(
    tickets: &[TicketHistory],
    from: NaiveDate,
    to: NaiveDate,
    pattern: &StoryPointPattern,
) -> std::collections::BTreeMap<String, f64> {
    let from = from.and_hms_opt(0, 0, 0).expect("midnight exists");
    let to = to.and_hms_opt(0, 0, 0).expect("midnight exists");

    let mut tally = std::collections::BTreeMap::new();
    for history in tickets {
        let closed_at = history
            .events
            .iter()
            .filter(|event| event.kind == EventKind::Closed)
            .map(|event| event.created_at)
            .filter(|moment| *moment >= from && *moment < to)
            .last();
        let Some(closed_at) = closed_at else {
            continue;
        };
        let Some(points) = history.story_points(pattern) else {
            continue;
        };
        for assignee in history.assignees_on(closed_at) {
            *tally.entry(assignee).or_insert(0.0) += points;
        }
    }
    tally
}

/// Earliest moment a ticket was labeled `in_progress`, if ever.
pub fn started_at(history: &TicketHistory) -> Option<chrono::NaiveDateTime> {
    history
        .events
        .iter()
        .find(|event| {
            event.kind == EventKind::Labeled && event.label.as_deref() == Some("in_progress")
        })
        .map(|event| event.created_at)
}
