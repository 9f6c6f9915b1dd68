//! Evolution of the predicted completion date.
//!
//! Replaying the scheduler at every date on which any estimate changed
//! shows how the predicted project end drifted as the plan was revised.
//! Dates on which a requested terminal was not yet defined are skipped:
//! there was no prediction for that goal then.

use chrono::NaiveDate;
use tracing::debug;

use leadtime_core::{Pid, ProjectDocument};

use crate::{schedule, CancelToken, ScheduleError, ScheduleOutcome, SchedulerOptions};

/// One historical prediction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvolutionPoint {
    /// Date the prediction was (or would have been) made
    pub observed_on: NaiveDate,
    /// Project end predicted from what was known then
    pub predicted_end: NaiveDate,
}

/// Predicted completion date for every prediction-change date plus `today`.
pub fn timeline_evolution(
    document: &ProjectDocument,
    terminals: &[Pid],
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<Vec<EvolutionPoint>, ScheduleError> {
    let mut dates = document.dates_of_prediction_change();
    dates.retain(|d| *d <= today);
    if dates.last() != Some(&today) {
        dates.push(today);
    }

    let options = SchedulerOptions {
        terminals: terminals.to_vec(),
        ..SchedulerOptions::default()
    };

    let mut points = Vec::with_capacity(dates.len());
    for date in dates {
        if cancel.is_cancelled() {
            return Err(ScheduleError::CancelRequested);
        }
        match schedule(document, date, &options, cancel)? {
            ScheduleOutcome::Deterministic(plan) => {
                points.push(EvolutionPoint {
                    observed_on: date,
                    predicted_end: plan.project_end,
                });
            }
            ScheduleOutcome::Unavailable { .. } => {
                debug!(%date, "terminal not defined yet; skipping prediction date");
            }
            ScheduleOutcome::Stochastic(_) => unreachable!("evolution runs deterministic mode"),
        }
    }
    Ok(points)
}
