//! # leadtime-solver
//!
//! Critical Path Method scheduling over a versioned process store.
//!
//! This crate provides:
//! - As-of graph materialization from a [`ProjectDocument`]'s estimate
//!   histories ([`graph`])
//! - Forward/backward CPM passes on business-day dates, deterministic
//!   ([`cpm`]) and Monte Carlo ([`montecarlo`])
//! - A keyed, compute-once schedule cache ([`cache`])
//! - Time-resolved resource demand and cost curves ([`demand`])
//! - Success/start probability propagation ([`probabilities`])
//! - Evolution of the predicted completion date over the prediction
//!   history ([`evolution`])
//!
//! The entry point is [`schedule`]: it builds the graph that was knowable
//! on the observation date, optionally restricts it to the ancestors of a
//! terminal set, and runs the requested scheduling mode. All failure modes
//! that describe the *plan* rather than the computation (missing
//! terminals, degraded processes, overriding pins) are reported as tagged
//! values and warnings on the result, never as errors.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use leadtime_core::{EstimateRecord, ProjectDocument};
//! use leadtime_solver::{schedule, CancelToken, ScheduleOutcome, SchedulerOptions};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
//! let mut doc = ProjectDocument::new(start.and_hms_opt(0, 0, 0).unwrap());
//! doc.upsert_process("A".into(), EstimateRecord::new("Alpha").duration_days(2), start)
//!     .unwrap();
//! doc.upsert_process(
//!     "B".into(),
//!     EstimateRecord::new("Beta").duration_days(2).depends_on("A"),
//!     start,
//! )
//! .unwrap();
//!
//! let outcome = schedule(&doc, start, &SchedulerOptions::default(), &CancelToken::new())
//!     .unwrap();
//! let ScheduleOutcome::Deterministic(plan) = outcome else { unreachable!() };
//! assert_eq!(plan.critical_path, vec!["A".to_string(), "B".to_string()]);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use leadtime_core::{Pid, ProjectDocument};

pub mod cache;
pub mod cpm;
pub mod demand;
pub mod evolution;
pub mod graph;
pub mod montecarlo;
pub mod probabilities;

pub use cache::{CacheKey, CachedSchedule, ScheduleCache};
pub use cpm::{NodeSchedule, Schedule};
pub use demand::{demand_curves, DemandCurves};
pub use evolution::{timeline_evolution, EvolutionPoint};
pub use graph::PlanGraph;
pub use montecarlo::{NodeDistribution, StochasticSchedule};
pub use probabilities::{event_probabilities, EventProbabilities};

// ============================================================================
// Modes and Options
// ============================================================================

/// Default particle count for the stochastic mode.
pub const DEFAULT_PARTICLES: u32 = 100;

/// How a schedule is computed.
///
/// The two modes are an explicit sum type; callers dispatch on it rather
/// than on trait objects, and the stochastic variant carries everything
/// that makes a run reproducible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleMode {
    /// Single pass using the expected durations
    Deterministic,
    /// `particles` passes with durations drawn uniformly per particle from
    /// each node's `[optimistic_days, pessimistic_days]` interval. The
    /// same seed produces bit-identical results.
    Stochastic { particles: u32, seed: u64 },
}

impl Default for ScheduleMode {
    fn default() -> Self {
        Self::Deterministic
    }
}

/// Options for a scheduling request.
#[derive(Clone, Debug, Default)]
pub struct SchedulerOptions {
    pub mode: ScheduleMode,
    /// Terminal processes; when non-empty the graph is restricted to these
    /// and their ancestors before scheduling.
    pub terminals: Vec<Pid>,
}

impl SchedulerOptions {
    pub fn deterministic() -> Self {
        Self::default()
    }

    pub fn stochastic(particles: u32, seed: u64) -> Self {
        Self {
            mode: ScheduleMode::Stochastic { particles, seed },
            terminals: Vec::new(),
        }
    }

    pub fn terminals(mut self, terminals: Vec<Pid>) -> Self {
        self.terminals = terminals;
        self
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag, cheap to clone across threads.
///
/// The scheduler checks it between Monte Carlo particles and before any
/// cache insertion, so a cancelled invocation never leaves partial cache
/// entries behind.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; all clones observe it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Non-fatal degradation discovered while building or scheduling a graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleWarning {
    /// A dependency names a process missing from the as-of graph; the edge
    /// was dropped.
    UnknownReference { pid: Pid, missing: Pid },
    /// A numeric invariant on the estimate is violated; the node was
    /// excluded from scheduling.
    MissingEstimate { pid: Pid, field: String },
    /// A pinned start undercuts the finish of a predecessor; the pin won
    /// and the schedule may be infeasible around this node.
    PinOverridesDependency { pid: Pid },
}

impl std::fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownReference { pid, missing } => {
                write!(f, "process '{pid}' depends on '{missing}' which is not in the graph; edge dropped")
            }
            Self::MissingEstimate { pid, field } => {
                write!(f, "process '{pid}' excluded: {field}")
            }
            Self::PinOverridesDependency { pid } => {
                write!(f, "pinned start of '{pid}' precedes a predecessor finish")
            }
        }
    }
}

/// Result of a scheduling request, tagged by mode and availability.
#[derive(Clone, Debug)]
pub enum ScheduleOutcome {
    Deterministic(Schedule),
    Stochastic(StochasticSchedule),
    /// A requested terminal was not yet defined on the observation date.
    Unavailable { missing: Vec<Pid>, as_of: NaiveDate },
}

impl ScheduleOutcome {
    /// The deterministic schedule, if that is what was computed.
    pub fn as_deterministic(&self) -> Option<&Schedule> {
        match self {
            Self::Deterministic(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Computation-level failure. Plan-level conditions are not errors; see
/// [`ScheduleOutcome`] and [`ScheduleWarning`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The fully-built graph contains a cycle; nothing can be scheduled.
    #[error("dependency cycle through process '{0}'")]
    CycleDetected(Pid),

    /// The invocation was cancelled cooperatively.
    #[error("schedule computation cancelled")]
    CancelRequested,
}

// ============================================================================
// Entry Point
// ============================================================================

/// Build the graph known on `as_of` and compute its schedule.
///
/// Restricts to `options.terminals` and their ancestors when terminals are
/// given; a terminal that is not in the as-of graph makes the outcome
/// [`ScheduleOutcome::Unavailable`].
pub fn schedule(
    document: &ProjectDocument,
    as_of: NaiveDate,
    options: &SchedulerOptions,
    cancel: &CancelToken,
) -> Result<ScheduleOutcome, ScheduleError> {
    let graph = PlanGraph::build(document, as_of)?;
    schedule_graph(&graph, as_of, options, cancel)
}

/// Schedule an already-materialized graph. Used by the cache to keep the
/// graph alongside the schedule it produced.
pub fn schedule_graph(
    graph: &PlanGraph,
    as_of: NaiveDate,
    options: &SchedulerOptions,
    cancel: &CancelToken,
) -> Result<ScheduleOutcome, ScheduleError> {
    let restricted;
    let target: &PlanGraph = if options.terminals.is_empty() {
        graph
    } else {
        match graph.restricted(&options.terminals) {
            Ok(sub) => {
                restricted = sub;
                &restricted
            }
            Err(missing) => {
                tracing::debug!(?missing, %as_of, "terminal not yet defined; schedule unavailable");
                return Ok(ScheduleOutcome::Unavailable { missing, as_of });
            }
        }
    };

    if cancel.is_cancelled() {
        return Err(ScheduleError::CancelRequested);
    }

    match options.mode {
        ScheduleMode::Deterministic => {
            Ok(ScheduleOutcome::Deterministic(cpm::schedule_deterministic(target)))
        }
        ScheduleMode::Stochastic { particles, seed } => Ok(ScheduleOutcome::Stochastic(
            montecarlo::simulate(target, particles, seed, cancel)?,
        )),
    }
}
