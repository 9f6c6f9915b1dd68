//! # leadtime-core
//!
//! Core domain model for the leadtime planning engine.
//!
//! This crate provides:
//! - Business-day arithmetic ([`bizdays`])
//! - Domain types: [`ProjectDocument`], [`Process`], [`EstimateRecord`],
//!   [`Resource`]
//! - The versioned process store: mutations that append to per-process
//!   estimate histories and bump the document's `cache_hash`
//!
//! A [`ProjectDocument`] is a value. Mutating operations go through the
//! store methods in [`store`], which monotonically increment `cache_hash`
//! so that every observable state of the document has a distinct identity.
//! Schedulers treat the document as an immutable snapshot keyed by that
//! identity.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use leadtime_core::{EstimateRecord, ProjectDocument};
//!
//! let mut doc = ProjectDocument::new(
//!     NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_hms_opt(0, 0, 0).unwrap(),
//! );
//! let today = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
//! doc.upsert_process(
//!     "D".into(),
//!     EstimateRecord::new("Design").duration_days(5),
//!     today,
//! ).unwrap();
//! doc.upsert_process(
//!     "I".into(),
//!     EstimateRecord::new("Implement").duration_days(10).depends_on("D"),
//!     today,
//! ).unwrap();
//! assert_eq!(doc.cache_hash, 2);
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub mod bizdays;
pub mod store;

pub use bizdays::{
    add_business_days, count_business_days, is_business_day, next_business_day,
    prev_business_day, strip_time, subtract_business_days,
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Symbolic identifier of a process (e.g. `"DB"` for "Design Backend")
pub type Pid = String;

/// Identifier of a role (e.g. `"backend_dev"`)
pub type RoleId = String;

/// Identifier of a resource (a person or a contracted seat)
pub type Rid = String;

/// Hours one unit of attention represents per business week.
pub const HOURS_PER_ATTENTION: f64 = 40.0;

// ============================================================================
// Estimate Records
// ============================================================================

/// One dated estimate of a process.
///
/// A process accumulates these over time; the record stored under a given
/// date describes everything that was believed about the process on that
/// date. Durations are business days and must satisfy
/// `optimistic_days <= duration_days <= pessimistic_days`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateRecord {
    /// Human-readable name
    pub name: String,
    /// Predecessor processes (finish-to-start edges)
    #[serde(default)]
    pub dependencies: BTreeSet<Pid>,
    /// Expected duration in business days
    #[serde(default)]
    pub duration_days: u32,
    /// Worst-case duration in business days
    #[serde(default)]
    pub pessimistic_days: u32,
    /// Best-case duration in business days
    #[serde(default)]
    pub optimistic_days: u32,
    /// Whether work has actually begun
    #[serde(default)]
    pub started: bool,
    /// Date work began; only meaningful when `started`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_date: Option<NaiveDate>,
    /// Whether the process has finished
    #[serde(default)]
    pub done: bool,
    /// Date the process finished; only meaningful when `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_date: Option<NaiveDate>,
    /// The process may not start before this date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_start: Option<NaiveDate>,
    /// Pin the start to `earliest_start`, even ahead of predecessors
    #[serde(default)]
    pub start_earliest_start: bool,
    /// Lag in business days applied after predecessors finish
    #[serde(default)]
    pub delay_start_days: u32,
    /// Roles required for the process to execute
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    /// Attention required per role; 1.0 means one full-time resource
    #[serde(default)]
    pub commitment: BTreeMap<RoleId, f64>,
    /// Probability of success in percent, given predecessors succeeded
    #[serde(default = "default_success_prob")]
    pub success_prob: u8,
}

fn default_success_prob() -> u8 {
    100
}

impl EstimateRecord {
    /// Create a record with the given name, zero duration and no
    /// dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: BTreeSet::new(),
            duration_days: 0,
            pessimistic_days: 0,
            optimistic_days: 0,
            started: false,
            started_date: None,
            done: false,
            done_date: None,
            earliest_start: None,
            start_earliest_start: false,
            delay_start_days: 0,
            roles: BTreeSet::new(),
            commitment: BTreeMap::new(),
            success_prob: 100,
        }
    }

    /// Set the expected duration; pessimistic and optimistic bounds follow
    /// unless they already bracket it.
    pub fn duration_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self.pessimistic_days = self.pessimistic_days.max(days);
        self.optimistic_days = self.optimistic_days.min(days);
        self
    }

    /// Set the duration interval for stochastic scheduling.
    pub fn duration_interval(mut self, optimistic: u32, expected: u32, pessimistic: u32) -> Self {
        self.optimistic_days = optimistic;
        self.duration_days = expected;
        self.pessimistic_days = pessimistic;
        self
    }

    /// Add a predecessor.
    pub fn depends_on(mut self, pid: impl Into<Pid>) -> Self {
        self.dependencies.insert(pid.into());
        self
    }

    /// Mark as started on `date`.
    pub fn started_on(mut self, date: NaiveDate) -> Self {
        self.started = true;
        self.started_date = Some(date);
        self
    }

    /// Mark as done on `date` (implies started).
    pub fn done_on(mut self, date: NaiveDate) -> Self {
        self.done = true;
        self.done_date = Some(date);
        self
    }

    /// Constrain the earliest start.
    pub fn earliest_start(mut self, date: NaiveDate) -> Self {
        self.earliest_start = Some(date);
        self
    }

    /// Pin the start to the earliest-start date.
    pub fn pin_start(mut self, date: NaiveDate) -> Self {
        self.earliest_start = Some(date);
        self.start_earliest_start = true;
        self
    }

    /// Lag after predecessors, in business days.
    pub fn delay_start(mut self, days: u32) -> Self {
        self.delay_start_days = days;
        self
    }

    /// Require `role` with the given attention.
    pub fn commit(mut self, role: impl Into<RoleId>, attention: f64) -> Self {
        let role = role.into();
        self.roles.insert(role.clone());
        self.commitment.insert(role, attention);
        self
    }

    /// Probability of success in percent.
    pub fn success_prob(mut self, percent: u8) -> Self {
        self.success_prob = percent;
        self
    }

    /// Check the numeric invariants of the record.
    ///
    /// A violating record degrades only its own process: the graph builder
    /// drops the node with a warning instead of failing the schedule.
    pub fn validate(&self) -> Result<(), EstimateIssue> {
        if self.optimistic_days > self.duration_days {
            return Err(EstimateIssue::OptimisticAboveDuration);
        }
        if self.duration_days > self.pessimistic_days {
            return Err(EstimateIssue::PessimisticBelowDuration);
        }
        if self.started && self.started_date.is_none() {
            return Err(EstimateIssue::StartedWithoutDate);
        }
        if self.done && self.done_date.is_none() {
            return Err(EstimateIssue::DoneWithoutDate);
        }
        Ok(())
    }
}

/// A violated numeric invariant on an [`EstimateRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimateIssue {
    OptimisticAboveDuration,
    PessimisticBelowDuration,
    StartedWithoutDate,
    DoneWithoutDate,
}

impl std::fmt::Display for EstimateIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OptimisticAboveDuration => write!(f, "optimistic_days exceeds duration_days"),
            Self::PessimisticBelowDuration => write!(f, "duration_days exceeds pessimistic_days"),
            Self::StartedWithoutDate => write!(f, "started without started_date"),
            Self::DoneWithoutDate => write!(f, "done without done_date"),
        }
    }
}

// ============================================================================
// Processes
// ============================================================================

/// A unit of plannable work with its full estimate history.
///
/// `history` is keyed by the business day each estimate was recorded on.
/// The record effective on an observation date is found by infimum lookup:
/// the entry under the largest key not after that date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Date of the most recent history entry
    pub last_date: NaiveDate,
    /// Estimate records keyed by recording date, ascending
    pub history: BTreeMap<NaiveDate, EstimateRecord>,
}

impl Process {
    /// Create a process whose history starts with `record` on `date`.
    pub fn new(date: NaiveDate, record: EstimateRecord) -> Self {
        let mut history = BTreeMap::new();
        history.insert(date, record);
        Self {
            last_date: date,
            history,
        }
    }

    /// First date anything was known about this process.
    pub fn first_date(&self) -> NaiveDate {
        *self
            .history
            .keys()
            .next()
            .expect("process history is never empty")
    }

    /// The most recent record.
    pub fn latest(&self) -> &EstimateRecord {
        self.history
            .values()
            .next_back()
            .expect("process history is never empty")
    }

    /// The record effective on `as_of`: the entry under the largest history
    /// key `<= as_of`, or `None` when the process was not yet defined.
    pub fn record_as_of(&self, as_of: NaiveDate) -> Option<&EstimateRecord> {
        self.history.range(..=as_of).next_back().map(|(_, r)| r)
    }
}

// ============================================================================
// Resources
// ============================================================================

/// A person (or contracted seat) that can fill roles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Roles this resource can fill
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    /// Date from which the resource is available
    pub start_date: NaiveDate,
    /// Cost rate; dollars per hour, or per week when `cost_per_week`
    #[serde(default)]
    pub cost: f64,
    /// Interpret `cost` as a fixed weekly rate
    #[serde(default)]
    pub cost_per_week: bool,
}

impl Resource {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            roles: BTreeSet::new(),
            start_date,
            cost: 0.0,
            cost_per_week: false,
        }
    }

    pub fn role(mut self, role: impl Into<RoleId>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn hourly_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self.cost_per_week = false;
        self
    }

    pub fn weekly_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self.cost_per_week = true;
        self
    }
}

// ============================================================================
// Project Document
// ============================================================================

/// The complete persisted state of a plan.
///
/// Serializes to the single JSON blob the editors exchange. `cache_hash`
/// increments on every mutation and never decreases; downstream caches key
/// on it, so stale entries become unreachable rather than invalid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Monotonic mutation counter; the identity of this snapshot
    pub cache_hash: u64,
    /// Nominal project start
    pub start_date: NaiveDateTime,
    /// Registered roles
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Resources by id
    #[serde(default)]
    pub resources: BTreeMap<Rid, Resource>,
    /// Processes by symbolic id
    #[serde(default)]
    pub processes: BTreeMap<Pid, Process>,
}

impl ProjectDocument {
    /// Create an empty document starting at `start_date`.
    pub fn new(start_date: NaiveDateTime) -> Self {
        Self {
            cache_hash: 0,
            start_date,
            roles: Vec::new(),
            resources: BTreeMap::new(),
            processes: BTreeMap::new(),
        }
    }

    /// Parse a document from its JSON blob.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to the persisted JSON blob.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error from a store mutation. Failed mutations leave the document
/// untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The mutation would close a dependency cycle
    #[error("dependency cycle through process '{0}'")]
    CycleDetected(Pid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn record_builder() {
        let record = EstimateRecord::new("Design API")
            .duration_interval(2, 5, 15)
            .depends_on("RQ")
            .commit("backend_dev", 0.5)
            .success_prob(90);

        assert_eq!(record.name, "Design API");
        assert_eq!(record.duration_days, 5);
        assert_eq!(record.optimistic_days, 2);
        assert_eq!(record.pessimistic_days, 15);
        assert!(record.dependencies.contains("RQ"));
        assert_eq!(record.commitment["backend_dev"], 0.5);
        assert_eq!(record.success_prob, 90);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn duration_days_keeps_interval_consistent() {
        let record = EstimateRecord::new("X").duration_days(5);
        assert_eq!(record.optimistic_days, 0);
        assert_eq!(record.pessimistic_days, 5);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_interval() {
        let mut record = EstimateRecord::new("X").duration_interval(2, 5, 15);
        record.optimistic_days = 9;
        assert_eq!(
            record.validate(),
            Err(EstimateIssue::OptimisticAboveDuration)
        );

        let mut record = EstimateRecord::new("X").duration_interval(2, 5, 15);
        record.pessimistic_days = 3;
        assert_eq!(
            record.validate(),
            Err(EstimateIssue::PessimisticBelowDuration)
        );
    }

    #[test]
    fn record_as_of_is_infimum_lookup() {
        let mut process = Process::new(
            ymd(2024, 1, 5),
            EstimateRecord::new("X").duration_days(5),
        );
        process
            .history
            .insert(ymd(2024, 2, 1), EstimateRecord::new("X").duration_days(10));
        process.last_date = ymd(2024, 2, 1);

        // Before any record existed
        assert!(process.record_as_of(ymd(2024, 1, 1)).is_none());
        // Between the two records
        assert_eq!(
            process.record_as_of(ymd(2024, 1, 20)).unwrap().duration_days,
            5
        );
        // Exactly on a record date
        assert_eq!(
            process.record_as_of(ymd(2024, 2, 1)).unwrap().duration_days,
            10
        );
        // After the last record
        assert_eq!(
            process.record_as_of(ymd(2024, 2, 15)).unwrap().duration_days,
            10
        );
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut doc = ProjectDocument::new(
            ymd(2024, 1, 8).and_hms_opt(0, 0, 0).unwrap(),
        );
        doc.roles.push("dev".into());
        doc.resources.insert(
            "alice".into(),
            Resource::new(ymd(2024, 1, 1)).role("dev").hourly_cost(95.0),
        );
        doc.upsert_process(
            "A".into(),
            EstimateRecord::new("Alpha").duration_days(3).commit("dev", 1.0),
            ymd(2024, 1, 8),
        )
        .unwrap();

        let json = doc.to_json().unwrap();
        let back = ProjectDocument::from_json(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn document_json_shape_is_stable() {
        let mut doc = ProjectDocument::new(
            ymd(2024, 1, 8).and_hms_opt(0, 0, 0).unwrap(),
        );
        doc.upsert_process(
            "A".into(),
            EstimateRecord::new("Alpha").duration_days(3),
            ymd(2024, 1, 8),
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["cache_hash"], 1);
        assert_eq!(value["start_date"], "2024-01-08T00:00:00");
        assert_eq!(
            value["processes"]["A"]["history"]["2024-01-08"]["duration_days"],
            3
        );
        assert_eq!(value["processes"]["A"]["last_date"], "2024-01-08");
    }
}
