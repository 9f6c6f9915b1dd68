//! Critical Path Method passes on business-day dates.
//!
//! # Algorithm
//!
//! 1. Forward pass in topological order: ES from the max predecessor
//!    finish (or project start), lifted by earliest-start constraints and
//!    start lag; EF by walking the duration in business days.
//! 2. Backward pass in reverse order: LF from the min successor late
//!    start (or project end), LS by walking back.
//! 3. Total float = business days between ES and LF, minus the effective
//!    duration. Critical nodes are those at zero float.
//!
//! Started processes are anchored: ES = LS = the actual start date, and a
//! recorded finish clamps EF so the effective duration matches reality.
//! A pinned earliest start wins over predecessor finishes; the resulting
//! plan may be infeasible around the pin, which is reported as a warning
//! rather than an error.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use leadtime_core::bizdays::{
    add_business_days, count_business_days, next_business_day, strip_time, subtract_business_days,
};
use leadtime_core::Pid;

use crate::graph::{PlanGraph, PlanNode};
use crate::ScheduleWarning;

/// Derived schedule of a single process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSchedule {
    pub pid: Pid,
    /// Earliest start
    pub es: NaiveDate,
    /// Earliest finish
    pub ef: NaiveDate,
    /// Latest start
    pub ls: NaiveDate,
    /// Latest finish
    pub lf: NaiveDate,
    /// Effective duration in business days (clamped for finished work)
    pub duration_days: u32,
    /// Total float in business days; zero on the critical path, negative
    /// only when a pin makes the plan infeasible
    pub total_float_days: i64,
    pub is_critical: bool,
}

/// A complete deterministic schedule.
#[derive(Clone, Debug)]
pub struct Schedule {
    /// Per-process results
    pub nodes: BTreeMap<Pid, NodeSchedule>,
    /// Zero-float processes ordered by earliest start
    pub critical_path: Vec<Pid>,
    /// Normalized project start
    pub project_start: NaiveDate,
    /// Maximum earliest finish; equals `project_start` for an empty graph
    pub project_end: NaiveDate,
    /// Business days from the first earliest start to the project end
    pub critical_path_length_days: u32,
    /// Degradations from graph construction plus pass-level warnings
    pub warnings: Vec<ScheduleWarning>,
}

impl Schedule {
    pub fn node(&self, pid: &str) -> Option<&NodeSchedule> {
        self.nodes.get(pid)
    }
}

/// Schedule with every node at its expected duration.
pub fn schedule_deterministic(graph: &PlanGraph) -> Schedule {
    run_cpm(graph, |node| node.record.duration_days)
}

/// Run both passes with durations supplied per node.
///
/// The Monte Carlo sampler reuses this with drawn durations; the
/// deterministic mode passes the expected ones through.
pub(crate) fn run_cpm<F>(graph: &PlanGraph, duration_of: F) -> Schedule
where
    F: Fn(&PlanNode) -> u32,
{
    let project_start = next_business_day(strip_time(graph.start_date));

    let mut es: HashMap<&Pid, NaiveDate> = HashMap::new();
    let mut ef: HashMap<&Pid, NaiveDate> = HashMap::new();
    let mut ls: HashMap<&Pid, NaiveDate> = HashMap::new();
    let mut lf: HashMap<&Pid, NaiveDate> = HashMap::new();
    let mut duration_eff: HashMap<&Pid, u32> = HashMap::new();
    let mut warnings = graph.warnings.clone();

    // ------------------------------------------------------------------
    // Forward pass
    // ------------------------------------------------------------------
    for pid in &graph.topo_order {
        let node = graph.node(pid).expect("topo order references known node");
        let record = &node.record;
        let duration = duration_of(node);

        if record.started {
            let start = record
                .started_date
                .expect("validated record has started_date");
            let mut finish = add_business_days(start, duration);
            let mut effective = duration;
            if record.done {
                let done_date = record.done_date.expect("validated record has done_date");
                if done_date < finish {
                    finish = done_date;
                    effective = count_business_days(start, done_date);
                }
            }
            es.insert(pid, start);
            ef.insert(pid, finish);
            // Anchored in reality; no slack to distribute
            ls.insert(pid, start);
            lf.insert(pid, finish);
            duration_eff.insert(pid, effective);
            continue;
        }

        let base = graph.predecessors[pid]
            .iter()
            .map(|pred| ef[pred])
            .max()
            .unwrap_or(project_start);

        let mut start = base;
        if let Some(earliest) = record.earliest_start {
            // Weekend constraint dates shift to the next working day
            start = start.max(next_business_day(earliest));
        }
        if record.delay_start_days > 0 {
            start = start.max(add_business_days(base, record.delay_start_days));
        }
        if record.start_earliest_start {
            if let Some(pinned) = record.earliest_start {
                let pinned = next_business_day(pinned);
                if pinned < base {
                    warnings.push(ScheduleWarning::PinOverridesDependency { pid: pid.clone() });
                }
                start = pinned;
            }
        }

        let mut finish = add_business_days(start, duration);
        let mut effective = duration;
        if record.done {
            if let Some(done_date) = record.done_date {
                if done_date < finish {
                    finish = done_date;
                    effective = count_business_days(start, done_date);
                }
            }
        }

        es.insert(pid, start);
        ef.insert(pid, finish);
        duration_eff.insert(pid, effective);
    }

    let project_end = ef.values().max().copied().unwrap_or(project_start);

    // ------------------------------------------------------------------
    // Backward pass
    // ------------------------------------------------------------------
    for pid in graph.topo_order.iter().rev() {
        let node = graph.node(pid).expect("topo order references known node");
        if node.record.started {
            // LS/LF fixed in the forward pass
            continue;
        }

        let mut late_finish = graph.successors[pid]
            .iter()
            .map(|succ| ls[succ])
            .min()
            .unwrap_or(project_end);
        if node.record.done {
            if let Some(done_date) = node.record.done_date {
                late_finish = done_date;
            }
        }
        let late_start = subtract_business_days(late_finish, duration_eff[pid]);
        lf.insert(pid, late_finish);
        ls.insert(pid, late_start);
    }

    // ------------------------------------------------------------------
    // Float and critical path
    // ------------------------------------------------------------------
    let mut nodes = BTreeMap::new();
    for pid in &graph.topo_order {
        let node_es = es[pid];
        let node_lf = lf[pid];
        let effective = duration_eff[pid];
        let total_float =
            i64::from(count_business_days(node_es, node_lf)) - i64::from(effective);
        nodes.insert(
            pid.clone(),
            NodeSchedule {
                pid: pid.clone(),
                es: node_es,
                ef: ef[pid],
                ls: ls[pid],
                lf: node_lf,
                duration_days: effective,
                total_float_days: total_float,
                is_critical: total_float == 0,
            },
        );
    }

    let mut critical_path: Vec<Pid> = nodes
        .values()
        .filter(|n| n.is_critical)
        .map(|n| n.pid.clone())
        .collect();
    critical_path.sort_by(|a, b| nodes[a].es.cmp(&nodes[b].es).then_with(|| a.cmp(b)));

    let earliest = nodes
        .values()
        .map(|n| n.es)
        .min()
        .unwrap_or(project_start);
    let critical_path_length_days = count_business_days(earliest, project_end);

    Schedule {
        nodes,
        critical_path,
        project_start,
        project_end,
        critical_path_length_days,
        warnings,
    }
}
