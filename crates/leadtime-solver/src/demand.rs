//! Time-resolved resource demand and cost curves.
//!
//! A scheduled process does not have a single known start: anything in its
//! slack window `[ES, LS]` is possible. Demand is therefore spread as a
//! uniform mixture over candidate start days; for each candidate, the
//! process occupies the next `d` business days. The resulting density sums
//! to one over the process, so total demanded hours are conserved no
//! matter how much slack the process has. Started processes have a
//! degenerate window and their demand sits exactly on the actual span.
//!
//! Curves are sampled per calendar day over `[min ES, max LF)`; weekend
//! cells simply receive no density.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use leadtime_core::bizdays::{add_business_days, next_business_day};
use leadtime_core::{ProjectDocument, Rid, RoleId, HOURS_PER_ATTENTION};

use crate::cpm::Schedule;
use crate::graph::PlanGraph;
use crate::probabilities::event_probabilities;

/// Demand and cost curves at one-day resolution.
#[derive(Clone, Debug)]
pub struct DemandCurves {
    /// First day of the sampling window
    pub window_start: NaiveDate,
    /// One past the last day of the sampling window
    pub window_end: NaiveDate,
    /// Demanded hours per role per day
    pub hours_per_role: BTreeMap<RoleId, Vec<f64>>,
    /// Demanded hours per resource per day, role hours split evenly over
    /// the resources holding each role
    pub hours_per_resource: BTreeMap<Rid, Vec<f64>>,
    /// Cumulative cost per resource per day
    pub cumulative_cost_per_resource: BTreeMap<Rid, Vec<f64>>,
}

impl DemandCurves {
    /// Number of sampled days.
    pub fn days(&self) -> usize {
        self.hours_per_role
            .values()
            .next()
            .map_or(0, Vec::len)
    }

    /// Calendar date of sample index `idx`.
    pub fn date_of(&self, idx: usize) -> NaiveDate {
        self.window_start + Days::new(idx as u64)
    }

    /// Total hours demanded of a role over the whole window.
    pub fn total_hours_for_role(&self, role: &str) -> f64 {
        self.hours_per_role
            .get(role)
            .map_or(0.0, |curve| curve.iter().sum())
    }

    /// Final cumulative cost of a resource.
    pub fn total_cost_for_resource(&self, rid: &str) -> f64 {
        self.cumulative_cost_per_resource
            .get(rid)
            .and_then(|curve| curve.last().copied())
            .unwrap_or(0.0)
    }
}

/// Aggregate a schedule into demand curves.
///
/// With `weighted`, each process contributes in proportion to its start
/// probability (all ancestors succeeded), giving an expected rather than
/// committed demand curve.
pub fn demand_curves(
    plan: &Schedule,
    graph: &PlanGraph,
    document: &ProjectDocument,
    weighted: bool,
) -> DemandCurves {
    let window_start = plan
        .nodes
        .values()
        .map(|n| n.es)
        .min()
        .unwrap_or(plan.project_start);
    let window_end = plan
        .nodes
        .values()
        .map(|n| n.lf)
        .max()
        .unwrap_or(plan.project_start);
    let num_days = usize::try_from((window_end - window_start).num_days().max(1)).unwrap_or(1);

    let probabilities = if weighted {
        Some(event_probabilities(graph))
    } else {
        None
    };

    // Role curves, keyed by every registered role plus any role a record
    // mentions on its own.
    let mut hours_per_role: BTreeMap<RoleId, Vec<f64>> = document
        .roles
        .iter()
        .map(|role| (role.clone(), vec![0.0; num_days]))
        .collect();

    for node in &graph.nodes {
        let Some(scheduled) = plan.nodes.get(&node.pid) else {
            continue;
        };
        let duration = scheduled.duration_days;
        if duration == 0 || node.record.roles.is_empty() {
            continue;
        }

        let density = start_day_density(
            window_start,
            num_days,
            scheduled.es,
            scheduled.ls,
            duration,
        );
        let weight = probabilities
            .as_ref()
            .map_or(1.0, |p| p.start_prob_of(&node.pid));

        for role in &node.record.roles {
            let attention = node.record.commitment.get(role).copied().unwrap_or(0.0);
            if attention == 0.0 {
                continue;
            }
            // Total hours this process demands of the role
            let hours = attention * HOURS_PER_ATTENTION * f64::from(duration) / 5.0;
            let curve = hours_per_role
                .entry(role.clone())
                .or_insert_with(|| vec![0.0; num_days]);
            for (cell, d) in curve.iter_mut().zip(&density) {
                *cell += d * hours * weight;
            }
        }
    }

    // Split role demand evenly across the resources holding each role
    let mut holders_per_role: BTreeMap<&RoleId, usize> = BTreeMap::new();
    for resource in document.resources.values() {
        for role in &resource.roles {
            *holders_per_role.entry(role).or_insert(0) += 1;
        }
    }

    let mut hours_per_resource: BTreeMap<Rid, Vec<f64>> = BTreeMap::new();
    for (rid, resource) in &document.resources {
        let mut curve = vec![0.0; num_days];
        for role in &resource.roles {
            let Some(role_curve) = hours_per_role.get(role) else {
                continue;
            };
            let holders = holders_per_role[role] as f64;
            for (cell, role_hours) in curve.iter_mut().zip(role_curve) {
                *cell += role_hours / holders;
            }
        }
        hours_per_resource.insert(rid.clone(), curve);
    }

    // Cost accumulation
    let num_weeks = num_days as f64 / 7.0;
    let mut cumulative_cost_per_resource: BTreeMap<Rid, Vec<f64>> = BTreeMap::new();
    for (rid, resource) in &document.resources {
        let hours = &hours_per_resource[rid];
        let mut running = 0.0;
        let mut curve = Vec::with_capacity(num_days);
        for day in 0..num_days {
            let cost_today = if resource.cost_per_week {
                num_weeks * resource.cost / num_days as f64
            } else {
                hours[day] * resource.cost
            };
            running += cost_today;
            curve.push(running);
        }
        cumulative_cost_per_resource.insert(rid.clone(), curve);
    }

    DemandCurves {
        window_start,
        window_end,
        hours_per_role,
        hours_per_resource,
        cumulative_cost_per_resource,
    }
}

/// Density of one process over the window: a uniform mixture over
/// candidate start days in `[es, ls]`, each candidate occupying `duration`
/// business days. Sums to 1 whenever any mass lands inside the window.
fn start_day_density(
    window_start: NaiveDate,
    num_days: usize,
    es: NaiveDate,
    ls: NaiveDate,
    duration: u32,
) -> Vec<f64> {
    let mut marks = vec![0.0_f64; num_days];
    let mut total = 0.0;

    let mut candidate = es;
    while candidate <= ls {
        let mut date = next_business_day(candidate);
        for _ in 0..duration {
            let offset = (date - window_start).num_days();
            if offset >= 0 && (offset as usize) < num_days {
                marks[offset as usize] += 1.0;
            }
            total += 1.0;
            date = add_business_days(date, 1);
        }
        candidate = candidate + Days::new(1);
    }

    if total > 0.0 {
        for mark in &mut marks {
            *mark /= total;
        }
    }
    marks
}
