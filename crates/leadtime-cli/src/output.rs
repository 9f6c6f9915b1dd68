//! Report structs and printers.
//!
//! Every command renders through one of these: a `Serialize` struct for
//! `--format json` and a plain text printer for the terminal.

use chrono::NaiveDate;
use serde::Serialize;

use leadtime_solver::{DemandCurves, EvolutionPoint, Schedule, StochasticSchedule};

/// One scheduled process row.
#[derive(Debug, Serialize)]
pub struct NodeRow {
    pub pid: String,
    pub es: NaiveDate,
    pub ef: NaiveDate,
    pub ls: NaiveDate,
    pub lf: NaiveDate,
    pub duration_days: u32,
    pub total_float_days: i64,
    pub critical: bool,
}

/// Deterministic schedule report.
#[derive(Debug, Serialize)]
pub struct ScheduleReport {
    pub as_of: NaiveDate,
    pub project_start: NaiveDate,
    pub project_end: NaiveDate,
    pub critical_path: Vec<String>,
    pub critical_path_length_days: u32,
    pub nodes: Vec<NodeRow>,
    pub warnings: Vec<String>,
}

impl ScheduleReport {
    pub fn from_schedule(as_of: NaiveDate, plan: &Schedule) -> Self {
        Self {
            as_of,
            project_start: plan.project_start,
            project_end: plan.project_end,
            critical_path: plan.critical_path.clone(),
            critical_path_length_days: plan.critical_path_length_days,
            nodes: plan
                .nodes
                .values()
                .map(|node| NodeRow {
                    pid: node.pid.clone(),
                    es: node.es,
                    ef: node.ef,
                    ls: node.ls,
                    lf: node.lf,
                    duration_days: node.duration_days,
                    total_float_days: node.total_float_days,
                    critical: node.is_critical,
                })
                .collect(),
            warnings: plan.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

pub fn print_schedule_text(report: &ScheduleReport) {
    println!("Schedule as of {}", report.as_of);
    println!(
        "Project: {} .. {} ({} business days on the critical path)",
        report.project_start, report.project_end, report.critical_path_length_days
    );
    println!();
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>5} {:>6}",
        "process", "ES", "EF", "LS", "LF", "dur", "float"
    );
    for node in &report.nodes {
        println!(
            "{}{:<11} {:>10} {:>10} {:>10} {:>10} {:>5} {:>6}",
            if node.critical { "*" } else { " " },
            node.pid,
            node.es,
            node.ef,
            node.ls,
            node.lf,
            node.duration_days,
            node.total_float_days,
        );
    }
    println!();
    println!("Critical path: {}", report.critical_path.join(" -> "));
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
}

/// One node of the stochastic report.
#[derive(Debug, Serialize)]
pub struct StochasticNodeRow {
    pub pid: String,
    pub mean_float_days: f64,
    pub critical_fraction: f64,
    pub earliest_es: NaiveDate,
    pub latest_ef: NaiveDate,
}

/// Monte Carlo schedule report.
#[derive(Debug, Serialize)]
pub struct StochasticReport {
    pub as_of: NaiveDate,
    pub particles: u32,
    pub seed: u64,
    pub best_case_end: Option<NaiveDate>,
    pub worst_case_end: Option<NaiveDate>,
    pub ranked_by_mean_float: Vec<StochasticNodeRow>,
}

impl StochasticReport {
    pub fn from_result(as_of: NaiveDate, result: &StochasticSchedule) -> Self {
        Self {
            as_of,
            particles: result.particles,
            seed: result.seed,
            best_case_end: result.best_case_end(),
            worst_case_end: result.worst_case_end(),
            ranked_by_mean_float: result
                .ranked_by_mean_float
                .iter()
                .map(|pid| {
                    let dist = &result.nodes[pid];
                    StochasticNodeRow {
                        pid: pid.clone(),
                        mean_float_days: dist.mean_float_days,
                        critical_fraction: dist.critical_fraction(),
                        earliest_es: dist.es.iter().min().copied().unwrap_or_default(),
                        latest_ef: dist.ef.iter().max().copied().unwrap_or_default(),
                    }
                })
                .collect(),
        }
    }
}

pub fn print_stochastic_text(report: &StochasticReport) {
    println!(
        "Monte Carlo schedule as of {} ({} particles, seed {})",
        report.as_of, report.particles, report.seed
    );
    if let (Some(best), Some(worst)) = (report.best_case_end, report.worst_case_end) {
        println!("Project end: {best} (best) .. {worst} (worst)");
    }
    println!();
    println!(
        "{:<12} {:>11} {:>9} {:>12} {:>12}",
        "process", "mean float", "critical", "earliest ES", "latest EF"
    );
    for node in &report.ranked_by_mean_float {
        println!(
            "{:<12} {:>11.2} {:>8.0}% {:>12} {:>12}",
            node.pid,
            node.mean_float_days,
            node.critical_fraction * 100.0,
            node.earliest_es,
            node.latest_ef,
        );
    }
}

/// Demand curve report; curves are daily samples from `window_start`.
#[derive(Debug, Serialize)]
pub struct DemandReport {
    pub as_of: NaiveDate,
    pub weighted: bool,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub hours_per_role: std::collections::BTreeMap<String, Vec<f64>>,
    pub hours_per_resource: std::collections::BTreeMap<String, Vec<f64>>,
    pub cumulative_cost_per_resource: std::collections::BTreeMap<String, Vec<f64>>,
}

impl DemandReport {
    pub fn from_curves(as_of: NaiveDate, weighted: bool, curves: &DemandCurves) -> Self {
        Self {
            as_of,
            weighted,
            window_start: curves.window_start,
            window_end: curves.window_end,
            hours_per_role: curves.hours_per_role.clone(),
            hours_per_resource: curves.hours_per_resource.clone(),
            cumulative_cost_per_resource: curves.cumulative_cost_per_resource.clone(),
        }
    }
}

pub fn print_demand_text(report: &DemandReport) {
    println!(
        "Demand{} over [{} .. {})",
        if report.weighted { " (probability weighted)" } else { "" },
        report.window_start,
        report.window_end
    );
    println!();
    println!("Total hours per role:");
    for (role, curve) in &report.hours_per_role {
        println!("  {:<20} {:>10.1} h", role, curve.iter().sum::<f64>());
    }
    println!();
    println!("Total hours per resource:");
    for (rid, curve) in &report.hours_per_resource {
        println!("  {:<20} {:>10.1} h", rid, curve.iter().sum::<f64>());
    }
    println!();
    println!("Final cost per resource:");
    for (rid, curve) in &report.cumulative_cost_per_resource {
        println!(
            "  {:<20} {:>12.2} $",
            rid,
            curve.last().copied().unwrap_or(0.0)
        );
    }
}

/// Timeline-evolution report.
#[derive(Debug, Serialize)]
pub struct EvolutionReport {
    pub points: Vec<EvolutionRow>,
}

#[derive(Debug, Serialize)]
pub struct EvolutionRow {
    pub observed_on: NaiveDate,
    pub predicted_end: NaiveDate,
}

impl EvolutionReport {
    pub fn from_points(points: &[EvolutionPoint]) -> Self {
        Self {
            points: points
                .iter()
                .map(|p| EvolutionRow {
                    observed_on: p.observed_on,
                    predicted_end: p.predicted_end,
                })
                .collect(),
        }
    }
}

pub fn print_evolution_text(report: &EvolutionReport) {
    println!("{:<14} {}", "observed on", "predicted end");
    for row in &report.points {
        println!("{:<14} {}", row.observed_on, row.predicted_end);
    }
}

/// Burn-down report: per tracking label, story points per day.
#[derive(Debug, Serialize)]
pub struct BurndownReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub labels: std::collections::BTreeMap<String, Vec<f64>>,
}

impl BurndownReport {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            labels: std::collections::BTreeMap::new(),
        }
    }

    pub fn add_label(&mut self, label: &str, curve: &[leadtime_tickets::BurndownPoint]) {
        self.labels.insert(
            label.to_string(),
            curve.iter().map(|p| p.story_points).collect(),
        );
    }

    pub fn print_text(&self) {
        println!("Burn-down [{} .. {})", self.from, self.to);
        for (label, curve) in &self.labels {
            let peak = curve.iter().copied().fold(0.0_f64, f64::max);
            let latest = curve.last().copied().unwrap_or(0.0);
            println!("  {label:<20} peak {peak:>7.1} SP, latest {latest:>7.1} SP");
        }
    }
}
