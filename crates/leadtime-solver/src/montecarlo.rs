//! Monte Carlo scheduling over per-process duration intervals.
//!
//! Each particle draws one duration per node, uniformly from the node's
//! `[optimistic_days, pessimistic_days]` interval, and runs the full
//! forward/backward pass with those draws. All nodes share the particle's
//! draw set, so correlations along a path are preserved within a particle.
//!
//! Particles are independent and run in parallel; determinism comes from
//! seeding each particle's generator with `seed + particle_index` and
//! aggregating in particle order, so the same `(seed, particles)` pair is
//! bit-identical regardless of thread count.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use leadtime_core::Pid;

use crate::cpm::{run_cpm, Schedule};
use crate::graph::PlanGraph;
use crate::{CancelToken, ScheduleError};

/// Empirical distribution of one node's schedule over all particles.
#[derive(Clone, Debug)]
pub struct NodeDistribution {
    pub pid: Pid,
    /// Earliest start per particle
    pub es: Vec<NaiveDate>,
    /// Earliest finish per particle
    pub ef: Vec<NaiveDate>,
    /// Latest start per particle
    pub ls: Vec<NaiveDate>,
    /// Latest finish per particle
    pub lf: Vec<NaiveDate>,
    /// Total float per particle, business days
    pub total_float_days: Vec<i64>,
    /// Mean of `total_float_days`
    pub mean_float_days: f64,
}

impl NodeDistribution {
    /// Fraction of particles in which this node had zero float.
    pub fn critical_fraction(&self) -> f64 {
        if self.total_float_days.is_empty() {
            return 0.0;
        }
        let zero = self.total_float_days.iter().filter(|&&f| f == 0).count();
        zero as f64 / self.total_float_days.len() as f64
    }
}

/// Result of a Monte Carlo run.
#[derive(Clone, Debug)]
pub struct StochasticSchedule {
    /// Per-node empirical distributions
    pub nodes: BTreeMap<Pid, NodeDistribution>,
    /// Nodes ordered by ascending mean float; the stochastic analogue of
    /// the critical path
    pub ranked_by_mean_float: Vec<Pid>,
    /// Project end per particle
    pub project_end: Vec<NaiveDate>,
    pub particles: u32,
    pub seed: u64,
}

impl StochasticSchedule {
    /// Latest project end observed across particles.
    pub fn worst_case_end(&self) -> Option<NaiveDate> {
        self.project_end.iter().max().copied()
    }

    /// Earliest project end observed across particles.
    pub fn best_case_end(&self) -> Option<NaiveDate> {
        self.project_end.iter().min().copied()
    }
}

/// Run `particles` particles over the graph.
///
/// Cancellation is checked per particle; a cancelled run returns
/// [`ScheduleError::CancelRequested`] and produces nothing.
pub fn simulate(
    graph: &PlanGraph,
    particles: u32,
    seed: u64,
    cancel: &CancelToken,
) -> Result<StochasticSchedule, ScheduleError> {
    let passes: Vec<Schedule> = (0..particles)
        .into_par_iter()
        .map(|particle| {
            if cancel.is_cancelled() {
                return Err(ScheduleError::CancelRequested);
            }
            let durations = draw_durations(graph, seed.wrapping_add(u64::from(particle)));
            Ok(run_cpm(graph, |node| durations[&node.pid]))
        })
        .collect::<Result<_, _>>()?;

    let mut nodes: BTreeMap<Pid, NodeDistribution> = graph
        .nodes
        .iter()
        .map(|node| {
            (
                node.pid.clone(),
                NodeDistribution {
                    pid: node.pid.clone(),
                    es: Vec::with_capacity(passes.len()),
                    ef: Vec::with_capacity(passes.len()),
                    ls: Vec::with_capacity(passes.len()),
                    lf: Vec::with_capacity(passes.len()),
                    total_float_days: Vec::with_capacity(passes.len()),
                    mean_float_days: 0.0,
                },
            )
        })
        .collect();
    let mut project_end = Vec::with_capacity(passes.len());

    for pass in &passes {
        project_end.push(pass.project_end);
        for (pid, node) in &pass.nodes {
            let dist = nodes.get_mut(pid).expect("pass nodes come from the graph");
            dist.es.push(node.es);
            dist.ef.push(node.ef);
            dist.ls.push(node.ls);
            dist.lf.push(node.lf);
            dist.total_float_days.push(node.total_float_days);
        }
    }

    for dist in nodes.values_mut() {
        if !dist.total_float_days.is_empty() {
            dist.mean_float_days = dist.total_float_days.iter().sum::<i64>() as f64
                / dist.total_float_days.len() as f64;
        }
    }

    let mut ranked: Vec<Pid> = nodes.keys().cloned().collect();
    ranked.sort_by(|a, b| {
        nodes[a]
            .mean_float_days
            .partial_cmp(&nodes[b].mean_float_days)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(b))
    });

    Ok(StochasticSchedule {
        nodes,
        ranked_by_mean_float: ranked,
        project_end,
        particles,
        seed,
    })
}

/// One duration draw per node, in a fixed node order so the sequence of
/// generator calls is reproducible.
fn draw_durations(graph: &PlanGraph, particle_seed: u64) -> HashMap<Pid, u32> {
    let mut rng = ChaCha8Rng::seed_from_u64(particle_seed);
    graph
        .nodes
        .iter()
        .map(|node| {
            let lo = node.record.optimistic_days;
            let hi = node.record.pessimistic_days;
            let duration = if lo >= hi { lo } else { rng.gen_range(lo..=hi) };
            (node.pid.clone(), duration)
        })
        .collect()
}
