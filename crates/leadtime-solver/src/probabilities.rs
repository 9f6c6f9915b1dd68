//! Start/success probability propagation.
//!
//! Each process carries a `success_prob` conditional on its predecessors
//! succeeding. Propagating in topological order gives every node an
//! unconditional start probability (all predecessors succeeded) and
//! success probability. The demand aggregator uses the start probability
//! for its weighted mode.

use std::collections::BTreeMap;

use leadtime_core::Pid;

use crate::graph::PlanGraph;

/// Unconditional probabilities per process.
#[derive(Clone, Debug, Default)]
pub struct EventProbabilities {
    /// Probability all predecessors succeed
    pub start_prob: BTreeMap<Pid, f64>,
    /// Probability the process itself succeeds
    pub success: BTreeMap<Pid, f64>,
}

impl EventProbabilities {
    pub fn start_prob_of(&self, pid: &str) -> f64 {
        self.start_prob.get(pid).copied().unwrap_or(1.0)
    }
}

/// Propagate probabilities through the graph.
pub fn event_probabilities(graph: &PlanGraph) -> EventProbabilities {
    let mut out = EventProbabilities::default();
    for pid in &graph.topo_order {
        let node = graph.node(pid).expect("topo order references known node");
        let start: f64 = graph.predecessors[pid]
            .iter()
            .map(|pred| out.success[pred])
            .product();
        let success = f64::from(node.record.success_prob) / 100.0 * start;
        out.start_prob.insert(pid.clone(), start);
        out.success.insert(pid.clone(), success);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use leadtime_core::{EstimateRecord, ProjectDocument};

    #[test]
    fn probabilities_multiply_along_paths() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let mut doc = ProjectDocument::new(start.and_hms_opt(0, 0, 0).unwrap());
        doc.upsert_process(
            "A".into(),
            EstimateRecord::new("A").success_prob(50),
            start,
        )
        .unwrap();
        doc.upsert_process(
            "B".into(),
            EstimateRecord::new("B").success_prob(80).depends_on("A"),
            start,
        )
        .unwrap();
        doc.upsert_process(
            "C".into(),
            EstimateRecord::new("C").depends_on("A").depends_on("B"),
            start,
        )
        .unwrap();
        let graph = PlanGraph::build(&doc, start).unwrap();

        let probs = event_probabilities(&graph);
        assert_eq!(probs.start_prob_of("A"), 1.0);
        assert_eq!(probs.success["A"], 0.5);
        assert_eq!(probs.start_prob_of("B"), 0.5);
        assert_eq!(probs.success["B"], 0.4);
        // C needs both A and B to succeed
        assert_eq!(probs.start_prob_of("C"), 0.5 * 0.4);
        assert_eq!(probs.success["C"], 0.5 * 0.4);
    }

    #[test]
    fn root_nodes_start_with_certainty() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let mut doc = ProjectDocument::new(start.and_hms_opt(0, 0, 0).unwrap());
        doc.upsert_process("A".into(), EstimateRecord::new("A"), start)
            .unwrap();
        let graph = PlanGraph::build(&doc, start).unwrap();

        let probs = event_probabilities(&graph);
        assert_eq!(probs.start_prob_of("A"), 1.0);
        assert_eq!(probs.success["A"], 1.0);
    }
}
