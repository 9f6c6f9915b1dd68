//! As-of graph materialization.
//!
//! A [`PlanGraph`] is the DAG of processes as it was knowable on a given
//! observation date: each node carries the estimate record found by
//! infimum lookup into the process history, and processes whose history
//! starts later are absent entirely. Edges to absent processes are dropped
//! silently, so a plan may reference work that only gets defined later.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use leadtime_core::{EstimateRecord, Pid, ProjectDocument};

use crate::{ScheduleError, ScheduleWarning};

/// A process as known on the observation date.
#[derive(Clone, Debug)]
pub struct PlanNode {
    pub pid: Pid,
    /// The estimate record effective on the observation date
    pub record: EstimateRecord,
}

/// A flattened, schedulable DAG of processes.
#[derive(Clone, Debug)]
pub struct PlanGraph {
    /// Project start carried from the document
    pub start_date: NaiveDateTime,
    /// Observation date the graph was built for
    pub as_of: NaiveDate,
    /// All nodes, in document order
    pub nodes: Vec<PlanNode>,
    /// Node lookup by id
    index: HashMap<Pid, usize>,
    /// Edges predecessor -> successors
    pub successors: HashMap<Pid, Vec<Pid>>,
    /// Edges successor -> predecessors
    pub predecessors: HashMap<Pid, Vec<Pid>>,
    /// Topological order (computed once, reused by every pass)
    pub topo_order: Vec<Pid>,
    /// Degradations discovered during construction
    pub warnings: Vec<ScheduleWarning>,
}

impl PlanGraph {
    /// Materialize the graph that was knowable on `as_of`.
    ///
    /// Processes with a violated estimate invariant are excluded with a
    /// [`ScheduleWarning::MissingEstimate`]; a cycle in the resulting
    /// graph aborts with [`ScheduleError::CycleDetected`].
    pub fn build(document: &ProjectDocument, as_of: NaiveDate) -> Result<Self, ScheduleError> {
        let mut nodes = Vec::new();
        let mut warnings = Vec::new();

        for (pid, process) in &document.processes {
            let Some(record) = process.record_as_of(as_of) else {
                // Not yet defined on the observation date
                continue;
            };
            if let Err(issue) = record.validate() {
                warn!(%pid, %issue, "excluding process with invalid estimate");
                warnings.push(ScheduleWarning::MissingEstimate {
                    pid: pid.clone(),
                    field: issue.to_string(),
                });
                continue;
            }
            nodes.push(PlanNode {
                pid: pid.clone(),
                record: record.clone(),
            });
        }

        let index: HashMap<Pid, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.pid.clone(), i))
            .collect();

        let mut successors: HashMap<Pid, Vec<Pid>> = HashMap::new();
        let mut predecessors: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for node in &nodes {
            successors.entry(node.pid.clone()).or_default();
            predecessors.entry(node.pid.clone()).or_default();
        }

        for node in &nodes {
            for dep in &node.record.dependencies {
                if !index.contains_key(dep) {
                    // The predecessor is absent as of this date; the edge
                    // is dropped and the node schedules from what remains.
                    warnings.push(ScheduleWarning::UnknownReference {
                        pid: node.pid.clone(),
                        missing: dep.clone(),
                    });
                    continue;
                }
                successors.get_mut(dep).unwrap().push(node.pid.clone());
                predecessors.get_mut(&node.pid).unwrap().push(dep.clone());
            }
        }

        let topo_order = topological_sort(&nodes, &successors, &predecessors)?;

        Ok(Self {
            start_date: document.start_date,
            as_of,
            nodes,
            index,
            successors,
            predecessors,
            topo_order,
            warnings,
        })
    }

    /// Get a node by id.
    pub fn node(&self, pid: &str) -> Option<&PlanNode> {
        self.index.get(pid).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, pid: &str) -> bool {
        self.index.contains_key(pid)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Restrict to `terminals` and every ancestor of a terminal.
    ///
    /// Fails with the list of missing ids when any terminal is absent from
    /// this graph.
    pub fn restricted(&self, terminals: &[Pid]) -> Result<Self, Vec<Pid>> {
        let missing: Vec<Pid> = terminals
            .iter()
            .filter(|t| !self.index.contains_key(*t))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        // Reverse reachability from the terminal set
        let mut keep: HashSet<&Pid> = HashSet::new();
        let mut queue: VecDeque<&Pid> = terminals.iter().collect();
        while let Some(pid) = queue.pop_front() {
            if !keep.insert(pid) {
                continue;
            }
            if let Some(preds) = self.predecessors.get(pid) {
                queue.extend(preds.iter());
            }
        }

        let nodes: Vec<PlanNode> = self
            .nodes
            .iter()
            .filter(|node| keep.contains(&node.pid))
            .cloned()
            .collect();
        let index: HashMap<Pid, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.pid.clone(), i))
            .collect();
        let successors: HashMap<Pid, Vec<Pid>> = nodes
            .iter()
            .map(|node| {
                let succs = self.successors[&node.pid]
                    .iter()
                    .filter(|s| index.contains_key(*s))
                    .cloned()
                    .collect();
                (node.pid.clone(), succs)
            })
            .collect();
        let predecessors: HashMap<Pid, Vec<Pid>> = nodes
            .iter()
            .map(|node| (node.pid.clone(), self.predecessors[&node.pid].clone()))
            .collect();
        let topo_order: Vec<Pid> = self
            .topo_order
            .iter()
            .filter(|pid| index.contains_key(*pid))
            .cloned()
            .collect();

        Ok(Self {
            start_date: self.start_date,
            as_of: self.as_of,
            nodes,
            index,
            successors,
            predecessors,
            topo_order,
            warnings: self.warnings.clone(),
        })
    }
}

/// Kahn's algorithm; leftover nodes mean a cycle.
fn topological_sort(
    nodes: &[PlanNode],
    successors: &HashMap<Pid, Vec<Pid>>,
    predecessors: &HashMap<Pid, Vec<Pid>>,
) -> Result<Vec<Pid>, ScheduleError> {
    let mut in_degree: HashMap<&Pid, usize> = nodes
        .iter()
        .map(|node| (&node.pid, predecessors[&node.pid].len()))
        .collect();

    // Seed with zero in-degree nodes in document order so the result is
    // deterministic.
    let mut queue: VecDeque<&Pid> = nodes
        .iter()
        .map(|node| &node.pid)
        .filter(|pid| in_degree[*pid] == 0)
        .collect();

    let mut order: Vec<Pid> = Vec::with_capacity(nodes.len());
    while let Some(pid) = queue.pop_front() {
        order.push(pid.clone());
        for succ in &successors[pid] {
            let degree = in_degree.get_mut(succ).unwrap();
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(succ);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck = nodes
            .iter()
            .map(|node| &node.pid)
            .find(|pid| !order.contains(*pid))
            .cloned()
            .unwrap_or_default();
        return Err(ScheduleError::CycleDetected(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadtime_core::EstimateRecord;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn doc_with(entries: &[(&str, NaiveDate, EstimateRecord)]) -> ProjectDocument {
        let mut doc = ProjectDocument::new(ymd(2024, 1, 8).and_hms_opt(0, 0, 0).unwrap());
        for (pid, date, record) in entries {
            doc.upsert_process((*pid).into(), record.clone(), *date)
                .unwrap();
        }
        doc
    }

    #[test]
    fn infimum_lookup_selects_effective_record() {
        let mut doc = doc_with(&[(
            "X",
            ymd(2024, 1, 5),
            EstimateRecord::new("X").duration_days(5),
        )]);
        doc.upsert_process(
            "X".into(),
            EstimateRecord::new("X").duration_days(10),
            ymd(2024, 2, 1),
        )
        .unwrap();

        let mid = PlanGraph::build(&doc, ymd(2024, 1, 20)).unwrap();
        assert_eq!(mid.node("X").unwrap().record.duration_days, 5);

        let late = PlanGraph::build(&doc, ymd(2024, 2, 15)).unwrap();
        assert_eq!(late.node("X").unwrap().record.duration_days, 10);

        let early = PlanGraph::build(&doc, ymd(2024, 1, 1)).unwrap();
        assert!(!early.contains("X"));
        assert!(early.is_empty());
    }

    #[test]
    fn edges_to_absent_processes_are_dropped() {
        // B depends on A, but A only enters the plan later
        let doc = doc_with(&[
            ("B", ymd(2024, 1, 8), EstimateRecord::new("B").depends_on("A")),
            ("A", ymd(2024, 2, 1), EstimateRecord::new("A")),
        ]);

        let graph = PlanGraph::build(&doc, ymd(2024, 1, 10)).unwrap();
        assert!(graph.contains("B"));
        assert!(!graph.contains("A"));
        assert!(graph.predecessors["B"].is_empty());
        assert!(graph.warnings.iter().any(|w| matches!(
            w,
            ScheduleWarning::UnknownReference { pid, missing } if pid == "B" && missing == "A"
        )));
    }

    #[test]
    fn invalid_estimate_excludes_only_that_node() {
        let mut bad = EstimateRecord::new("Bad").duration_interval(2, 5, 15);
        bad.pessimistic_days = 1;
        let doc = doc_with(&[
            ("G", ymd(2024, 1, 8), EstimateRecord::new("Good").duration_days(3)),
            ("X", ymd(2024, 1, 8), bad),
        ]);

        let graph = PlanGraph::build(&doc, ymd(2024, 1, 10)).unwrap();
        assert!(graph.contains("G"));
        assert!(!graph.contains("X"));
        assert!(graph
            .warnings
            .iter()
            .any(|w| matches!(w, ScheduleWarning::MissingEstimate { pid, .. } if pid == "X")));
    }

    #[test]
    fn topo_order_respects_edges() {
        let doc = doc_with(&[
            ("A", ymd(2024, 1, 8), EstimateRecord::new("A")),
            ("B", ymd(2024, 1, 8), EstimateRecord::new("B").depends_on("A")),
            ("C", ymd(2024, 1, 8), EstimateRecord::new("C").depends_on("B")),
        ]);

        let graph = PlanGraph::build(&doc, ymd(2024, 1, 10)).unwrap();
        let pos = |pid: &str| graph.topo_order.iter().position(|p| p == pid).unwrap();
        assert!(pos("A") < pos("B"));
        assert!(pos("B") < pos("C"));
    }

    #[test]
    fn cycle_across_history_dates_is_caught_at_build_time() {
        // Neither upsert sees both edges at once: A -> B is written while B
        // has no record yet, then B -> A is backdated to before A existed.
        // Only a later as-of graph, where both records are effective, holds
        // the cycle.
        let mut doc = ProjectDocument::new(ymd(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap());
        doc.upsert_process(
            "A".into(),
            EstimateRecord::new("A").depends_on("B"),
            ymd(2024, 1, 8),
        )
        .unwrap();
        doc.upsert_process(
            "B".into(),
            EstimateRecord::new("B").depends_on("A"),
            ymd(2024, 1, 1),
        )
        .unwrap();

        // Before A exists the edge to it is dropped and B stands alone
        let early = PlanGraph::build(&doc, ymd(2024, 1, 5)).unwrap();
        assert!(early.contains("B"));
        assert!(!early.contains("A"));

        // Once both records are effective the cycle is real
        let result = PlanGraph::build(&doc, ymd(2024, 1, 8));
        assert!(matches!(result, Err(ScheduleError::CycleDetected(_))));
    }

    #[test]
    fn restriction_keeps_terminals_and_ancestors() {
        let doc = doc_with(&[
            ("A", ymd(2024, 1, 8), EstimateRecord::new("A")),
            ("B", ymd(2024, 1, 8), EstimateRecord::new("B").depends_on("A")),
            ("C", ymd(2024, 1, 8), EstimateRecord::new("C").depends_on("B")),
            ("D", ymd(2024, 1, 8), EstimateRecord::new("D").depends_on("A")),
            ("E", ymd(2024, 1, 8), EstimateRecord::new("E").depends_on("D")),
        ]);

        let graph = PlanGraph::build(&doc, ymd(2024, 1, 10)).unwrap();
        let sub = graph.restricted(&["C".into()]).unwrap();
        assert!(sub.contains("A") && sub.contains("B") && sub.contains("C"));
        assert!(!sub.contains("D") && !sub.contains("E"));
        assert_eq!(sub.len(), 3);
    }

    #[test]
    fn restriction_reports_missing_terminals() {
        let doc = doc_with(&[("A", ymd(2024, 1, 8), EstimateRecord::new("A"))]);
        let graph = PlanGraph::build(&doc, ymd(2024, 1, 10)).unwrap();
        let missing = graph.restricted(&["Z".into()]).unwrap_err();
        assert_eq!(missing, vec!["Z".to_string()]);
    }
}
