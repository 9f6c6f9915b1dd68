//! Monte Carlo mode through the public scheduling API.

use chrono::NaiveDate;
use leadtime_core::{EstimateRecord, ProjectDocument};
use leadtime_solver::{
    schedule, CancelToken, ScheduleError, ScheduleMode, ScheduleOutcome, SchedulerOptions,
    StochasticSchedule,
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn document() -> ProjectDocument {
    let start = ymd(2024, 1, 1);
    let mut doc = ProjectDocument::new(start.and_hms_opt(0, 0, 0).unwrap());
    doc.upsert_process(
        "A".into(),
        EstimateRecord::new("A").duration_interval(2, 4, 8),
        start,
    )
    .unwrap();
    doc.upsert_process(
        "B".into(),
        EstimateRecord::new("B").duration_interval(3, 6, 10).depends_on("A"),
        start,
    )
    .unwrap();
    doc.upsert_process(
        "C".into(),
        EstimateRecord::new("C").duration_interval(1, 2, 3).depends_on("A"),
        start,
    )
    .unwrap();
    doc
}

fn run(doc: &ProjectDocument, options: &SchedulerOptions) -> StochasticSchedule {
    match schedule(doc, ymd(2024, 1, 1), options, &CancelToken::new()).unwrap() {
        ScheduleOutcome::Stochastic(result) => result,
        other => panic!("expected stochastic outcome, got {other:?}"),
    }
}

#[test]
fn same_seed_reproduces_every_distribution() {
    let doc = document();
    let options = SchedulerOptions::stochastic(200, 1234);

    let first = run(&doc, &options);
    let second = run(&doc, &options);

    assert_eq!(first.project_end, second.project_end);
    for (pid, dist) in &first.nodes {
        let other = &second.nodes[pid];
        assert_eq!(dist.es, other.es);
        assert_eq!(dist.ef, other.ef);
        assert_eq!(dist.ls, other.ls);
        assert_eq!(dist.lf, other.lf);
        assert_eq!(dist.total_float_days, other.total_float_days);
    }
    assert_eq!(first.ranked_by_mean_float, second.ranked_by_mean_float);
}

#[test]
fn every_particle_is_a_valid_schedule() {
    let doc = document();
    let result = run(&doc, &SchedulerOptions::stochastic(100, 7));

    let a = &result.nodes["A"];
    let b = &result.nodes["B"];
    for particle in 0..result.project_end.len() {
        // B never starts before A finishes, in any particle
        assert!(a.ef[particle] <= b.es[particle]);
        // Project end dominates every finish
        assert!(b.ef[particle] <= result.project_end[particle]);
    }
}

#[test]
fn project_end_spans_the_interval_extremes() {
    let doc = document();
    let result = run(&doc, &SchedulerOptions::stochastic(300, 99));

    // Best case: A=2, B=3 => 5 business days from Mon Jan 1
    // Worst case: A=8, B=10 => 18 business days
    let best = result.best_case_end().unwrap();
    let worst = result.worst_case_end().unwrap();
    assert!(best >= ymd(2024, 1, 8));
    assert!(worst <= ymd(2024, 1, 25));
    assert!(best < worst);
}

#[test]
fn slack_branch_ranks_after_critical_branch() {
    let doc = document();
    let result = run(&doc, &SchedulerOptions::stochastic(200, 5));
    // C is the short parallel branch; its mean float dominates
    assert_eq!(result.ranked_by_mean_float.last().unwrap(), "C");
    assert!(result.nodes["C"].mean_float_days > result.nodes["B"].mean_float_days);
}

#[test]
fn stochastic_mode_respects_terminals() {
    let doc = document();
    let options = SchedulerOptions {
        mode: ScheduleMode::Stochastic {
            particles: 50,
            seed: 42,
        },
        terminals: vec!["C".into()],
    };
    let result = run(&doc, &options);

    assert!(result.nodes.contains_key("A"));
    assert!(result.nodes.contains_key("C"));
    assert!(!result.nodes.contains_key("B"));
}

#[test]
fn cancellation_surfaces_as_error() {
    let doc = document();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = schedule(
        &doc,
        ymd(2024, 1, 1),
        &SchedulerOptions::stochastic(100, 42),
        &cancel,
    );
    assert!(matches!(result, Err(ScheduleError::CancelRequested)));
}
