//! Full runs over deterministic entropy scripts.

use flipstat::entropy::{RandomBitSource, ReplayEntropy};
use flipstat::metrics::{MetricsRegistry, MetricsSnapshot};
use flipstat::session::{
    CancellationToken, ComparisonOrchestrator, Label, SessionError, SessionRunner,
};
use flipstat::{two_sample, RunConfig};

fn runner(script: Vec<u8>) -> SessionRunner<ReplayEntropy> {
    SessionRunner::new(RandomBitSource::new(ReplayEntropy::new(script)))
}

#[test]
fn balanced_script_gives_null_result() {
    // 25,000 ones then 25,000 zeros
    let mut runner = SessionRunner::new(RandomBitSource::new(ReplayEntropy::with_counts(
        25_000, 25_000,
    )));
    let token = CancellationToken::new();

    let result = runner.run(Label::Focus, 50_000, &token, |_| {}).unwrap();

    assert_eq!(result.hits(), 25_000);
    assert_eq!(result.rate(), 0.5);
    assert_eq!(result.z(), 0.0);
    assert!((result.p() - 1.0).abs() < 1e-6);
}

#[test]
fn comparison_of_skewed_focus_against_fair_control() {
    // Focus: 5,400 heads of 10,000; Control: 5,000 of 10,000
    let mut script = vec![1u8; 5_400];
    script.resize(10_000, 0);
    script.extend(std::iter::repeat(1u8).take(5_000));
    script.resize(20_000, 0);

    let mut orchestrator = ComparisonOrchestrator::new(runner(script));
    let token = CancellationToken::new();

    let report = orchestrator.run_both(10_000, &token, |_| {}).unwrap();

    assert_eq!(report.focus.hits(), 5_400);
    assert_eq!(report.control.hits(), 5_000);

    let cmp = report.comparison;
    assert!((cmp.diff - 0.04).abs() < 1e-12);
    assert!(cmp.z.is_finite() && cmp.z > 0.0);
    assert!(cmp.p.is_finite() && cmp.p < 0.001);
    assert_eq!(cmp, two_sample(&report.focus, &report.control));
}

#[test]
fn cancellation_from_another_thread_yields_no_result() {
    let token = CancellationToken::new();
    let handle = token.clone();
    let mut runner = runner(vec![1, 0, 0, 1]);
    let mut checkpoints = 0u64;

    let result = runner.run(Label::Control, 10_000_000, &token, |_| {
        checkpoints += 1;
        if checkpoints == 3 {
            let handle = handle.clone();
            std::thread::spawn(move || handle.cancel()).join().unwrap();
        }
    });

    assert!(matches!(result, Err(SessionError::Cancelled)));
    assert_eq!(checkpoints, 3);
    assert_eq!(runner.bits().bits_consumed(), 750);
}

#[test]
fn cancelled_comparison_needs_fresh_token() {
    let token = CancellationToken::new();
    token.cancel();
    let mut orchestrator = ComparisonOrchestrator::new(runner(vec![1, 0]));

    let err = orchestrator.run_both(1_000, &token, |_| {}).unwrap_err();
    assert!(err.is_cancelled());

    let fresh = CancellationToken::new();
    let report = orchestrator.run_both(1_000, &fresh, |_| {}).unwrap();
    assert_eq!(report.focus.hits(), 500);
    assert_eq!(report.control.hits(), 500);
}

#[test]
fn caller_clamps_before_running() {
    let config = RunConfig::default();
    let trials = config.clamp_trials(10);
    let mut runner = runner(vec![1]);
    let token = CancellationToken::new();

    let result = runner.run(Label::Focus, trials, &token, |_| {}).unwrap();

    assert_eq!(result.trials(), 50);
}

#[test]
fn metrics_reflect_completed_sessions() {
    let mut orchestrator = ComparisonOrchestrator::new(runner(vec![1, 1, 0, 0]));
    let token = CancellationToken::new();
    let report = orchestrator.run_both(2_000, &token, |_| {}).unwrap();

    let registry = MetricsRegistry::new().unwrap();
    registry.update(&MetricsSnapshot::from_components(
        &[report.focus, report.control],
        0,
        orchestrator.runner().bits(),
    ));

    let output = registry.encode().unwrap();
    assert!(output.contains("flipstat_trials_total 4000"));
    assert!(output.contains("flipstat_hits_total 2000"));
    assert!(output.contains("flipstat_entropy_refills_total 1"));
}
