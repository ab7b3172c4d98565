//! Metrics collection and registry.

use crate::entropy::{EntropySource, RandomBitSource};
use crate::session::{Progress, SessionResult};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of run state for metrics update.
///
/// Counter fields are cumulative totals; the registry applies only the
/// increase since the previous update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Flips drawn, including those of the session in progress.
    pub trials_total: u64,
    /// Heads among the flips drawn.
    pub hits_total: u64,
    pub sessions_completed: u64,
    pub sessions_cancelled: u64,
    /// z-score of the most recent session.
    pub last_z: Option<f64>,
    /// p-value of the most recent session.
    pub last_p: Option<f64>,
    /// Entropy buffer refills.
    pub entropy_refills: u64,
    /// Whether the degraded fallback source is in use.
    pub entropy_insecure: bool,
}

/// Prometheus metrics registry for flip runs.
pub struct MetricsRegistry {
    registry: Registry,

    // Session metrics
    trials_total: IntCounter,
    hits_total: IntCounter,
    sessions_completed: IntCounter,
    sessions_cancelled: IntCounter,

    // Statistics of the latest session
    last_z: Gauge,
    last_p: Gauge,

    // Entropy metrics
    entropy_refills: IntCounter,
    entropy_insecure: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all flip metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let trials_total = IntCounter::new(
            "flipstat_trials_total",
            "Total flips drawn",
        )?;
        let hits_total = IntCounter::new(
            "flipstat_hits_total",
            "Total heads among flips drawn",
        )?;
        let sessions_completed = IntCounter::new(
            "flipstat_sessions_completed_total",
            "Sessions that ran to completion",
        )?;
        let sessions_cancelled = IntCounter::new(
            "flipstat_sessions_cancelled_total",
            "Sessions ended by cancellation",
        )?;

        let last_z = Gauge::new("flipstat_last_z", "z-score of the most recent session")?;
        let last_p = Gauge::new(
            "flipstat_last_p",
            "Two-tailed p-value of the most recent session",
        )?;

        let entropy_refills = IntCounter::new(
            "flipstat_entropy_refills_total",
            "Entropy buffer refills",
        )?;
        let entropy_insecure = IntGauge::new(
            "flipstat_entropy_insecure",
            "1 if the non-secure fallback entropy source is active",
        )?;

        registry.register(Box::new(trials_total.clone()))?;
        registry.register(Box::new(hits_total.clone()))?;
        registry.register(Box::new(sessions_completed.clone()))?;
        registry.register(Box::new(sessions_cancelled.clone()))?;
        registry.register(Box::new(last_z.clone()))?;
        registry.register(Box::new(last_p.clone()))?;
        registry.register(Box::new(entropy_refills.clone()))?;
        registry.register(Box::new(entropy_insecure.clone()))?;

        Ok(Self {
            registry,
            trials_total,
            hits_total,
            sessions_completed,
            sessions_cancelled,
            last_z,
            last_p,
            entropy_refills,
            entropy_insecure,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.trials_total, snapshot.trials_total);
        advance(&self.hits_total, snapshot.hits_total);
        advance(&self.sessions_completed, snapshot.sessions_completed);
        advance(&self.sessions_cancelled, snapshot.sessions_cancelled);
        advance(&self.entropy_refills, snapshot.entropy_refills);

        if let Some(z) = snapshot.last_z {
            self.last_z.set(z);
        }
        if let Some(p) = snapshot.last_p {
            self.last_p.set(p);
        }

        self.entropy_insecure.set(i64::from(snapshot.entropy_insecure));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Moves a counter forward to `target`. Counters never go back.
fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsSnapshot {
    /// Builds a snapshot from finished sessions and the bit source.
    pub fn from_components<S: EntropySource>(
        results: &[SessionResult],
        sessions_cancelled: u64,
        bits: &RandomBitSource<S>,
    ) -> Self {
        let last = results.last();

        Self {
            trials_total: results.iter().map(SessionResult::trials).sum(),
            hits_total: results.iter().map(SessionResult::hits).sum(),
            sessions_completed: results.len() as u64,
            sessions_cancelled,
            last_z: last.map(SessionResult::z),
            last_p: last.map(SessionResult::p),
            entropy_refills: bits.refills(),
            entropy_insecure: !bits.is_secure(),
        }
    }
}

/// Pushes checkpoint reports into a shared registry while sessions run.
///
/// Flips of the session in flight are added to those of the sessions
/// before it, so the exported totals move at every checkpoint rather
/// than only when the run returns.
pub struct ProgressRecorder {
    registry: Arc<MetricsRegistry>,
    snapshot: MetricsSnapshot,
    closed_trials: u64,
    closed_hits: u64,
    current: Option<Progress>,
}

impl ProgressRecorder {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self {
            registry,
            snapshot: MetricsSnapshot::default(),
            closed_trials: 0,
            closed_hits: 0,
            current: None,
        }
    }

    /// Records one progress report and updates the registry.
    pub fn record(&mut self, progress: &Progress) {
        if let Some(prev) = self.current {
            // A finished report, a label change or a count going back
            // means a new session has started.
            if prev.is_complete()
                || prev.label != progress.label
                || progress.completed < prev.completed
            {
                self.closed_trials += prev.completed;
                self.closed_hits += prev.hits;
            }
        }
        self.current = Some(*progress);

        self.snapshot.trials_total = self.closed_trials + progress.completed;
        self.snapshot.hits_total = self.closed_hits + progress.hits;
        self.registry.update(&self.snapshot);
    }

    /// Records the end of the run: session outcomes and entropy counters.
    pub fn finish<S: EntropySource>(
        &mut self,
        results: &[SessionResult],
        sessions_cancelled: u64,
        bits: &RandomBitSource<S>,
    ) {
        let totals = MetricsSnapshot::from_components(results, sessions_cancelled, bits);
        self.snapshot = MetricsSnapshot {
            trials_total: self.snapshot.trials_total.max(totals.trials_total),
            hits_total: self.snapshot.hits_total.max(totals.hits_total),
            ..totals
        };
        self.registry.update(&self.snapshot);
    }

    /// The totals last pushed to the registry.
    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::ReplayEntropy;
    use crate::session::{CancellationToken, ComparisonOrchestrator, Label, SessionRunner};

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            trials_total: 200_000,
            hits_total: 100_321,
            sessions_completed: 2,
            sessions_cancelled: 1,
            last_z: Some(1.5),
            last_p: Some(0.13),
            entropy_refills: 4,
            entropy_insecure: false,
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("flipstat_trials_total 200000"));
        assert!(output.contains("flipstat_sessions_completed_total 2"));
        assert!(output.contains("flipstat_sessions_cancelled_total 1"));
        assert!(output.contains("flipstat_last_z 1.5"));
        assert!(output.contains("flipstat_entropy_insecure 0"));
    }

    #[test]
    fn test_counters_only_advance() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            trials_total: 1_000,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            trials_total: 500,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("flipstat_trials_total 1000"));
    }

    #[test]
    fn test_snapshot_from_components() {
        let bits = RandomBitSource::new(ReplayEntropy::new(vec![1]));
        let results = vec![
            SessionResult::from_counts(Label::Focus, 60, 100),
            SessionResult::from_counts(Label::Control, 45, 100),
        ];

        let snapshot = MetricsSnapshot::from_components(&results, 0, &bits);

        assert_eq!(snapshot.trials_total, 200);
        assert_eq!(snapshot.hits_total, 105);
        assert_eq!(snapshot.sessions_completed, 2);
        assert_eq!(snapshot.last_z, Some(results[1].z()));
        // Replay scripts are not secure
        assert!(snapshot.entropy_insecure);
    }

    #[test]
    fn test_recorder_updates_registry_before_comparison_returns() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut recorder = ProgressRecorder::new(Arc::clone(&registry));
        let bits = RandomBitSource::with_chunk_size(ReplayEntropy::new(vec![1, 0]), 4096).unwrap();
        let mut orchestrator = ComparisonOrchestrator::new(SessionRunner::new(bits));
        let token = CancellationToken::new();
        let mut at_control_start = None;

        let report = orchestrator
            .run_both(1_000, &token, |p| {
                recorder.record(p);
                if p.label == Label::Control && p.completed == 0 {
                    at_control_start = Some(registry.encode().unwrap());
                }
            })
            .unwrap();

        // Focus is fully visible while Control has yet to draw
        let mid = at_control_start.unwrap();
        assert!(mid.contains("flipstat_trials_total 1000\n"));
        assert!(mid.contains("flipstat_hits_total 500\n"));
        assert!(mid.contains("flipstat_sessions_completed_total 0\n"));

        recorder.finish(
            &[report.focus, report.control],
            0,
            orchestrator.runner().bits(),
        );

        let end = registry.encode().unwrap();
        assert!(end.contains("flipstat_trials_total 2000\n"));
        assert!(end.contains("flipstat_hits_total 1000\n"));
        assert!(end.contains("flipstat_sessions_completed_total 2\n"));
        assert!(end.contains("flipstat_entropy_refills_total 1\n"));
    }

    #[test]
    fn test_recorder_folds_back_to_back_sessions() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut recorder = ProgressRecorder::new(Arc::clone(&registry));

        for hits in [60, 40] {
            recorder.record(&Progress {
                label: Label::Focus,
                completed: 100,
                total: 100,
                hits,
            });
        }

        assert_eq!(recorder.snapshot().trials_total, 200);
        assert_eq!(recorder.snapshot().hits_total, 100);
    }

    #[test]
    fn test_recorder_keeps_flips_of_cancelled_session() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut recorder = ProgressRecorder::new(Arc::clone(&registry));
        let bits = RandomBitSource::new(ReplayEntropy::new(vec![1]));

        recorder.record(&Progress {
            label: Label::Focus,
            completed: 250,
            total: 1_000,
            hits: 250,
        });
        recorder.finish(&[], 1, &bits);

        let output = registry.encode().unwrap();
        assert!(output.contains("flipstat_trials_total 250\n"));
        assert!(output.contains("flipstat_sessions_cancelled_total 1\n"));
        assert!(output.contains("flipstat_sessions_completed_total 0\n"));
    }
}
