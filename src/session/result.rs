//! Session labels, results and progress reports.

use crate::stats::{one_sample, ComparisonResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Experimental condition of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Focus,
    Control,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Focus => f.write_str("Focus"),
            Self::Control => f.write_str("Control"),
        }
    }
}

/// Outcome of a completed session.
///
/// Fields are private so `rate`, `z` and `p` always agree with
/// `hits` and `trials`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResult {
    label: Label,
    trials: u64,
    hits: u64,
    rate: f64,
    z: f64,
    p: f64,
    completed_at: DateTime<Utc>,
}

impl SessionResult {
    /// Builds a result from raw counts.
    ///
    /// `hits` is capped at `trials`. With `trials == 0` the rate and
    /// statistics are NaN.
    pub fn from_counts(label: Label, hits: u64, trials: u64) -> Self {
        let hits = hits.min(trials);
        let test = one_sample(hits, trials);

        Self {
            label,
            trials,
            hits,
            rate: hits as f64 / trials as f64,
            z: test.z,
            p: test.p,
            completed_at: Utc::now(),
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    /// Number of flips, `n`.
    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Proportion of heads, `hits / trials`.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// True if the deviation from 50% is significant at `alpha`.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p.is_finite() && self.p < alpha
    }
}

/// Both sessions of a comparison and their two-sample test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub focus: SessionResult,
    pub control: SessionResult,
    pub comparison: ComparisonResult,
}

/// Progress of the running session, reported at checkpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub label: Label,
    /// Trials completed so far.
    pub completed: u64,
    pub total: u64,
    /// Running hit count, non-decreasing within a session.
    pub hits: u64,
}

impl Progress {
    /// A fresh report for a session that has not drawn yet.
    pub fn start(label: Label, total: u64) -> Self {
        Self {
            label,
            completed: 0,
            total,
            hits: 0,
        }
    }

    /// Completed fraction in [0, 1].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Human-readable running tally.
    pub fn status(&self) -> String {
        let rate = if self.completed == 0 {
            0.0
        } else {
            100.0 * self.hits as f64 / self.completed as f64
        };
        format!(
            "{}: {}/{} flips, {} heads ({:.2}%)",
            self.label, self.completed, self.total, self.hits, rate
        )
    }

    /// True once every trial has been drawn.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}
