//! One- and two-sample z-tests on flip proportions.
//!
//! Both tests use the normal approximation to the binomial and report
//! two-tailed p-values. Degenerate inputs produce non-finite values
//! rather than errors.

use super::normal::two_tailed_p;
use crate::session::SessionResult;
use serde::Serialize;

/// Result of testing a hit count against a 50% null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OneSampleTest {
    /// Standardized deviation of the hit count from `n / 2`.
    pub z: f64,
    /// Two-tailed p-value of `z`.
    pub p: f64,
}

impl OneSampleTest {
    /// True if `p < alpha`. Non-finite p is never significant.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p.is_finite() && self.p < alpha
    }
}

/// Two-sample comparison of heads proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// `rate_a - rate_b`.
    pub diff: f64,
    /// `diff` over the unpooled standard error.
    pub z: f64,
    /// Two-tailed p-value of `z`; NaN when degenerate.
    pub p: f64,
}

impl ComparisonResult {
    /// True when the standard error was zero (every rate is 0 or 1).
    ///
    /// `z` is then `diff / 0.0` (NaN or infinite) and `p` is NaN.
    pub fn is_degenerate(&self) -> bool {
        !self.z.is_finite()
    }

    /// True if `p < alpha`. Degenerate comparisons are never significant.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p.is_finite() && self.p < alpha
    }
}

/// Tests `hits` out of `trials` against a fair coin.
///
/// z = (hits - n/2) / sqrt(n/4). Callers must pass `trials > 0`; zero
/// trials yields NaN for both values.
pub fn one_sample(hits: u64, trials: u64) -> OneSampleTest {
    let n = trials as f64;
    let z = (hits as f64 - 0.5 * n) / (0.25 * n).sqrt();

    OneSampleTest {
        z,
        p: two_tailed_p(z),
    }
}

/// Compares the heads proportions of two sessions.
pub fn two_sample(a: &SessionResult, b: &SessionResult) -> ComparisonResult {
    two_proportion(a.rate(), a.trials(), b.rate(), b.trials())
}

/// Unpooled two-proportion z-test on raw rates and sample sizes.
pub fn two_proportion(rate_a: f64, n_a: u64, rate_b: f64, n_b: u64) -> ComparisonResult {
    let diff = rate_a - rate_b;
    let var_a = rate_a * (1.0 - rate_a) / n_a as f64;
    let var_b = rate_b * (1.0 - rate_b) / n_b as f64;
    let se = (var_a + var_b).sqrt();

    if se == 0.0 {
        tracing::warn!(
            rate_a,
            rate_b,
            "Zero standard error in two-sample test; p is undefined"
        );
        return ComparisonResult {
            diff,
            z: diff / se,
            p: f64::NAN,
        };
    }

    let z = diff / se;
    ComparisonResult {
        diff,
        z,
        p: two_tailed_p(z),
    }
}
