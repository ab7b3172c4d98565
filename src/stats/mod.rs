//! Hypothesis tests on heads proportions.
//!
//! A closed-form normal approximation backs both the one-sample test
//! (observed rate vs. a fair coin) and the two-sample test (Focus vs.
//! Control). These are large-sample approximations, not exact binomial
//! tests.

mod hypothesis;
mod normal;

pub use hypothesis::{one_sample, two_proportion, two_sample, ComparisonResult, OneSampleTest};
pub use normal::{normal_cdf, two_tailed_p};
