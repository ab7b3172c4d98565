//! Flip sessions and Focus/Control comparisons.
//!
//! This module drives the trial loop: a [`SessionRunner`] turns a random
//! bit source into a [`SessionResult`], and a [`ComparisonOrchestrator`]
//! sequences two labeled sessions into a two-sample comparison.
//! Cancellation is cooperative and checked only at checkpoints.

mod cancel;
mod host;
mod orchestrator;
mod result;
mod runner;

pub use cancel::CancellationToken;
pub use host::{HostYield, NoYield, ThreadYield};
pub use orchestrator::ComparisonOrchestrator;
pub use result::{ComparisonReport, Label, Progress, SessionResult};
pub use runner::{SessionError, SessionRunner, DEFAULT_CHECKPOINT_INTERVAL};
