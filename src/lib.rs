//! Flip Statistics Library
//!
//! Streams large numbers of secure random coin flips, tallies heads and
//! tests the observed proportion against a fair coin. Two labeled
//! conditions, Focus and Control, can be run back to back and compared
//! with a two-sample test.
//!
//! # Architecture
//!
//! ```text
//! entropy → bit source → session runner → one-sample test
//!                              ↓
//!                    comparison orchestrator → two-sample test
//! ```
//!
//! # Design Principles
//!
//! - **Secure by default**: flips come from the OS CSPRNG; the clock-seeded
//!   fallback must be opted into and is always logged
//! - **One bit per byte**: buffered entropy never reuses a byte
//! - **Cooperative cancellation**: runs poll a shared token at checkpoints
//! - **No silent clamping**: minimum session sizes are caller policy
//!
//! # Example
//!
//! ```no_run
//! use flipstat::{
//!     entropy::{FallbackPolicy, RandomBitSource, SystemEntropy},
//!     session::{CancellationToken, ComparisonOrchestrator, SessionRunner},
//! };
//!
//! let entropy = SystemEntropy::open(FallbackPolicy::Deny).unwrap();
//! let runner = SessionRunner::new(RandomBitSource::new(entropy));
//! let mut orchestrator = ComparisonOrchestrator::new(runner);
//!
//! let token = CancellationToken::new();
//! let report = orchestrator
//!     .run_both(100_000, &token, |p| println!("{}", p.status()))
//!     .unwrap();
//!
//! println!("diff = {:.4}, p = {:.4}", report.comparison.diff, report.comparison.p);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod entropy;
pub mod metrics;
pub mod session;
pub mod stats;

// Re-export commonly used types at crate root
pub use config::{ConfigError, FileConfig, RunConfig, RunMode};
pub use entropy::{EntropySource, FallbackPolicy, RandomBitSource, SystemEntropy, TrialOutcome};
pub use session::{
    CancellationToken, ComparisonOrchestrator, ComparisonReport, Label, Progress, SessionError,
    SessionResult, SessionRunner,
};
pub use stats::{one_sample, two_sample, ComparisonResult, OneSampleTest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
