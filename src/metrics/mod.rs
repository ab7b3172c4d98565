//! Prometheus metrics for flip runs.
//!
//! # Metrics Exposed
//!
//! ## Session Metrics
//! - `flipstat_trials_total` - Flips drawn, updated at every checkpoint
//! - `flipstat_hits_total` - Heads among the flips drawn
//! - `flipstat_sessions_completed_total` - Sessions run to completion
//! - `flipstat_sessions_cancelled_total` - Sessions ended by cancellation
//!
//! ## Statistics
//! - `flipstat_last_z` - z-score of the most recent session
//! - `flipstat_last_p` - Two-tailed p-value of the most recent session
//!
//! ## Entropy Metrics
//! - `flipstat_entropy_refills_total` - Bit buffer refills
//! - `flipstat_entropy_insecure` - 1 while the non-secure fallback is in use
//!
//! [`ProgressRecorder`] feeds checkpoint reports into a shared registry
//! so a scrape during a run sees the session in flight. The HTTP exporter
//! needs the `metrics` feature.
//!
//! # Example
//!
//! ```
//! use flipstat::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&MetricsSnapshot {
//!     trials_total: 100_000,
//!     hits_total: 50_112,
//!     sessions_completed: 1,
//!     last_z: Some(0.708),
//!     last_p: Some(0.479),
//!     ..Default::default()
//! });
//!
//! assert!(registry.encode().unwrap().contains("flipstat_trials_total 100000"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot, ProgressRecorder};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
