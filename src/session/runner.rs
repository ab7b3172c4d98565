//! Streaming flip sessions.
//!
//! A session draws `n` bits one at a time, keeps a running hit count and
//! stops at fixed checkpoints to report progress, hand control to the
//! host and poll for cancellation. Individual outcomes are never stored.

use super::{CancellationToken, HostYield, Label, NoYield, Progress, SessionResult};
use crate::entropy::{EntropyError, EntropySource, RandomBitSource};
use thiserror::Error;

/// Trials between checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 250;

/// Errors that end a session without a result.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("session cancelled")]
    Cancelled,
    #[error("invalid trial count {0} (must be at least 1)")]
    InvalidTrialCount(u64),
    #[error("invalid checkpoint interval (must be at least 1)")]
    InvalidCheckpointInterval,
    #[error("entropy failure: {0}")]
    Entropy(#[from] EntropyError),
}

impl SessionError {
    /// True for user-requested cancellation, as opposed to a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Runs single sessions over a random bit source.
pub struct SessionRunner<S, Y = NoYield> {
    bits: RandomBitSource<S>,
    checkpoint_interval: u64,
    host: Y,
}

impl<S: EntropySource> SessionRunner<S> {
    /// Creates a runner with the default checkpoint interval.
    pub fn new(bits: RandomBitSource<S>) -> Self {
        Self {
            bits,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            host: NoYield,
        }
    }

    /// Creates a runner with a custom checkpoint interval.
    pub fn with_checkpoint_interval(
        bits: RandomBitSource<S>,
        checkpoint_interval: u64,
    ) -> Result<Self, SessionError> {
        if checkpoint_interval == 0 {
            return Err(SessionError::InvalidCheckpointInterval);
        }
        Ok(Self {
            checkpoint_interval,
            ..Self::new(bits)
        })
    }
}

impl<S: EntropySource, Y: HostYield> SessionRunner<S, Y> {
    /// Replaces the host yield hook.
    pub fn with_host<H: HostYield>(self, host: H) -> SessionRunner<S, H> {
        SessionRunner {
            bits: self.bits,
            checkpoint_interval: self.checkpoint_interval,
            host,
        }
    }

    /// Runs one session of `trials` flips.
    ///
    /// At every `checkpoint_interval` trials, and after the last one,
    /// `on_progress` is called, the host gets a chance to run, and
    /// `cancel` is polled. A cancelled session discards its tally and
    /// returns [`SessionError::Cancelled`].
    ///
    /// `trials` must be at least 1. Minimum-size policies belong to the
    /// caller; the runner does not clamp.
    pub fn run<F>(
        &mut self,
        label: Label,
        trials: u64,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<SessionResult, SessionError>
    where
        F: FnMut(&Progress),
    {
        if trials == 0 {
            return Err(SessionError::InvalidTrialCount(trials));
        }
        if cancel.is_cancelled() {
            tracing::warn!(%label, "Session cancelled before start");
            return Err(SessionError::Cancelled);
        }

        tracing::debug!(
            %label,
            trials,
            checkpoint_interval = self.checkpoint_interval,
            source = self.bits.source().name(),
            "Session started"
        );

        let mut hits = 0u64;
        for completed in 1..=trials {
            if self.bits.next_bit()?.is_hit() {
                hits += 1;
            }

            if completed % self.checkpoint_interval == 0 || completed == trials {
                let progress = Progress {
                    label,
                    completed,
                    total: trials,
                    hits,
                };
                on_progress(&progress);
                self.host.yield_now();

                if cancel.is_cancelled() {
                    tracing::warn!(%label, completed, trials, "Session cancelled");
                    return Err(SessionError::Cancelled);
                }

                tracing::trace!(%label, completed, hits, "Checkpoint");
            }
        }

        let result = SessionResult::from_counts(label, hits, trials);

        tracing::info!(
            %label,
            trials,
            hits,
            rate = result.rate(),
            z = result.z(),
            p = result.p(),
            "Session complete"
        );

        Ok(result)
    }

    /// Trials between checkpoints.
    pub fn checkpoint_interval(&self) -> u64 {
        self.checkpoint_interval
    }

    /// The underlying bit source.
    pub fn bits(&self) -> &RandomBitSource<S> {
        &self.bits
    }
}
