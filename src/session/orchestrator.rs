//! Focus-then-Control comparison runs.

use super::{
    CancellationToken, ComparisonReport, HostYield, Label, NoYield, Progress, SessionError,
    SessionRunner,
};
use crate::entropy::EntropySource;
use crate::stats::two_sample;

/// Runs a Focus session, then a Control session, then compares them.
///
/// The sessions share one bit source and run strictly one after the
/// other. If either is cancelled or fails the comparison is abandoned and
/// no partial report is produced.
pub struct ComparisonOrchestrator<S, Y = NoYield> {
    runner: SessionRunner<S, Y>,
}

impl<S: EntropySource, Y: HostYield> ComparisonOrchestrator<S, Y> {
    pub fn new(runner: SessionRunner<S, Y>) -> Self {
        Self { runner }
    }

    /// Runs both sessions of `trials` flips each.
    ///
    /// `on_progress` receives a zeroed report at the start of each session
    /// followed by that session's checkpoint reports.
    pub fn run_both<F>(
        &mut self,
        trials: u64,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ComparisonReport, SessionError>
    where
        F: FnMut(&Progress),
    {
        on_progress(&Progress::start(Label::Focus, trials));
        let focus = self
            .runner
            .run(Label::Focus, trials, cancel, &mut on_progress)
            .inspect_err(|e| tracing::debug!(error = %e, "Comparison aborted during Focus"))?;

        on_progress(&Progress::start(Label::Control, trials));
        let control = self
            .runner
            .run(Label::Control, trials, cancel, &mut on_progress)
            .inspect_err(|e| tracing::debug!(error = %e, "Comparison aborted during Control"))?;

        let comparison = two_sample(&focus, &control);

        tracing::info!(
            diff = comparison.diff,
            z = comparison.z,
            p = comparison.p,
            degenerate = comparison.is_degenerate(),
            "Comparison complete"
        );

        Ok(ComparisonReport {
            focus,
            control,
            comparison,
        })
    }

    /// The session runner driving both halves.
    pub fn runner(&self) -> &SessionRunner<S, Y> {
        &self.runner
    }
}
