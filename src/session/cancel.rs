//! Cooperative cancellation.

use super::SessionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way cancellation flag shared between a run and its caller.
///
/// Clones share the same flag. Once cancelled a token stays cancelled;
/// create a fresh token for every run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            tracing::debug!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fails with [`SessionError::Cancelled`] if cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), SessionError> {
        if self.is_cancelled() {
            Err(SessionError::Cancelled)
        } else {
            Ok(())
        }
    }
}
