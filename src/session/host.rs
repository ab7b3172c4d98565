//! Host yield hooks called at session checkpoints.

/// Hands control back to the host between checkpoints.
///
/// Called only at checkpoints, never mid-trial. Correctness of a run does
/// not depend on what the host does here.
pub trait HostYield {
    fn yield_now(&mut self);
}

/// Never yields. The caller drives progress from its callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

impl HostYield for NoYield {
    #[inline]
    fn yield_now(&mut self) {}
}

/// Yields the OS thread so a display or signal thread can run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadYield;

impl HostYield for ThreadYield {
    #[inline]
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}
