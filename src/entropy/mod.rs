//! Random bit generation.
//!
//! This module wraps a byte-oriented entropy source in a buffered reader
//! that yields one independent bit per byte. The OS generator is the
//! default source; the clock-seeded fallback is a degraded path that must
//! be opted into.

mod bits;
mod source;

pub use bits::{RandomBitSource, TrialOutcome, DEFAULT_CHUNK_SIZE};
pub use source::{
    EntropyError, EntropySource, FallbackEntropy, FallbackPolicy, OsEntropy, ReplayEntropy,
    SystemEntropy,
};
