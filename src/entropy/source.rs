//! Entropy sources that fill byte buffers.
//!
//! The operating system generator is the only source treated as secure.
//! Everything else is either a deterministic script (for tests and demos)
//! or an explicitly degraded substitute that announces itself in the logs.

use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while drawing entropy.
#[derive(Debug, Clone, Error)]
pub enum EntropyError {
    #[error("secure entropy source unavailable: {0}")]
    Unavailable(String),
    #[error("failed to fill entropy buffer: {0}")]
    Fill(String),
    #[error("invalid chunk size (must be at least 1 byte)")]
    InvalidChunkSize,
}

/// Trait for byte-oriented entropy sources.
///
/// Filling is synchronous. Implementations must fill the whole slice or
/// return an error.
pub trait EntropySource {
    /// Fills `dest` with random bytes.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;

    /// Returns true if the bytes come from a cryptographically secure source.
    fn is_secure(&self) -> bool;

    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

impl<S: EntropySource + ?Sized> EntropySource for Box<S> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        (**self).fill(dest)
    }

    fn is_secure(&self) -> bool {
        (**self).is_secure()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Operating system CSPRNG (`getrandom`).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl OsEntropy {
    pub fn new() -> Self {
        Self
    }
}

impl EntropySource for OsEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError::Fill(e.to_string()))
    }

    fn is_secure(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "os"
    }
}

/// Non-secure substitute used only when the OS source is missing.
///
/// ChaCha20 seeded from the wall clock and process id. The stream is
/// statistically fine for a demonstration but predictable to anyone who
/// can guess the seed, so it must never be mistaken for the OS source.
pub struct FallbackEntropy {
    inner: ChaCha20Rng,
}

impl FallbackEntropy {
    /// Creates a clock-seeded generator and logs the degradation.
    pub fn from_clock() -> Self {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default() as u64;
        let seed = nanos ^ (u64::from(std::process::id()) << 32);

        tracing::warn!(
            source = "fallback",
            "Using NON-SECURE clock-seeded generator; outcomes are predictable"
        );

        Self::from_seed(seed)
    }

    /// Creates a generator from an explicit seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl EntropySource for FallbackEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        self.inner.fill_bytes(dest);
        Ok(())
    }

    fn is_secure(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

impl std::fmt::Debug for FallbackEntropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackEntropy").finish_non_exhaustive()
    }
}

/// What to do when the OS entropy source cannot be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fail closed: refuse to run without secure entropy.
    #[default]
    Deny,
    /// Degrade to [`FallbackEntropy`] with a warning.
    AllowInsecure,
}

/// The OS source, or the fallback when policy permits.
#[derive(Debug)]
pub enum SystemEntropy {
    Secure(OsEntropy),
    Insecure(FallbackEntropy),
}

impl SystemEntropy {
    /// Probes the OS source and applies `policy` if it fails.
    pub fn open(policy: FallbackPolicy) -> Result<Self, EntropyError> {
        let mut os = OsEntropy::new();
        let mut probe = [0u8; 16];

        match os.fill(&mut probe) {
            Ok(()) => {
                tracing::debug!("OS entropy source available");
                Ok(Self::Secure(os))
            }
            Err(e) => Self::degrade(policy, e),
        }
    }

    fn degrade(policy: FallbackPolicy, cause: EntropyError) -> Result<Self, EntropyError> {
        match policy {
            FallbackPolicy::Deny => {
                tracing::error!(error = %cause, "OS entropy unavailable and fallback denied");
                Err(EntropyError::Unavailable(cause.to_string()))
            }
            FallbackPolicy::AllowInsecure => {
                tracing::warn!(error = %cause, "OS entropy unavailable, degrading to fallback");
                Ok(Self::Insecure(FallbackEntropy::from_clock()))
            }
        }
    }
}

impl EntropySource for SystemEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        match self {
            Self::Secure(os) => os.fill(dest),
            Self::Insecure(fallback) => fallback.fill(dest),
        }
    }

    fn is_secure(&self) -> bool {
        matches!(self, Self::Secure(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Secure(os) => os.name(),
            Self::Insecure(fallback) => fallback.name(),
        }
    }
}

/// Deterministic source that cycles through a fixed byte script.
///
/// NOT random. Used to drive sessions to known outcomes.
#[derive(Debug, Clone)]
pub struct ReplayEntropy {
    script: Vec<u8>,
    position: usize,
}

impl ReplayEntropy {
    /// Creates a replay source. An empty script replays zeros.
    pub fn new(script: Vec<u8>) -> Self {
        let script = if script.is_empty() { vec![0] } else { script };
        Self {
            script,
            position: 0,
        }
    }

    /// Builds a script whose bytes carry exactly `ones` set low bits
    /// followed by `zeros` cleared ones.
    pub fn with_counts(ones: usize, zeros: usize) -> Self {
        let mut script = vec![1u8; ones];
        script.resize(ones + zeros, 0);
        Self::new(script)
    }

    /// Total bytes handed out so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl EntropySource for ReplayEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        let len = self.script.len();
        for byte in dest.iter_mut() {
            *byte = self.script[self.position % len];
            self.position += 1;
        }
        Ok(())
    }

    fn is_secure(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_entropy_fills() {
        let mut os = OsEntropy::new();
        let mut buf = [0u8; 64];
        os.fill(&mut buf).unwrap();

        assert!(os.is_secure());
        // 64 zero bytes from a working CSPRNG is not a realistic outcome
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_system_entropy_prefers_os() {
        let system = SystemEntropy::open(FallbackPolicy::Deny).unwrap();
        assert!(system.is_secure());
        assert_eq!(system.name(), "os");
    }

    #[test]
    fn test_denied_fallback_fails_closed() {
        let result = SystemEntropy::degrade(
            FallbackPolicy::Deny,
            EntropyError::Fill("no device".into()),
        );
        assert!(matches!(result, Err(EntropyError::Unavailable(_))));
    }

    #[test]
    fn test_allowed_fallback_is_flagged_insecure() {
        let mut system = SystemEntropy::degrade(
            FallbackPolicy::AllowInsecure,
            EntropyError::Fill("no device".into()),
        )
        .unwrap();

        assert!(!system.is_secure());
        assert_eq!(system.name(), "fallback");

        let mut buf = [0u8; 32];
        system.fill(&mut buf).unwrap();
    }

    #[test]
    fn test_fallback_seed_is_reproducible() {
        let mut a = FallbackEntropy::from_seed(7);
        let mut b = FallbackEntropy::from_seed(7);
        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        a.fill(&mut out_a).unwrap();
        b.fill(&mut out_b).unwrap();

        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_replay_cycles_script() {
        let mut replay = ReplayEntropy::new(vec![1, 2, 3]);
        let mut buf = [0u8; 7];
        replay.fill(&mut buf).unwrap();

        assert_eq!(buf, [1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(replay.position(), 7);
    }

    #[test]
    fn test_replay_with_counts() {
        let mut replay = ReplayEntropy::with_counts(2, 3);
        let mut buf = [9u8; 5];
        replay.fill(&mut buf).unwrap();

        assert_eq!(buf, [1, 1, 0, 0, 0]);
    }
}
