//! Buffered single-bit reader over an entropy source.

use super::source::{EntropyError, EntropySource};

/// Default refill size in bytes (one bit is taken per byte).
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

/// Outcome of a single flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialOutcome {
    Tails,
    Heads,
}

impl TrialOutcome {
    /// Maps the low bit of `byte` to an outcome.
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        if byte & 1 == 1 {
            Self::Heads
        } else {
            Self::Tails
        }
    }

    /// Returns true for heads.
    #[inline]
    pub fn is_hit(self) -> bool {
        self == Self::Heads
    }

    /// Returns the outcome as 0 or 1.
    #[inline]
    pub fn as_bit(self) -> u8 {
        match self {
            Self::Tails => 0,
            Self::Heads => 1,
        }
    }
}

/// Produces uniform bits from an entropy source.
///
/// The buffer is refilled in `chunk_size` byte chunks. Each byte
/// contributes exactly its least significant bit and is never read twice,
/// so the buffering adds no correlation between draws.
pub struct RandomBitSource<S> {
    source: S,
    buffer: Vec<u8>,
    /// Next unread byte. `buffer.len()` means exhausted.
    cursor: usize,
    bits_consumed: u64,
    refills: u64,
}

impl<S: EntropySource> RandomBitSource<S> {
    /// Creates a bit source with the default chunk size.
    pub fn new(source: S) -> Self {
        Self::build(source, DEFAULT_CHUNK_SIZE)
    }

    /// Creates a bit source with a custom chunk size.
    ///
    /// Fails with [`EntropyError::InvalidChunkSize`] for a zero chunk size.
    pub fn with_chunk_size(source: S, chunk_size: usize) -> Result<Self, EntropyError> {
        if chunk_size == 0 {
            return Err(EntropyError::InvalidChunkSize);
        }
        Ok(Self::build(source, chunk_size))
    }

    fn build(source: S, chunk_size: usize) -> Self {
        Self {
            source,
            buffer: vec![0u8; chunk_size],
            // Start exhausted so the first draw triggers a refill.
            cursor: chunk_size,
            bits_consumed: 0,
            refills: 0,
        }
    }

    /// Draws the next bit.
    #[inline]
    pub fn next_bit(&mut self) -> Result<TrialOutcome, EntropyError> {
        if self.cursor >= self.buffer.len() {
            self.refill()?;
        }

        let outcome = TrialOutcome::from_byte(self.buffer[self.cursor]);
        self.cursor += 1;
        self.bits_consumed += 1;
        Ok(outcome)
    }

    fn refill(&mut self) -> Result<(), EntropyError> {
        self.source.fill(&mut self.buffer)?;
        self.cursor = 0;
        self.refills += 1;

        tracing::debug!(
            source = self.source.name(),
            chunk_bytes = self.buffer.len(),
            refills = self.refills,
            "Refilled bit buffer"
        );
        Ok(())
    }

    /// Bytes per refill.
    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Bits drawn so far.
    pub fn bits_consumed(&self) -> u64 {
        self.bits_consumed
    }

    /// Number of refills performed.
    pub fn refills(&self) -> u64 {
        self.refills
    }

    /// Unread bits left in the current buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Returns true if the underlying source is secure.
    pub fn is_secure(&self) -> bool {
        self.source.is_secure()
    }

    /// Returns the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: EntropySource> std::fmt::Debug for RandomBitSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomBitSource")
            .field("source", &self.source.name())
            .field("chunk_size", &self.buffer.len())
            .field("remaining", &self.remaining())
            .field("bits_consumed", &self.bits_consumed)
            .field("refills", &self.refills)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{EntropyError, OsEntropy, ReplayEntropy};

    #[test]
    fn test_uses_low_bit_only() {
        // 0xFE has every bit set except the lowest
        let mut bits =
            RandomBitSource::with_chunk_size(ReplayEntropy::new(vec![0xFE, 0x01]), 2).unwrap();

        assert_eq!(bits.next_bit().unwrap(), TrialOutcome::Tails);
        assert_eq!(bits.next_bit().unwrap(), TrialOutcome::Heads);
    }

    #[test]
    fn test_each_byte_read_once_before_refill() {
        let script: Vec<u8> = (0..8).collect();
        let mut bits = RandomBitSource::with_chunk_size(ReplayEntropy::new(script), 4).unwrap();

        let drawn: Vec<u8> = (0..8).map(|_| bits.next_bit().unwrap().as_bit()).collect();

        // Bytes 0..8 in order, low bits alternate
        assert_eq!(drawn, vec![0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(bits.refills(), 2);
        assert_eq!(bits.source().position(), 8);
    }

    #[test]
    fn test_refill_only_when_exhausted() {
        let mut bits = RandomBitSource::with_chunk_size(ReplayEntropy::new(vec![1]), 16).unwrap();

        bits.next_bit().unwrap();
        assert_eq!(bits.refills(), 1);
        assert_eq!(bits.remaining(), 15);

        for _ in 0..15 {
            bits.next_bit().unwrap();
        }
        assert_eq!(bits.refills(), 1);
        assert_eq!(bits.remaining(), 0);

        bits.next_bit().unwrap();
        assert_eq!(bits.refills(), 2);
        assert_eq!(bits.bits_consumed(), 17);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = RandomBitSource::with_chunk_size(ReplayEntropy::new(vec![1]), 0);
        assert!(matches!(result, Err(EntropyError::InvalidChunkSize)));

        let bits = RandomBitSource::with_chunk_size(ReplayEntropy::new(vec![1]), 1).unwrap();
        assert_eq!(bits.chunk_size(), 1);
    }

    #[test]
    fn test_os_bits_are_balanced() {
        let mut bits = RandomBitSource::new(OsEntropy::new());
        let n = 1_000_000u64;

        let ones: u64 = (0..n).map(|_| u64::from(bits.next_bit().unwrap().as_bit())).sum();

        // Standard error of the proportion is 0.0005; allow 6 of them
        let rate = ones as f64 / n as f64;
        assert!((rate - 0.5).abs() < 0.003, "rate {rate}");
        assert_eq!(bits.refills(), n.div_ceil(DEFAULT_CHUNK_SIZE as u64));
    }
}
