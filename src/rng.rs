//! Minimal PCG32 random number generator.
//!
//! Duel seeds are the only randomness this crate needs, so a small local
//! PCG-XSH-RR implementation replaces a `rand` dependency. Not
//! cryptographically secure, and does not need to be.
//!
//! Reference: <https://www.pcg-random.org/>

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default increment for single-stream PCG32, from the PCG paper.
const PCG_DEFAULT_INCREMENT: u64 = 1442695040888963407;

/// Standard multiplier for 64-bit state PCG.
const PCG_MULTIPLIER: u64 = 6364136223846793005;

/// Counter mixed into entropy seeds so back-to-back draws differ even when
/// the clock does not move.
static ENTROPY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// PCG32 generator: 64 bits of state, 32-bit output, period 2^64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Creates a generator with the given state and stream.
    #[must_use]
    pub const fn new(state: u64, stream: u64) -> Self {
        // The increment must be odd.
        let inc = (stream << 1) | 1;
        let mut pcg = Self { state: 0, inc };
        // Standard PCG seeding: advance once, add the seed, advance again.
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg.state = pcg.state.wrapping_add(state);
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg
    }

    /// Creates a generator seeded from a 64-bit value on the default stream.
    #[must_use]
    pub const fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed, PCG_DEFAULT_INCREMENT)
    }

    /// Creates a generator seeded from system timing and thread identity.
    /// Enough entropy for duel seeds, nothing more.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::seed_from_u64(entropy_seed())
    }

    /// Generates the next 32-bit random value.
    #[inline]
    #[must_use]
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc);
        // XSH-RR output permutation.
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generates a random `u32` in `[range.start, range.end)` using
    /// rejection sampling to avoid modulo bias.
    ///
    /// Returns `range.start` for an empty range.
    pub fn gen_range(&mut self, range: std::ops::Range<u32>) -> u32 {
        let span = range.end.wrapping_sub(range.start);
        if span == 0 {
            return range.start;
        }
        let threshold = span.wrapping_neg() % span;
        loop {
            let value = self.next_u32();
            if value >= threshold {
                return range.start.wrapping_add(value % span);
            }
        }
    }
}

fn entropy_seed() -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let nanos = web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    nanos.hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);
    ENTROPY_COUNTER
        .fetch_add(1, Ordering::Relaxed)
        .hash(&mut hasher);
    hasher.finish()
}
