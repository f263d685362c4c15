//! Per-thread xorshift generator.
//!
//! A shared random source serializes every producer on one lock, so each
//! worker owns its own generator instead.

/// Seed used when no other seed is given. Must be non-zero.
pub const DEFAULT_SEED: u32 = 5381;

/// xorshift32 generator. Not cryptographic.
#[derive(Debug, Clone)]
pub struct FastRng {
    state: u32,
}

impl FastRng {
    /// Create a generator from `seed`. A zero seed is replaced by
    /// [`DEFAULT_SEED`], since xorshift never leaves the zero state.
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { DEFAULT_SEED } else { seed };
        Self { state }
    }

    /// Generator for worker `id`, derived from a base seed so that workers
    /// produce distinct streams.
    pub fn for_worker(base: u32, id: usize) -> Self {
        let mix = (id as u32).wrapping_mul(0x9E37_79B9);
        Self::new(base ^ mix)
    }

    /// Advance the state and return it.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform-ish value in `[0, bound)`. `bound` must be non-zero.
    #[inline]
    pub fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}

impl Default for FastRng {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
