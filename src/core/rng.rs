//! Spawn Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. The world owns exactly one
//! instance; production seeds it from the wall clock, tests seed it with a
//! constant so spawn positions are reproducible.

use chrono::Utc;

/// Fast PRNG used for spawn and respawn placement.
///
/// # Example
///
/// ```
/// use craftio::core::rng::SpawnRng;
///
/// let mut a = SpawnRng::new(12345);
/// let mut b = SpawnRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct SpawnRng {
    state: [u64; 2],
}

impl Default for SpawnRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SpawnRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Seed from the current wall-clock time in nanoseconds.
    pub fn from_clock() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::new(nanos as u64)
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Uniform float in `[0, 1)` built from the upper 53 bits.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform float in `[min, max)`.
    #[inline]
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        min + self.next_f64() * (max - min)
    }

    /// Uniform point inside the axis-aligned square of side `side`
    /// centered on the origin.
    pub fn point_in_square(&mut self, side: f64) -> (f64, f64) {
        let half = side / 2.0;
        let x = self.next_range(-half, half);
        let y = self.next_range(-half, half);
        (x, y)
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
