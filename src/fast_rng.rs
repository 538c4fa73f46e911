// Permuted congruential generator with skip-ahead.
//
// Every neutron history draws from its own stream: the master seed is advanced
// by `STREAM_STRIDE * history_id` steps, so a run is reproducible regardless of
// how histories are distributed over worker threads.

use rand::{RngCore, SeedableRng};

/// LCG multiplier
const PRN_MULT: u64 = 6364136223846793005;
/// LCG additive constant
const PRN_ADD: u64 = 1442695040888963407;
/// Number of draws reserved for each history before streams overlap.
/// 2^36 draws per history leaves room for 2^28 histories in the 2^64 period.
pub const STREAM_STRIDE: u64 = 1 << 36;

/// PCG-LCG random stream: an LCG state with an RXS-M-XS output permutation.
#[derive(Clone, Copy, Debug)]
pub struct FastRng {
    seed: u64,
}

impl FastRng {
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Stream for one history, `history_id` counted from the start of the run.
    pub fn for_history(master_seed: u64, history_id: u64) -> Self {
        Self::new(future_seed(STREAM_STRIDE.wrapping_mul(history_id), master_seed))
    }

    /// Uniform f64 in [0, 1)
    #[inline(always)]
    pub fn random(&mut self) -> f64 {
        (self.next_u64() as f64) * 5.421010862427522e-20
    }

    /// Skip `n` draws ahead in O(log n).
    pub fn advance(&mut self, n: u64) {
        self.seed = future_seed(n, self.seed);
    }

    #[inline]
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn state(&self) -> u64 {
        self.seed
    }
}

/// LCG state after `n` steps from `seed` (Brown, "Random number generation with
/// arbitrary strides").
fn future_seed(n: u64, seed: u64) -> u64 {
    let mut g = PRN_MULT;
    let mut c = PRN_ADD;
    let mut g_new: u64 = 1;
    let mut c_new: u64 = 0;
    let mut n = n;
    while n > 0 {
        if n & 1 == 1 {
            g_new = g_new.wrapping_mul(g);
            c_new = c_new.wrapping_mul(g).wrapping_add(c);
        }
        c = g.wrapping_add(1).wrapping_mul(c);
        g = g.wrapping_mul(g);
        n >>= 1;
    }
    g_new.wrapping_mul(seed).wrapping_add(c_new)
}

impl SeedableRng for FastRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            seed: u64::from_le_bytes(seed),
        }
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

impl RngCore for FastRng {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        self.seed = PRN_MULT.wrapping_mul(self.seed).wrapping_add(PRN_ADD);
        let word = ((self.seed >> ((self.seed >> 59) + 5)) ^ self.seed)
            .wrapping_mul(12605985483714917081);
        (word >> 43) ^ word
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
