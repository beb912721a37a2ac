//! Random and quasi-random number generation.
//!
//! Pseudo-random draws come from a 64-bit Mersenne Twister (`rand_mt`)
//! sampled through `rand_distr`; quasi-random draws come from
//! [`SobolSequence`]. Generators are plain values: parallel code derives one
//! generator per work item from a master seed with [`derive_seed`] instead
//! of sharing a stream.

use fb_core::Real;
use rand::Rng;
use rand_distr::StandardNormal;
use rand_mt::Mt19937GenRand64;

/// Brownian-bridge path construction.
pub mod brownian_bridge;

/// Sobol low-discrepancy sequence.
pub mod sobol;

pub use brownian_bridge::BrownianBridge;
pub use sobol::{SobolSequence, SobolState, MAX_DIMENSION};

/// SplitMix64 finaliser applied to `seed` and a stream number.
///
/// Gives well-separated seeds for sub-streams such as path chunks, so a
/// result depends only on `(seed, stream)` and not on which thread ran it.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Standard-normal pseudo-random generator backed by MT19937-64.
#[derive(Clone)]
pub struct PseudoRandomNormal {
    rng: Mt19937GenRand64,
}

impl std::fmt::Debug for PseudoRandomNormal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudoRandomNormal").finish_non_exhaustive()
    }
}

impl PseudoRandomNormal {
    /// Create a new generator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mt19937GenRand64::new(seed),
        }
    }

    /// Generator for sub-stream `stream` of the master `seed`.
    pub fn for_stream(seed: u64, stream: u64) -> Self {
        Self::new(derive_seed(seed, stream))
    }

    /// Next standard-normal deviate.
    #[inline]
    pub fn next_normal(&mut self) -> Real {
        self.rng.sample(StandardNormal)
    }

    /// Fill `out` with independent standard-normal deviates.
    pub fn fill(&mut self, out: &mut [Real]) {
        for z in out.iter_mut() {
            *z = self.rng.sample(StandardNormal);
        }
    }
}

/// Map uniforms in (0, 1) to standard normals in place.
pub fn uniforms_to_normals(values: &mut [Real]) {
    for v in values.iter_mut() {
        *v = crate::distributions::normal_cdf_inverse(*v);
    }
}
