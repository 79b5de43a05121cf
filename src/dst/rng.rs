//! DeterministicRng - Seeded randomness
//!
//! TigerStyle: Every random decision comes from one logged seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Environment variable that pins the seed.
pub const DST_SEED_ENV: &str = "DST_SEED";

/// Seeded RNG; the same seed yields the same sequence.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    inner: ChaCha8Rng,
}

impl DeterministicRng {
    /// Create from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed from `DST_SEED` if set, otherwise from entropy. The seed is logged.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var(DST_SEED_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(rand::random);
        tracing::info!(seed, "DST seed (replay with {DST_SEED_ENV}={seed})");
        Self::new(seed)
    }

    /// Seed this generator was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// True with the given probability.
    ///
    /// # Panics
    /// Panics if `probability` is outside `[0, 1]`.
    pub fn chance(&mut self, probability: f64) -> bool {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability {probability} must be within [0, 1]"
        );
        self.next_f64() < probability
    }
}
