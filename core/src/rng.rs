//! Deterministic random number generation for model fitting.
//!
//! RULE: The anomaly model never calls a platform RNG. All split and
//! subsample randomness flows through `ModelRng` streams derived from the
//! single `model_seed` in the engine config, so re-fitting the same corpus
//! with the same seed reproduces the same forest.
//!
//! Each tree gets its own stream, seeded from (master_seed XOR tree_index).
//! Adding trees never perturbs existing trees' streams.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A deterministic RNG stream for one tree (or the subsampler).
pub struct ModelRng {
    inner: Pcg64Mcg,
}

impl ModelRng {
    /// Derive a stream from the master seed and a stable stream index.
    /// The index must never change once assigned.
    pub fn for_stream(master_seed: u64, stream_index: u64) -> Self {
        let derived = master_seed ^ stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Uniform draw in (lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }
}
