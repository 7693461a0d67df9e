//! Engine tuning knobs. All fields have production defaults; a caller may
//! deserialize overrides from JSON (the same serde pattern the rest of the
//! model types use).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Assumed fraction of the corpus treated as anomalous by the
    /// unsupervised scorer.
    pub contamination: f64,
    /// Below this corpus size the anomaly model refuses to fit and the
    /// engine runs on rules alone.
    pub min_fit_corpus: usize,
    /// Isolation forest size.
    pub tree_count: usize,
    /// Per-tree subsample size. Corpora smaller than this use every row.
    pub subsample_size: usize,
    /// Master seed for the forest's split randomness. Fixed seed means
    /// re-fitting the same corpus reproduces the same model.
    pub model_seed: u64,
    /// Minimum seconds between a flagged assessment and an accepted
    /// "proceeded" decision.
    pub proceed_cooldown_secs: i64,
    /// Records timestamped further than this into the future are rejected.
    pub max_future_skew_hours: i64,
    /// Upper bound on a single transaction amount.
    pub max_amount: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contamination: 0.08,
            min_fit_corpus: 25,
            tree_count: 100,
            subsample_size: 256,
            model_seed: 42,
            proceed_cooldown_secs: 10,
            max_future_skew_hours: 24,
            max_amount: 1_000_000.0,
        }
    }
}
