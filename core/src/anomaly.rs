//! Anomaly scorer — two-phase unsupervised detection.
//!
//! Phase 1 (`fit`): engineer features for the whole corpus, standardize,
//! fit the isolation forest, and derive the contamination threshold from
//! the corpus score distribution. The result is an immutable
//! `ModelSnapshot`, replaced wholesale on re-fit and never mutated.
//!
//! Phase 2 (`predict_batch` / `score_one`): batch-score the corpus into a
//! `txn_id -> score` cache, and score fresh transactions against the
//! current snapshot without retraining.
//!
//! Features per transaction:
//!   - hour of day encoded cyclically (sin/cos, so 23:00 sits next to 00:00)
//!   - discretionary-category indicator
//!   - trailing 7-day sum of the user's spend ending at the transaction
//!   - log-scaled amount (ln(1 + amount), to pull in the heavy tail)

use crate::{
    behavioral::is_late_night_hour,
    config::EngineConfig,
    error::{RiskError, RiskResult},
    forest::{AnomalyModel, FittedModel, IsolationForest},
    models::{RiskFlag, Transaction},
    types::{DetectorType, Severity, TxnId},
};
use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

// ── Constants ────────────────────────────────────────────────────────────────

const FEATURE_COUNT: usize = 5;
const ROLLING_WINDOW_DAYS: i64 = 7;

// ── Features ─────────────────────────────────────────────────────────────────

/// Raw (unstandardized) feature vector for one transaction.
/// `rolling_spend` is the user's trailing 7-day sum including this amount.
fn feature_row(txn: &Transaction, rolling_spend: f64) -> Vec<f64> {
    let hour = txn.timestamp.hour() as f64;
    let angle = 2.0 * PI * hour / 24.0;
    vec![
        angle.sin(),
        angle.cos(),
        if txn.category.is_discretionary() { 1.0 } else { 0.0 },
        rolling_spend,
        txn.amount.ln_1p(),
    ]
}

/// Trailing 7-day sums for every corpus row, keyed by corpus index.
/// Two-pointer sweep per user over timestamp-sorted positions.
fn rolling_sums(corpus: &[Transaction]) -> Vec<f64> {
    let mut by_user: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, txn) in corpus.iter().enumerate() {
        by_user.entry(txn.user_id.as_str()).or_default().push(i);
    }

    let mut sums = vec![0.0; corpus.len()];
    for positions in by_user.values_mut() {
        positions.sort_by_key(|&i| corpus[i].timestamp);
        let mut start = 0;
        let mut running = 0.0;
        for k in 0..positions.len() {
            running += corpus[positions[k]].amount;
            let window_start =
                corpus[positions[k]].timestamp - Duration::days(ROLLING_WINDOW_DAYS);
            while corpus[positions[start]].timestamp <= window_start {
                running -= corpus[positions[start]].amount;
                start += 1;
            }
            sums[positions[k]] = running;
        }
    }
    sums
}

/// 7-day sum for a single new transaction given its (exclusive) history.
fn rolling_sum_one(txn: &Transaction, history: &[&Transaction]) -> f64 {
    let window_start = txn.timestamp - Duration::days(ROLLING_WINDOW_DAYS);
    txn.amount
        + history
            .iter()
            .filter(|t| t.timestamp > window_start && t.timestamp <= txn.timestamp)
            .map(|t| t.amount)
            .sum::<f64>()
}

/// Per-feature mean/std captured at fit time, applied to every later score.
#[derive(Debug, Clone)]
pub struct FeatureStats {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl FeatureStats {
    fn from_table(table: &[Vec<f64>]) -> Self {
        let n = table.len() as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in table {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut std = vec![0.0; FEATURE_COUNT];
        for row in table {
            for f in 0..FEATURE_COUNT {
                std[f] += (row[f] - mean[f]).powi(2) / n;
            }
        }
        for s in &mut std {
            *s = s.sqrt();
            if *s < 1e-12 {
                *s = 1.0; // constant feature: leave it centered
            }
        }
        Self { mean, std }
    }

    fn standardize(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// Immutable fitted state. Produced by `fit`, swapped wholesale, never
/// mutated in place; concurrent scorers see either the old or the new one.
pub struct ModelSnapshot {
    fitted: Box<dyn FittedModel>,
    stats: FeatureStats,
    /// Scores at or below this mark the contamination fraction.
    threshold: f64,
    pub contamination: f64,
    pub corpus_size: usize,
    pub fitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredTxn {
    pub score: f64,
    pub is_anomalous: bool,
}

// ── Scorer ───────────────────────────────────────────────────────────────────

pub struct AnomalyScorer {
    contamination: f64,
    min_fit_corpus: usize,
    model: Box<dyn AnomalyModel>,
    snapshot: Option<Arc<ModelSnapshot>>,
    cache: HashMap<TxnId, ScoredTxn>,
}

impl AnomalyScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_model(
            Box::new(IsolationForest::new(
                config.tree_count,
                config.subsample_size,
                config.model_seed,
            )),
            config,
        )
    }

    /// Substitute any unsupervised model behind the same two-phase contract.
    pub fn with_model(model: Box<dyn AnomalyModel>, config: &EngineConfig) -> Self {
        Self {
            contamination: config.contamination,
            min_fit_corpus: config.min_fit_corpus,
            model,
            snapshot: None,
            cache: HashMap::new(),
        }
    }

    pub fn available(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.snapshot.clone()
    }

    /// Bulk fit. Skips (keeping any previous snapshot) when the corpus is
    /// too small to support a reliable model.
    pub fn fit(&mut self, corpus: &[Transaction]) -> RiskResult<()> {
        if corpus.len() < self.min_fit_corpus {
            return Err(RiskError::ModelUnavailable(format!(
                "corpus of {} below minimum {}",
                corpus.len(),
                self.min_fit_corpus
            )));
        }

        let rolling = rolling_sums(corpus);
        let raw: Vec<Vec<f64>> = corpus
            .iter()
            .zip(&rolling)
            .map(|(t, &r)| feature_row(t, r))
            .collect();
        let stats = FeatureStats::from_table(&raw);
        let table: Vec<Vec<f64>> = raw.iter().map(|row| stats.standardize(row)).collect();

        let fitted = self.model.fit(&table);

        // Contamination threshold: the k lowest corpus scores are anomalous.
        let mut scores: Vec<f64> = table.iter().map(|row| fitted.score(row)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        let k = (corpus.len() as f64 * self.contamination).round() as usize;
        let threshold = if k == 0 {
            f64::NEG_INFINITY
        } else {
            scores[k - 1]
        };

        // Copy-on-write replace; the old snapshot stays valid for readers.
        self.snapshot = Some(Arc::new(ModelSnapshot {
            fitted,
            stats,
            threshold,
            contamination: self.contamination,
            corpus_size: corpus.len(),
            fitted_at: Utc::now().naive_utc(),
        }));
        self.cache.clear();

        log::info!(
            "anomaly model fitted over {} transactions (threshold {:.4})",
            corpus.len(),
            threshold
        );
        Ok(())
    }

    /// Score every corpus record against the current snapshot and cache the
    /// results, so historical lookups never re-score.
    pub fn predict_batch(&mut self, corpus: &[Transaction]) -> RiskResult<usize> {
        let snapshot = self
            .snapshot
            .clone()
            .ok_or_else(|| RiskError::ModelUnavailable("never fitted".into()))?;

        let rolling = rolling_sums(corpus);
        let mut anomalous = 0;
        for (txn, &r) in corpus.iter().zip(&rolling) {
            let row = snapshot.stats.standardize(&feature_row(txn, r));
            let score = snapshot.fitted.score(&row);
            let is_anomalous = score <= snapshot.threshold;
            if is_anomalous {
                anomalous += 1;
            }
            self.cache
                .insert(txn.txn_id.clone(), ScoredTxn { score, is_anomalous });
        }
        log::info!(
            "batch-scored {} transactions, {} anomalous",
            corpus.len(),
            anomalous
        );
        Ok(anomalous)
    }

    pub fn cached(&self, txn_id: &str) -> Option<ScoredTxn> {
        self.cache.get(txn_id).copied()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Score one fresh transaction against the current snapshot, without
    /// retraining. `history` is the user's prior transactions.
    pub fn score_one(&self, txn: &Transaction, history: &[&Transaction]) -> RiskResult<ScoredTxn> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| RiskError::ModelUnavailable("never fitted".into()))?;
        let row = snapshot
            .stats
            .standardize(&feature_row(txn, rolling_sum_one(txn, history)));
        let score = snapshot.fitted.score(&row);
        Ok(ScoredTxn {
            score,
            is_anomalous: score <= snapshot.threshold,
        })
    }

    /// Full detector pass for the engine: cache lookup first, then ad-hoc
    /// scoring. Returns `None` when the model is unavailable or the
    /// transaction is not anomalous — model absence never fails an
    /// evaluation.
    pub fn evaluate(&self, txn: &Transaction, history: &[&Transaction]) -> Option<RiskFlag> {
        let scored = match self.cached(&txn.txn_id) {
            Some(hit) => hit,
            None => match self.score_one(txn, history) {
                Ok(s) => s,
                Err(RiskError::ModelUnavailable(reason)) => {
                    log::debug!("skipping anomaly check for {}: {reason}", txn.txn_id);
                    return None;
                }
                Err(e) => {
                    log::warn!("anomaly scoring failed for {}: {e}", txn.txn_id);
                    return None;
                }
            },
        };

        if !scored.is_anomalous {
            return None;
        }

        Some(RiskFlag {
            rule_name: "unusual_pattern".into(),
            explanation: self.explain(txn, history),
            severity: Severity::High,
            detector_type: DetectorType::Anomaly,
        })
    }

    /// Directional explanation: name the dominant deviation rather than
    /// quoting a score.
    fn explain(&self, txn: &Transaction, history: &[&Transaction]) -> String {
        let generic =
            "This purchase significantly deviates from your established spending habits.";
        let snapshot = match &self.snapshot {
            Some(s) => s,
            None => return generic.into(),
        };
        let z = snapshot
            .stats
            .standardize(&feature_row(txn, rolling_sum_one(txn, history)));
        let z_rolling = z[3];
        let z_amount = z[4];
        let late_night = is_late_night_hour(txn.timestamp.hour());

        if z_amount > 1.0 && z_amount >= z_rolling {
            format!(
                "This ${:.2} purchase is unusually large compared to your typical spending.",
                txn.amount
            )
        } else if z_rolling > 1.0 {
            "This purchase is unusually high relative to your 7-day spending pattern.".into()
        } else if late_night && txn.category.is_discretionary() {
            "This late-night discretionary purchase falls outside your usual spending times."
                .into()
        } else {
            generic.into()
        }
    }
}
