//! Contextual detector — stateful rules that compare a transaction against
//! the user's own sliding-window history:
//!   1. New recipient
//!   2. Frequency burst (3+ transactions in a trailing 10-minute window)
//!   3. Device anomaly  (unknown device vs. 24-hour baseline)
//!   4. Location anomaly (unknown location vs. 24-hour baseline)
//!
//! `history` is the user's prior transactions with timestamp <= the current
//! one, excluding the transaction under evaluation. Each rule applies its
//! own sub-window.

use crate::{
    models::{RiskFlag, Transaction},
    types::{DetectorType, RecipientStatus, Severity},
};
use chrono::Duration;
use std::collections::HashSet;

// ── Constants ────────────────────────────────────────────────────────────────

const FREQUENCY_WINDOW_MINUTES: i64 = 10;
const FREQUENCY_BURST_COUNT: usize = 3; // including the current transaction
const BASELINE_WINDOW_HOURS: i64 = 24;

// ── Detector ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ContextualDetector;

impl ContextualDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all four rules independently against the user's history.
    pub fn detect(&self, txn: &Transaction, history: &[&Transaction]) -> Vec<RiskFlag> {
        let mut flags = Vec::new();
        if let Some(flag) = self.check_new_recipient(txn) {
            flags.push(flag);
        }
        if let Some(flag) = self.check_frequency_burst(txn, history) {
            flags.push(flag);
        }
        if let Some(flag) = self.check_device_anomaly(txn, history) {
            flags.push(flag);
        }
        if let Some(flag) = self.check_location_anomaly(txn, history) {
            flags.push(flag);
        }
        flags
    }

    fn check_new_recipient(&self, txn: &Transaction) -> Option<RiskFlag> {
        if txn.recipient_status != RecipientStatus::New {
            return None;
        }
        Some(RiskFlag {
            rule_name: "new_recipient".into(),
            explanation: "This is your first transaction with this recipient. \
                          Please verify before proceeding."
                .into(),
            severity: Severity::Low,
            detector_type: DetectorType::Contextual,
        })
    }

    /// Count transactions in `[t - 10min, t]` including the current one.
    /// Evaluated fresh per transaction; never applied retroactively.
    fn check_frequency_burst(
        &self,
        txn: &Transaction,
        history: &[&Transaction],
    ) -> Option<RiskFlag> {
        let window_start = txn.timestamp - Duration::minutes(FREQUENCY_WINDOW_MINUTES);
        let count = history
            .iter()
            .filter(|t| t.timestamp >= window_start && t.timestamp <= txn.timestamp)
            .count()
            + 1;
        if count < FREQUENCY_BURST_COUNT {
            return None;
        }
        Some(RiskFlag {
            rule_name: "frequency_burst".into(),
            explanation: format!(
                "{count} transactions detected in the last 10 minutes. \
                 Rapid spending may indicate impulsive behavior."
            ),
            severity: Severity::Medium,
            detector_type: DetectorType::Contextual,
        })
    }

    fn check_device_anomaly(&self, txn: &Transaction, history: &[&Transaction]) -> Option<RiskFlag> {
        let baseline = self.baseline(txn, history, |t| t.device_id.as_str());
        if baseline.is_empty() || baseline.contains(txn.device_id.as_str()) {
            return None;
        }
        Some(RiskFlag {
            rule_name: "device_anomaly".into(),
            explanation: format!(
                "Transaction from unrecognised device '{}'. Recent transactions \
                 used different devices.",
                txn.device_id
            ),
            severity: Severity::High,
            detector_type: DetectorType::Contextual,
        })
    }

    fn check_location_anomaly(
        &self,
        txn: &Transaction,
        history: &[&Transaction],
    ) -> Option<RiskFlag> {
        let baseline = self.baseline(txn, history, |t| t.location.as_str());
        if baseline.is_empty() || baseline.contains(txn.location.as_str()) {
            return None;
        }
        Some(RiskFlag {
            rule_name: "location_anomaly".into(),
            explanation: format!(
                "Transaction from unusual location '{}'. Recent transactions \
                 were from different locations.",
                txn.location
            ),
            severity: Severity::High,
            detector_type: DetectorType::Contextual,
        })
    }

    /// Distinct values of `field` over `[t - 24h, t)`. The current
    /// transaction is excluded: an empty baseline establishes one instead
    /// of flagging.
    fn baseline<'a>(
        &self,
        txn: &Transaction,
        history: &[&'a Transaction],
        field: impl Fn(&'a Transaction) -> &'a str,
    ) -> HashSet<&'a str> {
        let window_start = txn.timestamp - Duration::hours(BASELINE_WINDOW_HOURS);
        history
            .iter()
            .filter(|t| t.timestamp >= window_start && t.timestamp < txn.timestamp)
            .map(|t| field(t))
            .collect()
    }
}
