//! Behavioral detector — stateless rules over a single transaction and its
//! own declared budget/time fields:
//!   1. Budget drain (amount vs. remaining monthly budget)
//!   2. Late-night purchases (22:00 inclusive through 04:00 exclusive)

use crate::{
    models::{RiskFlag, Transaction},
    types::{DetectorType, Severity},
};
use chrono::Timelike;

// ── Constants ────────────────────────────────────────────────────────────────

const BUDGET_DRAIN_RATIO: f64 = 0.5;
const BUDGET_DRAIN_HIGH_RATIO: f64 = 0.8;
const LATE_NIGHT_START_HOUR: u32 = 22; // inclusive
const LATE_NIGHT_END_HOUR: u32 = 4; // exclusive

/// True iff `hour` falls in the late-night window, which wraps midnight.
pub fn is_late_night_hour(hour: u32) -> bool {
    hour >= LATE_NIGHT_START_HOUR || hour < LATE_NIGHT_END_HOUR
}

// ── Detector ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct BehavioralDetector;

impl BehavioralDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate both rules independently; never short-circuits.
    pub fn detect(&self, txn: &Transaction) -> Vec<RiskFlag> {
        let mut flags = Vec::new();
        if let Some(flag) = self.check_budget_drain(txn) {
            flags.push(flag);
        }
        if let Some(flag) = self.check_late_night(txn) {
            flags.push(flag);
        }
        flags
    }

    /// Flag iff amount strictly exceeds half the remaining budget.
    /// Exact equality does not flag. High severity past the 80% mark.
    fn check_budget_drain(&self, txn: &Transaction) -> Option<RiskFlag> {
        let remaining = txn.monthly_budget_remaining;

        if remaining <= 0.0 {
            return Some(RiskFlag {
                rule_name: "budget_drain".into(),
                explanation: format!(
                    "This ${:.2} purchase will push you further over budget \
                     (remaining: ${:.2}).",
                    txn.amount, remaining
                ),
                severity: Severity::High,
                detector_type: DetectorType::Behavioral,
            });
        }

        if txn.amount > BUDGET_DRAIN_RATIO * remaining {
            let severity = if txn.amount > BUDGET_DRAIN_HIGH_RATIO * remaining {
                Severity::High
            } else {
                Severity::Medium
            };
            let pct = txn.amount / remaining * 100.0;
            return Some(RiskFlag {
                rule_name: "budget_drain".into(),
                explanation: format!(
                    "This ${:.2} purchase uses {pct:.0}% of your remaining \
                     monthly budget (${remaining:.2}).",
                    txn.amount
                ),
                severity,
                detector_type: DetectorType::Behavioral,
            });
        }

        None
    }

    fn check_late_night(&self, txn: &Transaction) -> Option<RiskFlag> {
        if !is_late_night_hour(txn.timestamp.hour()) {
            return None;
        }
        Some(RiskFlag {
            rule_name: "late_night_regret".into(),
            explanation: format!(
                "Late-night purchase detected at {}. Purchases made between \
                 10 PM and 4 AM are more likely to be regretted.",
                txn.timestamp.format("%H:%M")
            ),
            severity: Severity::Medium,
            detector_type: DetectorType::Behavioral,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{txn_at, txn_with_budget};

    fn rule_names(flags: &[RiskFlag]) -> Vec<&str> {
        flags.iter().map(|f| f.rule_name.as_str()).collect()
    }

    #[test]
    fn budget_drain_is_strict_inequality() {
        let det = BehavioralDetector::new();
        // Exactly half the remaining budget: no flag.
        let at_half = txn_with_budget("T1", 50.0, 100.0, "2026-01-10 12:00:00");
        assert!(det.detect(&at_half).is_empty());

        // One cent past half: flag, medium.
        let past_half = txn_with_budget("T2", 50.01, 100.0, "2026-01-10 12:00:00");
        let flags = det.detect(&past_half);
        assert_eq!(rule_names(&flags), vec!["budget_drain"]);
        assert_eq!(flags[0].severity, Severity::Medium);
    }

    #[test]
    fn budget_drain_high_severity_past_eighty_percent() {
        let det = BehavioralDetector::new();
        let txn = txn_with_budget("T1", 81.0, 100.0, "2026-01-10 12:00:00");
        let flags = det.detect(&txn);
        assert_eq!(flags[0].severity, Severity::High);

        // Exactly 80% stays medium: the high band is also strict.
        let at_edge = txn_with_budget("T2", 80.0, 100.0, "2026-01-10 12:00:00");
        assert_eq!(det.detect(&at_edge)[0].severity, Severity::Medium);
    }

    #[test]
    fn exhausted_budget_always_flags_high() {
        let det = BehavioralDetector::new();
        let txn = txn_with_budget("T1", 5.0, 0.0, "2026-01-10 12:00:00");
        let flags = det.detect(&txn);
        assert_eq!(flags[0].severity, Severity::High);
        assert!(flags[0].explanation.contains("over budget"));
    }

    #[test]
    fn late_night_window_edges() {
        assert!(is_late_night_hour(22));
        assert!(is_late_night_hour(23));
        assert!(is_late_night_hour(0));
        assert!(is_late_night_hour(3));
        assert!(!is_late_night_hour(4));
        assert!(!is_late_night_hour(21));
        assert!(!is_late_night_hour(12));
    }

    #[test]
    fn late_night_flag_at_upper_edge_only() {
        let det = BehavioralDetector::new();
        let at_22 = txn_at("T1", "U1", "2026-01-10 22:00:00", 10.0);
        assert_eq!(rule_names(&det.detect(&at_22)), vec!["late_night_regret"]);

        // 04:00:00 exactly is outside the window.
        let at_4 = txn_at("T2", "U1", "2026-01-10 04:00:00", 10.0);
        assert!(det.detect(&at_4).is_empty());
    }

    #[test]
    fn both_rules_fire_together() {
        // Budget 100, amount 60, 23:00 — the canonical two-flag scenario.
        let det = BehavioralDetector::new();
        let txn = txn_with_budget("T1", 60.0, 100.0, "2026-01-10 23:00:00");
        let flags = det.detect(&txn);
        assert_eq!(rule_names(&flags), vec!["budget_drain", "late_night_regret"]);
        // 60/100 = 0.6, under the 0.8 band.
        assert_eq!(flags[0].severity, Severity::Medium);
        assert_eq!(flags[1].severity, Severity::Medium);
    }
}
