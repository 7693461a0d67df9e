//! Dashboard metric derivation — pure functions over the store and ledger,
//! recomputed on every query. Nothing here caches or mutates.

use crate::{
    behavioral::is_late_night_hour,
    ledger::DecisionLedger,
    models::DashboardMetrics,
    store::TransactionStore,
    types::Decision,
};
use chrono::Timelike;

const OVERRIDE_WEIGHT: f64 = 0.6;
const LATE_NIGHT_WEIGHT: f64 = 0.4;

pub fn compute(store: &TransactionStore, ledger: &DecisionLedger) -> DashboardMetrics {
    let total_transactions = store.len();
    let total_flagged = store.flagged_count();
    let proceeded = ledger.count(Decision::Proceeded);

    let override_rate = if total_flagged > 0 {
        100.0 * proceeded as f64 / total_flagged as f64
    } else {
        0.0
    };

    let late_night_count = store
        .all()
        .filter(|(t, _)| is_late_night_hour(t.timestamp.hour()))
        .count();
    let late_night_pct = if total_transactions > 0 {
        late_night_count as f64 / total_transactions as f64 * 100.0
    } else {
        0.0
    };

    DashboardMetrics {
        total_transactions,
        total_flagged,
        money_saved: ledger.cancelled_amount(),
        override_rate,
        impulsivity_score: impulsivity_score(override_rate, late_night_pct),
    }
}

/// Weighted combination of the override rate and the late-night share,
/// both percentages. Monotone in each input, clamped to [0, 100].
pub fn impulsivity_score(override_rate: f64, late_night_pct: f64) -> f64 {
    let score = OVERRIDE_WEIGHT * override_rate + LATE_NIGHT_WEIGHT * late_night_pct;
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerEntry, RiskAssessment};
    use crate::testutil::{txn_at, txn_with_budget};
    use crate::types::TxnState;
    use chrono::Utc;

    fn entry_for(txn: crate::models::Transaction, decision: Decision) -> LedgerEntry {
        let now = Utc::now().naive_utc();
        let assessment = RiskAssessment {
            transaction: txn,
            risk_flags: Vec::new(),
            is_flagged: true,
            assessment_timestamp: now,
        };
        LedgerEntry::from_assessment(&assessment, decision, now)
    }

    #[test]
    fn empty_session_yields_all_zeroes() {
        let metrics = compute(&TransactionStore::new(), &DecisionLedger::new());
        assert_eq!(metrics, DashboardMetrics::default());
    }

    #[test]
    fn override_rate_guards_division_by_zero() {
        // Transactions exist but none flagged.
        let mut store = TransactionStore::new();
        store.append(txn_at("T1", "U1", "2026-01-10 12:00:00", 10.0)).unwrap();
        store.set_state("T1", TxnState::Clean);
        let metrics = compute(&store, &DecisionLedger::new());
        assert_eq!(metrics.override_rate, 0.0);
        assert!(!metrics.override_rate.is_nan());
    }

    #[test]
    fn override_rate_is_exact() {
        let mut store = TransactionStore::new();
        let mut ledger = DecisionLedger::new();
        for (i, decision) in [Decision::Proceeded, Decision::Cancelled, Decision::Cancelled]
            .iter()
            .enumerate()
        {
            let id = format!("T{i}");
            let txn = txn_with_budget(&id, 100.0, 50.0, "2026-01-10 12:00:00");
            store.append(txn.clone()).unwrap();
            store.set_state(&id, TxnState::FlaggedPending);
            store.set_state(
                &id,
                match decision {
                    Decision::Cancelled => TxnState::Cancelled,
                    Decision::Proceeded => TxnState::Proceeded,
                },
            );
            ledger.append(entry_for(txn, *decision));
        }
        let metrics = compute(&store, &ledger);
        assert_eq!(metrics.total_flagged, 3);
        assert_eq!(metrics.override_rate, 100.0 / 3.0);
        assert_eq!(metrics.money_saved, 200.0);
    }

    #[test]
    fn money_saved_sums_only_cancellations() {
        let mut ledger = DecisionLedger::new();
        ledger.append(entry_for(
            txn_at("T1", "U1", "2026-01-10 12:00:00", 120.50),
            Decision::Cancelled,
        ));
        ledger.append(entry_for(
            txn_at("T2", "U1", "2026-01-10 13:00:00", 999.0),
            Decision::Proceeded,
        ));
        ledger.append(entry_for(
            txn_at("T3", "U1", "2026-01-10 14:00:00", 79.50),
            Decision::Cancelled,
        ));
        let metrics = compute(&TransactionStore::new(), &ledger);
        assert_eq!(metrics.money_saved, 200.0);
    }

    #[test]
    fn impulsivity_score_is_bounded_and_monotone() {
        for &rate in &[0.0, 25.0, 50.0, 100.0] {
            for &pct in &[0.0, 10.0, 60.0, 100.0] {
                let s = impulsivity_score(rate, pct);
                assert!((0.0..=100.0).contains(&s));
            }
        }
        // Monotone in both components.
        assert!(impulsivity_score(80.0, 20.0) >= impulsivity_score(40.0, 20.0));
        assert!(impulsivity_score(40.0, 80.0) >= impulsivity_score(40.0, 20.0));
        // Out-of-range inputs still clamp.
        assert_eq!(impulsivity_score(1e6, 1e6), 100.0);
        assert_eq!(impulsivity_score(-50.0, 0.0), 0.0);
    }

    #[test]
    fn late_night_share_feeds_impulsivity() {
        let mut store = TransactionStore::new();
        store.append(txn_at("T1", "U1", "2026-01-10 23:30:00", 10.0)).unwrap();
        store.set_state("T1", TxnState::Clean);
        store.append(txn_at("T2", "U1", "2026-01-10 12:00:00", 10.0)).unwrap();
        store.set_state("T2", TxnState::Clean);
        let metrics = compute(&store, &DecisionLedger::new());
        // 0 override, 50% late-night share -> 0.4 * 50.
        assert_eq!(metrics.impulsivity_score, 20.0);
    }
}
