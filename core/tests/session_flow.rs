//! End-to-end session flow through the public surface only: bulk ingest a
//! historical corpus, evaluate live transactions, resolve decisions, and
//! check the dashboard view — the full path a frontend drives.

use serde_json::{json, Value};
use spendguard_core::{types::Decision, EngineConfig, SessionContext};

fn record(id: &str, when: &str, amount: f64) -> Value {
    json!({
        "txn_id": id,
        "user_id": "USR_1",
        "timestamp": when,
        "amount": amount,
        "category": "groceries",
        "monthly_budget_remaining": 10_000.0,
        "device_id": "PHONE_A",
        "location": "Hometown",
        "channel": "mobile_app",
    })
}

/// Daytime corpus large enough to train the anomaly model, one transaction
/// per day with mild amount variation.
fn history(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            record(
                &format!("H{i:03}"),
                &format!("2026-01-{:02}T12:00:00", (i % 28) + 1),
                20.0 + (i % 9) as f64 * 3.0 + i as f64 * 0.01,
            )
        })
        .collect()
}

fn session() -> SessionContext {
    // Zero cooldown so the proceed path is testable without sleeping.
    SessionContext::new(EngineConfig {
        proceed_cooldown_secs: 0,
        ..EngineConfig::default()
    })
}

#[test]
fn full_session_lifecycle() {
    let ctx = session();

    // 1. Bulk ingest trains the model and classifies the backlog.
    let summary = ctx.ingest_bulk(&history(56)).unwrap();
    assert_eq!(summary.accepted, 56);
    assert_eq!(summary.rejected, 0);
    assert!(!ctx.has_pending().unwrap());

    // 2. A routine live transaction right after the corpus passes clean.
    let clean = ctx
        .evaluate(&record("LIVE_1", "2026-01-29T12:00:00", 25.0))
        .unwrap();
    assert!(!clean.is_flagged);

    // 3. A late-night budget-draining transaction is flagged and parks in
    //    the pending slot.
    let mut risky = record("LIVE_2", "2026-01-29T23:30:00", 90.0);
    risky["monthly_budget_remaining"] = json!(100.0);
    let flagged = ctx.evaluate(&risky).unwrap();
    assert!(flagged.is_flagged);
    let names: Vec<&str> = flagged
        .risk_flags
        .iter()
        .map(|f| f.rule_name.as_str())
        .collect();
    assert!(names.contains(&"budget_drain"));
    assert!(names.contains(&"late_night_regret"));

    // 4. While pending, further evaluation is refused.
    assert!(ctx
        .evaluate(&record("LIVE_3", "2026-01-29T23:31:00", 10.0))
        .is_err());

    // 5. Cancelling frees the slot and credits the exact amount.
    let entry = ctx.decide(Decision::Cancelled).unwrap();
    assert_eq!(entry.txn_id, "LIVE_2");
    assert!(!ctx.has_pending().unwrap());

    let metrics = ctx.query_metrics().unwrap();
    assert_eq!(metrics.money_saved, 90.0);
    assert!(metrics.total_transactions >= 58);

    // 6. The ledger holds the frozen decision record.
    let cancelled = ctx.query_ledger(Some(Decision::Cancelled)).unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].transaction.amount, 90.0);
    assert!(!cancelled[0].risk_explanations.is_empty());
}

#[test]
fn anomaly_layer_reaches_live_transactions_after_training() {
    let ctx = session();
    ctx.ingest_bulk(&history(56)).unwrap();

    // Daytime, generous budget, known device and location: only the anomaly
    // detector can reach this spike.
    let mut spike = record("SPIKE", "2026-01-29T12:00:00", 5000.0);
    spike["monthly_budget_remaining"] = json!(100_000.0);
    let assessment = ctx.evaluate(&spike).unwrap();
    assert!(assessment.is_flagged);
    assert_eq!(assessment.risk_flags.len(), 1);
    assert_eq!(assessment.risk_flags[0].rule_name, "unusual_pattern");

    let entry = ctx.decide(Decision::Proceeded).unwrap();
    assert_eq!(entry.user_decision, Decision::Proceeded);
    let metrics = ctx.query_metrics().unwrap();
    assert_eq!(metrics.money_saved, 0.0);
    assert!(metrics.override_rate > 0.0);
}

#[test]
fn reset_returns_the_session_to_a_blank_slate() {
    let ctx = session();
    ctx.ingest_bulk(&history(30)).unwrap();
    ctx.reset().unwrap();
    assert!(ctx.query_transactions().unwrap().is_empty());
    assert!(ctx.query_ledger(None).unwrap().is_empty());

    // Ids from before the reset are acceptable again.
    let again = ctx
        .evaluate(&record("H000", "2026-02-01T12:00:00", 20.0))
        .unwrap();
    assert!(!again.is_flagged);
}
