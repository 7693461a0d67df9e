//! Session facade — one memory-resident engine behind a lock, exposed as
//! the operation surface a frontend or CLI talks to.
//!
//! RULES:
//!   - All mutation goes through the single write lock; queries take the
//!     read lock and return owned snapshots, never guarded references.
//!   - Bulk ingest is validate -> append -> train -> classify, in that
//!     order. A record that fails validation is counted and skipped; it
//!     never aborts the rest of the batch.
//!   - Session state lives and dies with this process. Nothing persists.

use crate::{
    config::EngineConfig,
    engine::RiskEngine,
    error::{RiskError, RiskResult},
    ingest::{self, IngestSummary},
    metrics,
    models::{DashboardMetrics, LedgerEntry, RiskAssessment, TransactionRecord},
    types::Decision,
};
use anyhow::anyhow;
use serde_json::Value;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

pub struct SessionContext {
    session_id: Uuid,
    engine: RwLock<RiskEngine>,
}

impl SessionContext {
    pub fn new(config: EngineConfig) -> Self {
        let session_id = Uuid::new_v4();
        log::info!("session {session_id} started");
        Self {
            session_id,
            engine: RwLock::new(RiskEngine::new(config)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn read(&self) -> RiskResult<RwLockReadGuard<'_, RiskEngine>> {
        self.engine
            .read()
            .map_err(|_| RiskError::Other(anyhow!("engine lock poisoned")))
    }

    fn write(&self) -> RiskResult<RwLockWriteGuard<'_, RiskEngine>> {
        self.engine
            .write()
            .map_err(|_| RiskError::Other(anyhow!("engine lock poisoned")))
    }

    /// Load a batch of historical records: validate each, append the valid
    /// ones, fit the anomaly model over the grown corpus, then classify the
    /// backlog. Invalid records and duplicate ids are counted as rejected.
    pub fn ingest_bulk(&self, records: &[Value]) -> RiskResult<IngestSummary> {
        let mut engine = self.write()?;
        let mut summary = IngestSummary {
            accepted: 0,
            rejected: 0,
        };
        for (i, raw) in records.iter().enumerate() {
            let txn = match ingest::parse_record(raw, Some(i), engine.config()) {
                Ok(txn) => txn,
                Err(e) => {
                    log::warn!("record {i} rejected: {e}");
                    summary.rejected += 1;
                    continue;
                }
            };
            match engine.store_mut().append(txn) {
                Ok(()) => summary.accepted += 1,
                Err(e) => {
                    log::warn!("record {i} rejected: {e}");
                    summary.rejected += 1;
                }
            }
        }
        engine.train_ml_model()?;
        let flagged = engine.classify_backlog()?;
        log::info!(
            "ingested {} record(s), rejected {}, auto-processed {} flagged",
            summary.accepted,
            summary.rejected,
            flagged
        );
        Ok(summary)
    }

    /// Validate and evaluate one live transaction.
    pub fn evaluate(&self, raw: &Value) -> RiskResult<RiskAssessment> {
        let mut engine = self.write()?;
        let txn = ingest::parse_record(raw, None, engine.config())?;
        engine.evaluate_transaction(txn)
    }

    /// Resolve the pending flagged transaction.
    pub fn decide(&self, decision: Decision) -> RiskResult<LedgerEntry> {
        self.write()?.record_decision(decision)
    }

    pub fn has_pending(&self) -> RiskResult<bool> {
        Ok(self.read()?.pending_assessment().is_some())
    }

    pub fn pending_assessment(&self) -> RiskResult<Option<RiskAssessment>> {
        Ok(self.read()?.pending_assessment().cloned())
    }

    /// All transactions in insertion order, with derived flag/decision fields.
    pub fn query_transactions(&self) -> RiskResult<Vec<TransactionRecord>> {
        Ok(self.read()?.store().records())
    }

    /// Dashboard KPIs, recomputed from the store and ledger on every call.
    pub fn query_metrics(&self) -> RiskResult<DashboardMetrics> {
        let engine = self.read()?;
        Ok(metrics::compute(engine.store(), engine.ledger()))
    }

    /// Ledger entries in insertion order, optionally narrowed to one
    /// decision kind.
    pub fn query_ledger(&self, decision: Option<Decision>) -> RiskResult<Vec<LedgerEntry>> {
        let engine = self.read()?;
        Ok(match decision {
            Some(d) => engine.ledger().filter(d).into_iter().cloned().collect(),
            None => engine.ledger().all().to_vec(),
        })
    }

    /// Drop all session state. The session id survives; everything else
    /// starts over.
    pub fn reset(&self) -> RiskResult<()> {
        self.write()?.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> SessionContext {
        SessionContext::new(EngineConfig::default())
    }

    fn raw(id: &str, when: &str, amount: f64) -> Value {
        json!({
            "txn_id": id,
            "user_id": "U1",
            "timestamp": when,
            "amount": amount,
            "category": "groceries",
            "monthly_budget_remaining": 10_000.0,
            "location": "Hometown",
        })
    }

    #[test]
    fn bulk_ingest_counts_accepted_and_rejected() {
        let ctx = session();
        let records = vec![
            raw("T1", "2026-01-10 12:00:00", 30.0),
            json!({"timestamp": "nonsense", "amount": 10.0, "category": "bills"}),
            raw("T1", "2026-01-11 12:00:00", 40.0), // duplicate id
            raw("T2", "2026-01-12 12:00:00", 50.0),
        ];
        let summary = ctx.ingest_bulk(&records).unwrap();
        assert_eq!(summary, IngestSummary { accepted: 2, rejected: 2 });
        assert_eq!(ctx.query_transactions().unwrap().len(), 2);
    }

    #[test]
    fn bulk_ingest_auto_resolves_flagged_history() {
        let ctx = session();
        let mut records: Vec<Value> = (0..5)
            .map(|i| raw(&format!("T{i}"), &format!("2026-01-{:02} 12:00:00", i + 1), 30.0))
            .collect();
        let mut late = raw("T_LATE", "2026-01-09 23:30:00", 90.0);
        late["monthly_budget_remaining"] = json!(100.0);
        records.push(late);

        ctx.ingest_bulk(&records).unwrap();
        let ledger = ctx.query_ledger(None).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].txn_id, "T_LATE");
        assert_eq!(ledger[0].user_decision, Decision::Proceeded);
        // Historical auto-resolution never occupies the pending slot.
        assert!(!ctx.has_pending().unwrap());
    }

    #[test]
    fn live_evaluation_and_decision_round_trip() {
        let ctx = session();
        let mut flagged = raw("T_FLAG", "2026-01-10 23:00:00", 60.0);
        flagged["monthly_budget_remaining"] = json!(100.0);

        let assessment = ctx.evaluate(&flagged).unwrap();
        assert!(assessment.is_flagged);
        assert!(ctx.has_pending().unwrap());
        assert_eq!(
            ctx.pending_assessment().unwrap().map(|a| a.transaction.txn_id),
            Some("T_FLAG".to_string())
        );

        let entry = ctx.decide(Decision::Cancelled).unwrap();
        assert_eq!(entry.user_decision, Decision::Cancelled);
        assert!(!ctx.has_pending().unwrap());

        let metrics = ctx.query_metrics().unwrap();
        assert_eq!(metrics.total_flagged, 1);
        assert_eq!(metrics.money_saved, 60.0);
    }

    #[test]
    fn ledger_query_narrows_by_decision() {
        let ctx = session();
        let mut flagged = raw("T_FLAG", "2026-01-10 23:00:00", 60.0);
        flagged["monthly_budget_remaining"] = json!(100.0);
        ctx.evaluate(&flagged).unwrap();
        ctx.decide(Decision::Cancelled).unwrap();

        assert_eq!(ctx.query_ledger(Some(Decision::Cancelled)).unwrap().len(), 1);
        assert!(ctx.query_ledger(Some(Decision::Proceeded)).unwrap().is_empty());
    }

    #[test]
    fn reset_clears_state_but_keeps_the_session_id() {
        let ctx = session();
        let id = ctx.session_id();
        ctx.ingest_bulk(&[raw("T1", "2026-01-10 12:00:00", 30.0)]).unwrap();
        ctx.reset().unwrap();
        assert_eq!(ctx.session_id(), id);
        assert!(ctx.query_transactions().unwrap().is_empty());
        assert_eq!(ctx.query_metrics().unwrap(), DashboardMetrics::default());
    }
}
