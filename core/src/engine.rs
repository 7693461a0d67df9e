//! The risk engine — orchestrates the three detectors and enforces the
//! single-pending-decision protocol.
//!
//! DETECTOR ORDER (fixed, documented, never reordered):
//!   1. Behavioral (transaction-local rules)
//!   2. Contextual (sliding-window rules over the user's history)
//!   3. Anomaly    (batch-cached lookup, else ad-hoc snapshot scoring)
//!
//! RULES:
//!   - A transaction is appended to the store before any detector runs;
//!     duplicate ids never enter evaluation.
//!   - At most one transaction is Flagged-Pending at a time. A second
//!     evaluation while one is pending fails rather than queueing.
//!   - Model absence degrades to rules-only evaluation, never to failure.
//!   - A "proceeded" decision is validated against the cooling-off period
//!     here, not in the caller.

use crate::{
    anomaly::AnomalyScorer,
    behavioral::BehavioralDetector,
    config::EngineConfig,
    contextual::ContextualDetector,
    error::{RiskError, RiskResult},
    ledger::DecisionLedger,
    models::{LedgerEntry, RiskAssessment, RiskFlag, Transaction},
    store::TransactionStore,
    types::{Decision, TxnId, TxnState},
};
use chrono::{NaiveDateTime, Utc};

struct PendingDecision {
    txn_id: TxnId,
    assessment: RiskAssessment,
}

pub struct RiskEngine {
    config: EngineConfig,
    store: TransactionStore,
    ledger: DecisionLedger,
    behavioral: BehavioralDetector,
    contextual: ContextualDetector,
    scorer: AnomalyScorer,
    pending: Option<PendingDecision>,
    money_saved: f64,
}

impl RiskEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scorer: AnomalyScorer::new(&config),
            store: TransactionStore::new(),
            ledger: DecisionLedger::new(),
            behavioral: BehavioralDetector::new(),
            contextual: ContextualDetector::new(),
            pending: None,
            money_saved: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Bulk-ingest seam: appended records stay `Created` until
    /// `classify_backlog` evaluates them.
    pub(crate) fn store_mut(&mut self) -> &mut TransactionStore {
        &mut self.store
    }

    pub fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    pub fn money_saved(&self) -> f64 {
        self.money_saved
    }

    pub fn pending_assessment(&self) -> Option<&RiskAssessment> {
        self.pending.as_ref().map(|p| &p.assessment)
    }

    /// Run one transaction through the full detector stack.
    ///
    /// Appends to the store first (rejecting duplicates), concatenates
    /// flags in detector order, and on any flag enters the Flagged-Pending
    /// state that blocks further evaluation until `record_decision`.
    pub fn evaluate_transaction(&mut self, txn: Transaction) -> RiskResult<RiskAssessment> {
        if let Some(p) = &self.pending {
            return Err(RiskError::PendingDecisionExists {
                pending: p.txn_id.clone(),
            });
        }

        self.store.append(txn.clone())?;
        let flags = self.assess_flags(&txn);
        let assessment = RiskAssessment {
            is_flagged: !flags.is_empty(),
            transaction: txn.clone(),
            risk_flags: flags,
            assessment_timestamp: Utc::now().naive_utc(),
        };

        if assessment.is_flagged {
            self.store.set_state(&txn.txn_id, TxnState::FlaggedPending);
            self.pending = Some(PendingDecision {
                txn_id: txn.txn_id.clone(),
                assessment: assessment.clone(),
            });
            log::info!(
                "flagged {} (${:.2}) with {} flag(s); awaiting decision",
                txn.txn_id,
                txn.amount,
                assessment.risk_flags.len()
            );
        } else {
            self.store.set_state(&txn.txn_id, TxnState::Clean);
            log::debug!("{} evaluated clean", txn.txn_id);
        }

        Ok(assessment)
    }

    /// Record the user's decision for the pending transaction, stamped now.
    pub fn record_decision(&mut self, decision: Decision) -> RiskResult<LedgerEntry> {
        self.record_decision_at(decision, Utc::now().naive_utc())
    }

    /// Record a decision with an explicit timestamp. The timestamp must not
    /// precede the assessment, and a "proceeded" decision must wait out the
    /// cooling-off period — clients cannot shortcut the countdown.
    pub fn record_decision_at(
        &mut self,
        decision: Decision,
        decision_timestamp: NaiveDateTime,
    ) -> RiskResult<LedgerEntry> {
        let pending = self.pending.as_ref().ok_or(RiskError::NoPendingDecision)?;
        let assessed_at = pending.assessment.assessment_timestamp;

        if decision_timestamp < assessed_at {
            return Err(RiskError::Validation {
                field: "decision_timestamp",
                reason: "decision precedes its assessment".into(),
            });
        }
        if decision == Decision::Proceeded {
            let elapsed = (decision_timestamp - assessed_at).num_seconds();
            if elapsed < self.config.proceed_cooldown_secs {
                return Err(RiskError::CooldownNotElapsed {
                    remaining_secs: self.config.proceed_cooldown_secs - elapsed,
                });
            }
        }

        // All checks passed; the pending slot is now consumed.
        let Some(pending) = self.pending.take() else {
            return Err(RiskError::NoPendingDecision);
        };
        let entry = LedgerEntry::from_assessment(&pending.assessment, decision, decision_timestamp);
        self.ledger.append(entry.clone());

        let final_state = match decision {
            Decision::Cancelled => {
                self.money_saved += entry.transaction.amount;
                TxnState::Cancelled
            }
            Decision::Proceeded => TxnState::Proceeded,
        };
        self.store.set_state(&pending.txn_id, final_state);

        log::info!(
            "recorded decision {:?} for {} (${:.2})",
            decision,
            entry.txn_id,
            entry.transaction.amount
        );
        Ok(entry)
    }

    /// Bulk entry point: fit the anomaly model over the whole store and
    /// batch-score it into the cache. Idempotent for a fixed corpus and
    /// seed. An undersized corpus degrades to rules-only detection.
    pub fn train_ml_model(&mut self) -> RiskResult<()> {
        let corpus = self.store.corpus();
        match self.scorer.fit(&corpus) {
            Ok(()) => {
                self.scorer.predict_batch(&corpus)?;
                Ok(())
            }
            Err(RiskError::ModelUnavailable(reason)) => {
                log::warn!("skipping model training: {reason}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Classify every still-unevaluated transaction (the bulk-ingest
    /// backlog) in insertion order. Flagged ones are auto-resolved as
    /// proceeded ledger entries — historical records cannot wait on a
    /// decision that was never offered.
    pub fn classify_backlog(&mut self) -> RiskResult<usize> {
        let mut flagged = 0;
        for txn_id in self.store.unevaluated_ids() {
            let txn = match self.store.get(&txn_id) {
                Some((t, _)) => t.clone(),
                None => continue,
            };
            let flags = self.assess_flags(&txn);
            if flags.is_empty() {
                self.store.set_state(&txn_id, TxnState::Clean);
                continue;
            }
            flagged += 1;
            let now = Utc::now().naive_utc();
            let assessment = RiskAssessment {
                transaction: txn,
                is_flagged: true,
                risk_flags: flags,
                assessment_timestamp: now,
            };
            self.ledger
                .append(LedgerEntry::from_assessment(&assessment, Decision::Proceeded, now));
            self.store.set_state(&txn_id, TxnState::Proceeded);
        }
        if flagged > 0 {
            log::info!("auto-processed backlog: {flagged} flagged transaction(s)");
        }
        Ok(flagged)
    }

    /// Discard store, ledger, model snapshot, and pending slot together.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
        log::info!("session state reset");
    }

    /// Detector stack in fixed order: behavioral, contextual, anomaly.
    fn assess_flags(&self, txn: &Transaction) -> Vec<RiskFlag> {
        let history = self
            .store
            .history_through(&txn.user_id, txn.timestamp, &txn.txn_id);

        let mut flags = self.behavioral.detect(txn);
        flags.extend(self.contextual.detect(txn, &history));
        if let Some(flag) = self.scorer.evaluate(txn, &history) {
            flags.push(flag);
        }
        flags
    }
}
