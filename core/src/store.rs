//! In-memory transaction store.
//!
//! RULE: Only store.rs owns transaction records and their lifecycle tags.
//! Detectors receive read-only history slices — they never reach into the
//! store directly. The store is append-only for the session lifetime; the
//! only mutation is the one-shot state transition driven by the engine.

use crate::{
    error::{RiskError, RiskResult},
    models::{Transaction, TransactionRecord},
    types::{TxnId, TxnState, UserId},
};
use chrono::NaiveDateTime;
use std::collections::HashMap;

struct StoredTxn {
    txn: Transaction,
    state: TxnState,
}

#[derive(Default)]
pub struct TransactionStore {
    records: Vec<StoredTxn>,
    by_id: HashMap<TxnId, usize>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction in `Created` state.
    /// Fails if the id is already present; the record never enters the store.
    pub fn append(&mut self, txn: Transaction) -> RiskResult<()> {
        if self.by_id.contains_key(&txn.txn_id) {
            return Err(RiskError::DuplicateId(txn.txn_id));
        }
        self.by_id.insert(txn.txn_id.clone(), self.records.len());
        self.records.push(StoredTxn {
            txn,
            state: TxnState::Created,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, txn_id: &str) -> bool {
        self.by_id.contains_key(txn_id)
    }

    pub fn get(&self, txn_id: &str) -> Option<(&Transaction, TxnState)> {
        self.by_id
            .get(txn_id)
            .map(|&i| (&self.records[i].txn, self.records[i].state))
    }

    /// One user's transactions with `since <= timestamp < until`,
    /// in timestamp order. Non-destructive; callable repeatedly.
    pub fn window(
        &self,
        user_id: &str,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Vec<&Transaction> {
        let mut out: Vec<&Transaction> = self
            .records
            .iter()
            .map(|r| &r.txn)
            .filter(|t| t.user_id == user_id && t.timestamp >= since && t.timestamp < until)
            .collect();
        out.sort_by_key(|t| t.timestamp);
        out
    }

    /// One user's history up to and including `through`, excluding the
    /// transaction named by `exclude_id`. This is the slice the contextual
    /// detector and the anomaly scorer evaluate against.
    pub fn history_through<'a>(
        &'a self,
        user_id: &str,
        through: NaiveDateTime,
        exclude_id: &str,
    ) -> Vec<&'a Transaction> {
        let mut out: Vec<&Transaction> = self
            .records
            .iter()
            .map(|r| &r.txn)
            .filter(|t| t.user_id == user_id && t.timestamp <= through && t.txn_id != exclude_id)
            .collect();
        out.sort_by_key(|t| t.timestamp);
        out
    }

    /// Every transaction in insertion order.
    pub fn all(&self) -> impl Iterator<Item = (&Transaction, TxnState)> {
        self.records.iter().map(|r| (&r.txn, r.state))
    }

    /// Owned snapshot of the full corpus, used as the model fit input.
    pub fn corpus(&self) -> Vec<Transaction> {
        self.records.iter().map(|r| r.txn.clone()).collect()
    }

    /// Insertion-ordered query view with derived flag/decision fields.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records
            .iter()
            .map(|r| TransactionRecord {
                transaction: r.txn.clone(),
                is_flagged: r.state.is_flagged(),
                user_decision: r.state.decision(),
            })
            .collect()
    }

    /// Ids of transactions still awaiting their first evaluation,
    /// in insertion order.
    pub fn unevaluated_ids(&self) -> Vec<TxnId> {
        self.records
            .iter()
            .filter(|r| r.state == TxnState::Created)
            .map(|r| r.txn.txn_id.clone())
            .collect()
    }

    pub fn flagged_count(&self) -> usize {
        self.records.iter().filter(|r| r.state.is_flagged()).count()
    }

    /// Distinct users seen this session.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut seen: Vec<UserId> = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.txn.user_id) {
                seen.push(r.txn.user_id.clone());
            }
        }
        seen
    }

    /// One-shot state transition. Engine-only; panics in debug builds on an
    /// illegal transition, which would indicate an engine sequencing bug.
    pub(crate) fn set_state(&mut self, txn_id: &str, next: TxnState) {
        if let Some(&i) = self.by_id.get(txn_id) {
            let prev = self.records[i].state;
            debug_assert!(
                matches!(
                    (prev, next),
                    (TxnState::Created, TxnState::Clean)
                        | (TxnState::Created, TxnState::FlaggedPending)
                        | (TxnState::Created, TxnState::Proceeded)
                        | (TxnState::FlaggedPending, TxnState::Cancelled)
                        | (TxnState::FlaggedPending, TxnState::Proceeded)
                ),
                "illegal state transition {prev:?} -> {next:?} for {txn_id}"
            );
            self.records[i].state = next;
        }
    }
}
