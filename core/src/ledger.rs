//! Decision ledger — append-only record of flagged transactions and the
//! user's final call on each. Source of truth for the money-saved and
//! override-rate metrics.

use crate::{models::LedgerEntry, types::Decision};

#[derive(Default)]
pub struct DecisionLedger {
    entries: Vec<LedgerEntry>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn all(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Entries matching one decision kind, in insertion order.
    pub fn filter(&self, decision: Decision) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.user_decision == decision)
            .collect()
    }

    pub fn count(&self, decision: Decision) -> usize {
        self.entries
            .iter()
            .filter(|e| e.user_decision == decision)
            .count()
    }

    /// Exact sum of amounts over cancelled entries.
    pub fn cancelled_amount(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.user_decision == Decision::Cancelled)
            .map(|e| e.transaction.amount)
            .sum()
    }
}
