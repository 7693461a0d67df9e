//! Shared builders for unit tests.

use crate::{
    models::Transaction,
    types::{Category, Channel, RecipientStatus},
};
use chrono::{Duration, NaiveDateTime};

pub(crate) fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("test timestamp")
}

pub(crate) struct TxnBuilder {
    txn: Transaction,
}

pub(crate) fn txn_builder(id: &str, user: &str, when: &str, amount: f64) -> TxnBuilder {
    TxnBuilder {
        txn: Transaction {
            txn_id: id.into(),
            user_id: user.into(),
            timestamp: ts(when),
            amount,
            category: Category::Groceries,
            recipient_status: RecipientStatus::Existing,
            monthly_budget_remaining: 10_000.0,
            device_id: "DEV_DEFAULT".into(),
            location: "Hometown".into(),
            channel: Channel::Web,
        },
    }
}

impl TxnBuilder {
    pub fn category(mut self, category: Category) -> Self {
        self.txn.category = category;
        self
    }

    pub fn recipient_new(mut self) -> Self {
        self.txn.recipient_status = RecipientStatus::New;
        self
    }

    pub fn budget(mut self, remaining: f64) -> Self {
        self.txn.monthly_budget_remaining = remaining;
        self
    }

    pub fn device(mut self, device: &str) -> Self {
        self.txn.device_id = device.into();
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.txn.location = location.into();
        self
    }

    pub fn build(self) -> Transaction {
        self.txn
    }
}

/// A plain transaction that triggers no rule on its own.
pub(crate) fn txn_at(id: &str, user: &str, when: &str, amount: f64) -> Transaction {
    txn_builder(id, user, when, amount).build()
}

pub(crate) fn txn_with_budget(id: &str, amount: f64, remaining: f64, when: &str) -> Transaction {
    txn_builder(id, "U1", when, amount).budget(remaining).build()
}

/// `n` unremarkable daytime transactions, one per day, with mild amount
/// variation. Used as a fit corpus.
pub(crate) fn routine_corpus(user: &str, n: usize) -> Vec<Transaction> {
    let start = ts("2026-01-01 12:00:00");
    (0..n)
        .map(|i| {
            let mut txn = txn_at(
                &format!("RTN_{i:03}"),
                user,
                "2026-01-01 12:00:00",
                20.0 + (i % 9) as f64 * 3.0 + i as f64 * 0.01,
            );
            txn.timestamp = start + Duration::days(i as i64);
            txn
        })
        .collect()
}
