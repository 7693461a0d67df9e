//! Core model types: transactions, risk flags, assessments, ledger entries,
//! and the derived dashboard metrics.

use crate::types::{
    Category, Channel, Decision, DetectorType, RecipientStatus, Severity, TxnId, UserId,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A financial transaction record. Immutable once created; lifecycle state
/// lives in the store as a `TxnState` tag, never on this struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub txn_id: TxnId,
    pub user_id: UserId,
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    pub category: Category,
    pub recipient_status: RecipientStatus,
    pub monthly_budget_remaining: f64,
    pub device_id: String,
    pub location: String,
    pub channel: Channel,
}

/// An indicator that a single detection rule was triggered.
/// Value object, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFlag {
    pub rule_name: String,
    pub explanation: String,
    pub severity: Severity,
    pub detector_type: DetectorType,
}

/// Result of running one transaction through all three detectors.
/// Flags are ordered by detector: behavioral, then contextual, then anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub transaction: Transaction,
    pub risk_flags: Vec<RiskFlag>,
    pub is_flagged: bool,
    pub assessment_timestamp: NaiveDateTime,
}

/// Append-only record of a flagged transaction and the user's decision.
/// `risk_explanations` is the frozen text shown at decision time,
/// independent of any later flag-wording changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub txn_id: TxnId,
    pub transaction: Transaction,
    pub risk_flags: Vec<RiskFlag>,
    pub user_decision: Decision,
    pub decision_timestamp: NaiveDateTime,
    pub risk_explanations: Vec<String>,
}

impl LedgerEntry {
    /// Freeze an assessment into a ledger entry. Explanations are copied
    /// out of the flags so the shown text survives any later rewording.
    pub fn from_assessment(
        assessment: &RiskAssessment,
        decision: Decision,
        decision_timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            txn_id: assessment.transaction.txn_id.clone(),
            transaction: assessment.transaction.clone(),
            risk_flags: assessment.risk_flags.clone(),
            user_decision: decision,
            decision_timestamp,
            risk_explanations: assessment
                .risk_flags
                .iter()
                .map(|f| f.explanation.clone())
                .collect(),
        }
    }
}

/// A transaction plus its derived lifecycle view, as returned by the
/// query surface.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub is_flagged: bool,
    pub user_decision: Option<Decision>,
}

/// Dashboard KPIs. Derived, never stored; recomputed on every query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardMetrics {
    pub total_transactions: usize,
    pub total_flagged: usize,
    pub money_saved: f64,
    pub override_rate: f64,
    pub impulsivity_score: f64,
}
