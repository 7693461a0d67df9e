//! Shared primitive types used across the risk engine.

use serde::{Deserialize, Serialize};

/// A stable, unique transaction identifier.
pub type TxnId = String;

/// A stable user identifier. Sessions are single-tenant but every
/// history window is keyed by user.
pub type UserId = String;

/// Fixed spending-category enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Groceries,
    Dining,
    Entertainment,
    Shopping,
    Bills,
    Travel,
    Health,
    Education,
    Utilities,
    Other,
}

impl Category {
    /// Discretionary categories feed the anomaly model's impulse indicator.
    pub fn is_discretionary(&self) -> bool {
        matches!(
            self,
            Self::Shopping | Self::Entertainment | Self::Travel | Self::Dining
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "groceries" => Some(Self::Groceries),
            "dining" => Some(Self::Dining),
            "entertainment" => Some(Self::Entertainment),
            "shopping" => Some(Self::Shopping),
            "bills" => Some(Self::Bills),
            "travel" => Some(Self::Travel),
            "health" => Some(Self::Health),
            "education" => Some(Self::Education),
            "utilities" => Some(Self::Utilities),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    MobileApp,
    Web,
    Pos,
}

impl Channel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "mobile_app" => Some(Self::MobileApp),
            "web" => Some(Self::Web),
            "pos" => Some(Self::Pos),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    New,
    Existing,
}

impl RecipientStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "new" => Some(Self::New),
            "existing" => Some(Self::Existing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectorType {
    Behavioral,
    Contextual,
    Anomaly,
}

/// The user's final call on a flagged transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Cancelled,
    Proceeded,
}

/// Per-transaction lifecycle state, kept beside the immutable record in the
/// store rather than as mutable fields on the transaction itself.
///
/// Created -> {Clean | FlaggedPending} -> {Cancelled | Proceeded}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    /// Appended but not yet evaluated (bulk ingest backlog).
    Created,
    /// Evaluated, no flags. Terminal.
    Clean,
    /// Evaluated, flagged, awaiting exactly one user decision.
    FlaggedPending,
    /// Flagged and cancelled by the user. Terminal.
    Cancelled,
    /// Flagged and overridden by the user. Terminal.
    Proceeded,
}

impl TxnState {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::FlaggedPending | Self::Cancelled | Self::Proceeded)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Clean | Self::Cancelled | Self::Proceeded)
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            Self::Cancelled => Some(Decision::Cancelled),
            Self::Proceeded => Some(Decision::Proceeded),
            _ => None,
        }
    }
}
