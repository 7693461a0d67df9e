use crate::types::TxnId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("invalid field '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("transaction id '{0}' already exists")]
    DuplicateId(TxnId),

    #[error("transaction '{pending}' is still awaiting a decision")]
    PendingDecisionExists { pending: TxnId },

    #[error("no flagged transaction is awaiting a decision")]
    NoPendingDecision,

    #[error("cooling-off period not elapsed: {remaining_secs}s remaining")]
    CooldownNotElapsed { remaining_secs: i64 },

    #[error("anomaly model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RiskResult<T> = Result<T, RiskError>;
