//! Raw-record validation — the narrow gate between untyped field maps
//! (parsed upstream from CSV/JSON uploads) and typed transactions.
//!
//! A minimal record needs only timestamp, amount, and category; every other
//! field is auto-filled so sparse exports still ingest. Invalid records are
//! rejected with the failing field and never reach the store.

use crate::{
    config::EngineConfig,
    error::{RiskError, RiskResult},
    models::Transaction,
    types::{Category, Channel, RecipientStatus},
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

// ── Defaults for absent optional fields ──────────────────────────────────────

const DEFAULT_USER: &str = "USR_DEFAULT";
const DEFAULT_DEVICE: &str = "DEV_DEFAULT";
const DEFAULT_LOCATION: &str = "Unknown";
const DEFAULT_BUDGET_FLOOR: f64 = 2000.0;
const DEFAULT_BUDGET_MULTIPLIER: f64 = 5.0;

/// Outcome of a bulk ingest pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// Validate one raw record into a `Transaction`.
///
/// `index` is the record's position in a bulk batch, used for generated
/// ids (`TXN_00042`); ad-hoc records without an id get a UUID instead.
pub fn parse_record(
    raw: &Value,
    index: Option<usize>,
    config: &EngineConfig,
) -> RiskResult<Transaction> {
    let obj = raw.as_object().ok_or(RiskError::Validation {
        field: "record",
        reason: "not a JSON object".into(),
    })?;

    let field = |name: &str| -> Option<String> {
        match obj.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    };

    let txn_id = field("txn_id").unwrap_or_else(|| match index {
        Some(i) => format!("TXN_{:05}", i + 1),
        None => format!("TXN-{}", Uuid::new_v4().simple()),
    });
    let user_id = field("user_id").unwrap_or_else(|| DEFAULT_USER.into());

    let timestamp_raw = field("timestamp").ok_or(RiskError::Validation {
        field: "timestamp",
        reason: "missing".into(),
    })?;
    let timestamp = parse_timestamp(&timestamp_raw).ok_or_else(|| RiskError::Validation {
        field: "timestamp",
        reason: format!("cannot parse '{timestamp_raw}'"),
    })?;
    let horizon = Utc::now().naive_utc() + Duration::hours(config.max_future_skew_hours);
    if timestamp > horizon {
        return Err(RiskError::Validation {
            field: "timestamp",
            reason: format!("'{timestamp}' is too far in the future"),
        });
    }

    let amount = numeric_field(obj, "amount")?.ok_or(RiskError::Validation {
        field: "amount",
        reason: "missing".into(),
    })?;
    if amount <= 0.0 {
        return Err(RiskError::Validation {
            field: "amount",
            reason: format!("must be positive, got {amount}"),
        });
    }
    if amount > config.max_amount {
        return Err(RiskError::Validation {
            field: "amount",
            reason: format!("{amount} exceeds the {} cap", config.max_amount),
        });
    }

    let category_raw = field("category").ok_or(RiskError::Validation {
        field: "category",
        reason: "missing".into(),
    })?;
    let category = Category::parse(&category_raw).ok_or_else(|| RiskError::Validation {
        field: "category",
        reason: format!("unknown category '{category_raw}'"),
    })?;

    let recipient_status = match field("recipient_status") {
        None => RecipientStatus::Existing,
        Some(raw) => RecipientStatus::parse(&raw).ok_or_else(|| RiskError::Validation {
            field: "recipient_status",
            reason: format!("expected 'new' or 'existing', got '{raw}'"),
        })?,
    };

    let monthly_budget_remaining = match numeric_field(obj, "monthly_budget_remaining")? {
        Some(budget) if budget < 0.0 => {
            return Err(RiskError::Validation {
                field: "monthly_budget_remaining",
                reason: format!("must be non-negative, got {budget}"),
            })
        }
        Some(budget) => budget,
        None => DEFAULT_BUDGET_FLOOR.max(amount * DEFAULT_BUDGET_MULTIPLIER),
    };

    let channel = match field("channel") {
        None => Channel::Web,
        Some(raw) => Channel::parse(&raw).ok_or_else(|| RiskError::Validation {
            field: "channel",
            reason: format!("unknown channel '{raw}'"),
        })?,
    };

    Ok(Transaction {
        txn_id,
        user_id,
        timestamp,
        amount,
        category,
        recipient_status,
        monthly_budget_remaining,
        device_id: field("device_id").unwrap_or_else(|| DEFAULT_DEVICE.into()),
        location: field("location").unwrap_or_else(|| DEFAULT_LOCATION.into()),
        channel,
    })
}

/// Numeric field as f64, accepting number or numeric-string encodings.
/// NaN and infinities are malformed, not merely out of range.
fn numeric_field(
    obj: &serde_json::Map<String, Value>,
    name: &'static str,
) -> RiskResult<Option<f64>> {
    let value = match obj.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        Value::String(_) => return Ok(None),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(Some(x)),
        _ => Err(RiskError::Validation {
            field: name,
            reason: format!("not a finite number: {value}"),
        }),
    }
}

/// Parse a timestamp, ISO 8601 first, then the common spreadsheet formats.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%d-%m-%Y %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
