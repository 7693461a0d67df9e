//! spendguard-core — pre-transaction risk evaluation engine.
//!
//! Three detector layers run over every transaction, in fixed order:
//! behavioral rules on the transaction itself, contextual rules over the
//! user's sliding history windows, and an isolation-forest anomaly score.
//! Flagged transactions wait in a single pending slot until the user
//! cancels or proceeds; decisions land in an append-only ledger that
//! feeds the dashboard metrics. All state is memory-resident and scoped
//! to one session.

pub mod anomaly;
pub mod behavioral;
pub mod config;
pub mod contextual;
pub mod engine;
pub mod error;
pub mod forest;
pub mod ingest;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod rng;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::EngineConfig;
pub use engine::RiskEngine;
pub use error::{RiskError, RiskResult};
pub use session::SessionContext;
