//! session-runner: headless session driver for SpendGuard.
//!
//! Usage:
//!   session-runner --input txns.json
//!   session-runner --input txns.json --contamination 0.05 --seed 7
//!   session-runner --ipc-mode

use anyhow::{Context, Result};
use serde_json::Value;
use spendguard_core::{error::RiskError, types::Decision, EngineConfig, SessionContext};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Evaluate { record: Value },
    Decide { decision: Decision },
    GetPending,
    GetTransactions,
    GetLedger,
    GetMetrics,
    Reset,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = args
        .windows(2)
        .find(|w| w[0] == "--input")
        .map(|w| w[1].clone());
    let seed = parse_arg(&args, "--seed", 42u64);
    let contamination = parse_arg(&args, "--contamination", 0.08f64);
    let cooldown = parse_arg(&args, "--cooldown", 10i64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let config = EngineConfig {
        model_seed: seed,
        contamination,
        proceed_cooldown_secs: cooldown,
        ..EngineConfig::default()
    };
    let ctx = SessionContext::new(config);

    if !ipc_mode {
        println!("SpendGuard — session-runner");
        println!("  session:       {}", ctx.session_id());
        println!("  seed:          {seed}");
        println!("  contamination: {contamination}");
        println!();
    }

    if let Some(path) = &input {
        let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        let records: Vec<Value> =
            serde_json::from_str(&text).context("input must be a JSON array of records")?;
        let summary = ctx.ingest_bulk(&records)?;
        if !ipc_mode {
            println!("=== INGEST ===");
            println!("  records:  {}", records.len());
            println!("  accepted: {}", summary.accepted);
            println!("  rejected: {}", summary.rejected);
            println!();
        }
    }

    if ipc_mode {
        run_ipc_loop(&ctx)?;
    } else {
        print_summary(&ctx)?;
    }

    Ok(())
}

/// Line-oriented JSON command loop for a frontend driving the session
/// over stdin/stdout. Engine-level rejections (pending slot occupied,
/// cooldown, validation) are reported as error lines, never process exits.
fn run_ipc_loop(ctx: &SessionContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("unparseable command: {e}");
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Evaluate { record } => {
                json_reply(ctx.evaluate(&record).map(|a| serde_json::to_value(a)))?
            }
            IpcCommand::Decide { decision } => {
                json_reply(ctx.decide(decision).map(|e| serde_json::to_value(e)))?
            }
            IpcCommand::GetPending => {
                json_reply(ctx.pending_assessment().map(|p| serde_json::to_value(p)))?
            }
            IpcCommand::GetTransactions => {
                json_reply(ctx.query_transactions().map(|t| serde_json::to_value(t)))?
            }
            IpcCommand::GetLedger => {
                json_reply(ctx.query_ledger(None).map(|l| serde_json::to_value(l)))?
            }
            IpcCommand::GetMetrics => {
                json_reply(ctx.query_metrics().map(|m| serde_json::to_value(m)))?
            }
            IpcCommand::Reset => json_reply(ctx.reset().map(|()| Ok(Value::Null)))?,
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn json_reply(outcome: Result<serde_json::Result<Value>, RiskError>) -> Result<Value> {
    match outcome {
        Ok(value) => Ok(value?),
        Err(e) => Ok(serde_json::json!({ "error": e.to_string() })),
    }
}

fn print_summary(ctx: &SessionContext) -> Result<()> {
    let metrics = ctx.query_metrics()?;
    let ledger = ctx.query_ledger(None)?;

    println!("=== SESSION SUMMARY ===");
    println!("  transactions:  {}", metrics.total_transactions);
    println!("  flagged:       {}", metrics.total_flagged);
    println!("  money saved:   ${:.2}", metrics.money_saved);
    println!("  override rate: {:.1}%", metrics.override_rate);
    println!("  impulsivity:   {:.1}", metrics.impulsivity_score);

    if !ledger.is_empty() {
        println!();
        println!("=== FLAGGED (last {}) ===", ledger.len().min(10));
        for entry in ledger.iter().skip(ledger.len().saturating_sub(10)) {
            println!(
                "  {} | ${:.2} | {:?} | {}",
                entry.txn_id,
                entry.transaction.amount,
                entry.user_decision,
                entry.risk_explanations.join("; ")
            );
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
