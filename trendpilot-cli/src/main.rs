//! TrendPilot CLI — daily run, status, and audit log commands.
//!
//! Commands:
//! - `run` — execute the daily decision run against the configured universe
//! - `status` — render persisted state: KPIs, health, positions
//! - `events` — print recent audit events from the append-only log
//!
//! `status` and `events` are read-only consumers of the state store; they
//! never mutate anything.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use trendpilot_core::domain::PortfolioState;
use trendpilot_core::store::{AuditEvent, AuditRecord, RunErrorEvent, StateStore};
use trendpilot_runner::{run_daily, RunOutcome, Settings, StdoutProgress};

#[derive(Parser)]
#[command(
    name = "trendpilot",
    about = "TrendPilot — daily trend-following signal generator"
)]
struct Cli {
    /// Path to the settings file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// State directory override.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the daily decision run.
    Run,
    /// Render persisted state: KPIs, health, positions.
    Status,
    /// Print recent audit events.
    Events {
        /// Number of most recent events to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_or_default(&cli.config)?;
    if let Some(dir) = cli.state_dir {
        settings.system.state_dir = dir;
    }
    let store = StateStore::new(&settings.system.state_dir);

    match cli.command {
        Commands::Run => run_cmd(&settings, &store),
        Commands::Status => status_cmd(&settings, &store),
        Commands::Events { limit } => events_cmd(&store, limit),
    }
}

fn run_cmd(settings: &Settings, store: &StateStore) -> Result<()> {
    match run_daily(settings, store, &settings.build_router(), &StdoutProgress) {
        Ok(RunOutcome::Completed(report)) => {
            println!();
            println!("=== Daily Run ===");
            println!(
                "Effective universe: {} of {} tickers",
                report.effective_universe.len(),
                report.effective_universe.len() + report.skipped.len()
            );
            if !report.skipped.is_empty() {
                println!("Skipped:            {}", report.skipped.join(", "));
            }
            println!("Portfolio return:   {:+.2}%", report.portfolio_return * 100.0);
            println!("Equity:             {:.2}", report.equity);
            println!("Drawdown:           {:.2}%", report.drawdown * 100.0);
            if report.kill_switch_triggered {
                println!("KILL SWITCH TRIPPED — all target weights zeroed.");
            }
            if report.orders.is_empty() {
                println!("Orders:             none");
            } else {
                println!("Orders:");
                for order in &report.orders {
                    println!("  {:<10} {:?}", order.ticker, order.action);
                }
            }
            Ok(())
        }
        // Soft outcomes: the schedule should not treat these as failures.
        Ok(RunOutcome::NoData { skipped }) => {
            eprintln!(
                "[WARN] no ticker returned usable data ({}); state preserved.",
                skipped.join(", ")
            );
            Ok(())
        }
        Ok(RunOutcome::SkippedKillSwitch) => {
            println!("Kill switch active — run skipped. Clear it by editing the state file.");
            Ok(())
        }
        Err(e) => {
            // Best-effort error event so the log still explains this run.
            let _ = store.append_event(AuditEvent::RunError(RunErrorEvent {
                message: e.to_string(),
            }));
            Err(e.into())
        }
    }
}

/// Coarse health of the system, derived from state and the last RUN event.
fn health_label(state: &PortfolioState, last_run: Option<&AuditRecord>) -> &'static str {
    if state.kill_switch {
        return "STOPPED";
    }
    let Some(record) = last_run else {
        return "DEGRADED";
    };
    if state.positions.is_empty() {
        return "DEGRADED";
    }
    match &record.event {
        AuditEvent::Run(run) if !run.weights.is_empty() => "OK",
        _ => "DEGRADED",
    }
}

fn status_cmd(settings: &Settings, store: &StateStore) -> Result<()> {
    let state = store.load().unwrap_or_else(|| settings.initial_state());
    let events = store.read_events().unwrap_or_default();
    let last_run = events
        .iter()
        .rev()
        .find(|r| matches!(r.event, AuditEvent::Run(_)));

    println!("=== TrendPilot Status ===");
    println!("Equity:       {:.2}", state.equity);
    println!("Peak equity:  {:.2}", state.peak_equity);
    println!("Drawdown:     {:.2}%", state.last_drawdown * 100.0);
    println!(
        "Kill switch:  {}",
        if state.kill_switch { "ON" } else { "OFF" }
    );
    println!("Health:       {}", health_label(&state, last_run));
    match &state.last_run {
        Some(ts) => println!("Last run:     {}", ts.format("%Y-%m-%d %H:%M:%SZ")),
        None => println!("Last run:     never"),
    }

    println!();
    if state.positions.is_empty() {
        println!("No positions recorded yet. Execute the daily run.");
        return Ok(());
    }

    println!("{:<10} {:<6} {:>8} {:>12}", "Ticker", "State", "Weight", "Last Price");
    println!("{}", "-".repeat(40));
    for (ticker, position) in &state.positions {
        let price = state
            .last_prices
            .get(ticker)
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<10} {:<6} {:>8.4} {:>12}",
            ticker,
            if position.state.is_on() { "ON" } else { "OFF" },
            position.weight,
            price
        );
    }
    Ok(())
}

fn summarize(event: &AuditEvent) -> String {
    match event {
        AuditEvent::Run(run) => {
            let orders: Vec<String> = run
                .orders
                .iter()
                .map(|o| format!("{} {:?}", o.ticker, o.action))
                .collect();
            format!(
                "effective {}/{}, kill_switch={}, orders: {}",
                run.effective_universe.len(),
                run.universe.len(),
                run.kill_switch,
                if orders.is_empty() {
                    "none".to_string()
                } else {
                    orders.join(", ")
                }
            )
        }
        AuditEvent::NoData(e) => format!("{} (skipped: {})", e.message, e.skipped.join(", ")),
        AuditEvent::RunSkipped(e) => e.reason.clone(),
        AuditEvent::RunError(e) => e.message.clone(),
    }
}

fn events_cmd(store: &StateStore, limit: usize) -> Result<()> {
    let records = store.read_events()?;
    if records.is_empty() {
        println!("No audit events yet. Execute the daily run to start the trail.");
        return Ok(());
    }

    let start = records.len().saturating_sub(limit);
    for record in &records[start..] {
        println!(
            "{}  {:<12} {}",
            record.ts.format("%Y-%m-%d %H:%M:%SZ"),
            record.event.kind(),
            summarize(&record.event)
        );
    }
    Ok(())
}
