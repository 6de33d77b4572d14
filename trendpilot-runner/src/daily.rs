//! The daily decision run.
//!
//! One invocation per scheduled period: fetch history per asset, derive
//! trend signals, build equal-weight targets, evaluate the kill switch,
//! diff against the previous positions, persist state, and append exactly
//! one audit event describing the outcome.
//!
//! Short circuits:
//! - kill switch already active → `RUN_SKIPPED`, nothing fetched or mutated
//! - zero usable signals → `NO_DATA`, only `last_run` is touched, prior
//!   positions survive untouched

use std::collections::BTreeMap;

use chrono::Utc;
use rayon::prelude::*;
use thiserror::Error;

use trendpilot_core::data::{ProviderRouter, DATA_PROVIDER_VERSION};
use trendpilot_core::domain::{Order, OrderAction, Position, TrendState};
use trendpilot_core::portfolio::{compute_weights, diff_states, mark_to_market, update_kill_switch};
use trendpilot_core::signal::{compute_signal, TrendDecision};
use trendpilot_core::store::{
    AuditEvent, NoDataEvent, RunEvent, RunSkippedEvent, StateStore, StoreError, TrendParams,
};

use crate::config::Settings;

/// Fatal runner failure. Per-ticker data problems never end up here — they
/// shrink the effective universe instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Progress callback for the per-ticker fetch fan-out.
pub trait FetchProgress: Sync {
    fn on_start(&self, ticker: &str);
    fn on_signal(&self, decision: &TrendDecision);
    fn on_skipped(&self, ticker: &str, reason: &str);
}

/// Prints fetch progress to stdout/stderr.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, ticker: &str) {
        println!("Fetching {ticker}...");
    }

    fn on_signal(&self, decision: &TrendDecision) {
        println!(
            "  {} {} (close {:.2}, sma {:.2}, as of {})",
            decision.ticker,
            if decision.state.is_on() { "ON" } else { "OFF" },
            decision.close,
            decision.sma,
            decision.as_of
        );
    }

    fn on_skipped(&self, ticker: &str, reason: &str) {
        eprintln!("[WARN] no data for {ticker}: {reason}. Skipping.");
    }
}

/// Swallows progress. Used by tests.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _ticker: &str) {}
    fn on_signal(&self, _decision: &TrendDecision) {}
    fn on_skipped(&self, _ticker: &str, _reason: &str) {}
}

/// Summary of a completed decision run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub effective_universe: Vec<String>,
    pub skipped: Vec<String>,
    pub orders: Vec<Order>,
    pub kill_switch_triggered: bool,
    pub equity: f64,
    pub drawdown: f64,
    pub portfolio_return: f64,
}

/// How the run ended. All three variants are successful terminations.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Full decision sequence completed and persisted.
    Completed(RunReport),
    /// Every ticker failed; state preserved except `last_run`.
    NoData { skipped: Vec<String> },
    /// Kill switch was already active; nothing fetched or mutated.
    SkippedKillSwitch,
}

/// Execute one daily run against the given store and provider routing.
pub fn run_daily(
    settings: &Settings,
    store: &StateStore,
    router: &ProviderRouter,
    progress: &dyn FetchProgress,
) -> Result<RunOutcome, RunError> {
    let assets = settings.universe.resolve();
    let universe: Vec<String> = assets.iter().map(|a| a.ticker.clone()).collect();
    let sid = settings.state_id();

    // Load state; adopt the identity on first contact, reset on mismatch.
    let mut state = store.load().unwrap_or_else(|| settings.initial_state());
    if state.state_id.is_empty() {
        state.state_id = sid.clone();
    } else if state.state_id != sid {
        state = settings.initial_state();
    }
    state.normalize();

    if state.kill_switch {
        store.append_event(AuditEvent::RunSkipped(RunSkippedEvent {
            state_id: sid,
            reason: "kill switch active; awaiting operator intervention".into(),
        }))?;
        return Ok(RunOutcome::SkippedKillSwitch);
    }

    // Per-ticker fetches are independent; run them in parallel and key the
    // results by ticker so completion order cannot leak into the maps.
    let window = settings.fetch_window();
    let trend_window = settings.trend.window;
    let fetched: Vec<(String, Result<TrendDecision, String>)> = assets
        .par_iter()
        .map(|asset| {
            progress.on_start(&asset.ticker);
            let outcome = router
                .fetch(asset, window)
                .map_err(|e| e.to_string())
                .and_then(|series| {
                    compute_signal(&series, trend_window).map_err(|e| e.to_string())
                });
            (asset.ticker.clone(), outcome)
        })
        .collect();

    let mut signals: BTreeMap<String, TrendState> = BTreeMap::new();
    let mut prices: BTreeMap<String, f64> = BTreeMap::new();
    let mut skipped: Vec<String> = Vec::new();
    for (ticker, outcome) in fetched {
        match outcome {
            Ok(decision) => {
                progress.on_signal(&decision);
                signals.insert(ticker.clone(), decision.state);
                prices.insert(ticker, decision.close);
            }
            Err(reason) => {
                progress.on_skipped(&ticker, &reason);
                skipped.push(ticker);
            }
        }
    }

    let now = Utc::now();

    if signals.is_empty() {
        store.append_event(AuditEvent::NoData(NoDataEvent {
            provider: DATA_PROVIDER_VERSION.into(),
            state_id: state.state_id.clone(),
            message: "no ticker returned usable data".into(),
            skipped: skipped.clone(),
            universe,
        }))?;
        state.last_run = Some(now);
        store.save(&state)?;
        return Ok(RunOutcome::NoData { skipped });
    }

    // Mark to market before the kill-switch evaluation: yesterday's weights
    // applied to today's closes move the equity the drawdown is judged on.
    let portfolio_return = mark_to_market(&state.positions, &state.last_prices, &prices);
    state.equity *= 1.0 + portfolio_return;

    let mut weights = compute_weights(&signals);

    // The peak ratchets every run; the trip itself honors the enabled flag.
    let check = update_kill_switch(
        state.equity,
        state.peak_equity,
        settings.kill_switch.max_drawdown,
    );
    state.peak_equity = check.peak;
    let triggered = settings.kill_switch.enabled && check.triggered;
    if triggered {
        state.kill_switch = true;
        for weight in weights.values_mut() {
            *weight = 0.0;
        }
        for signal in signals.values_mut() {
            *signal = TrendState::Off;
        }
    }

    // Orders from the state diff; exits caused by this run's trip are
    // force-exits.
    let mut orders = diff_states(&state.positions, &weights);
    if triggered {
        for order in &mut orders {
            if order.action == OrderAction::Exit {
                order.action = OrderAction::ForceExit;
            }
        }
    }

    // Positions are rewritten for the effective universe only; tickers that
    // failed to fetch this run drop out of the position set.
    state.positions = signals
        .keys()
        .map(|ticker| {
            let weight = weights.get(ticker).copied().unwrap_or(0.0);
            (ticker.clone(), Position::from_weight(weight))
        })
        .collect();
    state.last_prices = prices.clone();
    state.last_run = Some(now);
    state.last_drawdown = state.drawdown();

    let effective_universe: Vec<String> = signals.keys().cloned().collect();
    let report = RunReport {
        effective_universe: effective_universe.clone(),
        skipped: skipped.clone(),
        orders: orders.clone(),
        kill_switch_triggered: triggered,
        equity: state.equity,
        drawdown: state.last_drawdown,
        portfolio_return,
    };

    store.append_event(AuditEvent::Run(RunEvent {
        provider: DATA_PROVIDER_VERSION.into(),
        state_id: state.state_id.clone(),
        kill_switch: state.kill_switch,
        trend: TrendParams {
            reference: settings.trend.reference.to_uppercase(),
            window: settings.trend.window,
        },
        universe,
        effective_universe,
        skipped,
        signals,
        weights,
        prices,
        orders,
        equity: state.equity,
        peak_equity: state.peak_equity,
        drawdown: state.last_drawdown,
        portfolio_return,
    }))?;

    store.save(&state)?;

    Ok(RunOutcome::Completed(report))
}
