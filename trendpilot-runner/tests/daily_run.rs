//! End-to-end daily-run tests against the CSV provider and a temp state dir.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use trendpilot_core::data::{CsvDirProvider, ProviderRouter};
use trendpilot_core::domain::{OrderAction, Position, TrendState};
use trendpilot_core::fingerprint::StateId;
use trendpilot_core::store::{AuditEvent, StateStore};
use trendpilot_runner::{run_daily, RunOutcome, Settings, SilentProgress};

const EPS: f64 = 1e-9;

fn write_csv(dir: &Path, ticker: &str, closes: &[f64]) {
    let mut file = std::fs::File::create(dir.join(format!("{ticker}.csv"))).unwrap();
    writeln!(file, "date,open,high,low,close,volume").unwrap();
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for (i, close) in closes.iter().enumerate() {
        let date = start + chrono::Duration::days(i as i64);
        writeln!(file, "{date},{close},{close},{close},{close},1000").unwrap();
    }
}

fn settings_for(tickers: &[&str], window: usize) -> Settings {
    let mut settings = Settings::default();
    settings.universe.tickers = tickers.iter().map(|t| t.to_string()).collect();
    settings.trend.window = window;
    settings
}

fn csv_router(dir: &Path) -> ProviderRouter {
    ProviderRouter::single(Arc::new(CsvDirProvider::new(dir)))
}

#[test]
fn first_run_enters_trending_ticker() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);
    write_csv(data.path(), "BBB11", &[14.0, 13.0, 12.0, 11.0, 10.0]);

    let settings = settings_for(&["AAA11", "BBB11"], 3);
    let store = StateStore::new(state_dir.path());

    let outcome = run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(report.orders.len(), 1);
    assert_eq!(report.orders[0].ticker, "AAA11");
    assert_eq!(report.orders[0].action, OrderAction::Enter);
    assert!(!report.kill_switch_triggered);

    let state = store.load().unwrap();
    assert_eq!(state.positions["AAA11"].state, TrendState::On);
    assert!((state.positions["AAA11"].weight - 1.0).abs() < EPS);
    assert_eq!(state.positions["BBB11"].state, TrendState::Off);
    assert_eq!(state.positions["BBB11"].weight, 0.0);
    assert_eq!(state.last_prices["AAA11"], 14.0);
    assert!(state.last_run.is_some());

    let events = store.read_events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.kind(), "RUN");
}

#[test]
fn two_on_signals_split_the_book_evenly() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);
    write_csv(data.path(), "BBB11", &[20.0, 21.0, 22.0, 23.0, 24.0]);
    write_csv(data.path(), "CCC11", &[14.0, 13.0, 12.0, 11.0, 10.0]);

    let settings = settings_for(&["AAA11", "BBB11", "CCC11"], 3);
    let store = StateStore::new(state_dir.path());

    run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();

    let state = store.load().unwrap();
    assert!((state.positions["AAA11"].weight - 0.5).abs() < EPS);
    assert!((state.positions["BBB11"].weight - 0.5).abs() < EPS);
    assert_eq!(state.positions["CCC11"].weight, 0.0);
    let total: f64 = state.positions.values().map(|p| p.weight).sum();
    assert!((total - 1.0).abs() < EPS);
}

#[test]
fn failed_ticker_shrinks_the_effective_universe() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);

    let settings = settings_for(&["AAA11", "MISSING"], 3);
    let store = StateStore::new(state_dir.path());

    let outcome = run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(report.effective_universe, vec!["AAA11"]);
    assert_eq!(report.skipped, vec!["MISSING"]);

    let state = store.load().unwrap();
    assert!(state.positions.contains_key("AAA11"));
    assert!(!state.positions.contains_key("MISSING"));
}

#[test]
fn no_data_preserves_positions_and_touches_only_last_run() {
    let data = TempDir::new().unwrap();
    let empty = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);

    let settings = settings_for(&["AAA11"], 3);
    let store = StateStore::new(state_dir.path());

    run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    let before = store.load().unwrap();

    // Same settings, but every fetch now fails.
    let outcome = run_daily(&settings, &store, &csv_router(empty.path()), &SilentProgress).unwrap();
    assert_eq!(
        outcome,
        RunOutcome::NoData {
            skipped: vec!["AAA11".to_string()]
        }
    );

    let after = store.load().unwrap();
    assert_eq!(after.positions, before.positions);
    assert_eq!(after.equity, before.equity);
    assert_eq!(after.last_prices, before.last_prices);
    assert!(after.last_run >= before.last_run);

    let events = store.read_events().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event.kind(), "NO_DATA");
}

#[test]
fn mark_to_market_advances_equity_before_the_kill_check() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[100.0, 105.0, 110.0]);

    let settings = settings_for(&["AAA11"], 3);
    let store = StateStore::new(state_dir.path());

    // Previous run held AAA11 fully at a close of 100.
    let mut seeded = settings.initial_state();
    seeded
        .positions
        .insert("AAA11".into(), Position::from_weight(1.0));
    seeded.last_prices.insert("AAA11".into(), 100.0);
    store.save(&seeded).unwrap();

    let outcome = run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    assert!((report.portfolio_return - 0.10).abs() < EPS);
    assert!((report.equity - 110_000.0).abs() < 1e-6);

    let state = store.load().unwrap();
    assert!((state.equity - 110_000.0).abs() < 1e-6);
    assert!((state.peak_equity - 110_000.0).abs() < 1e-6);
    assert_eq!(state.last_drawdown, 0.0);
}

#[test]
fn drawdown_breach_trips_the_kill_switch_and_forces_exits() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[100.0, 90.0, 80.0, 75.0]);

    let settings = settings_for(&["AAA11"], 3);
    let store = StateStore::new(state_dir.path());

    let mut seeded = settings.initial_state();
    seeded
        .positions
        .insert("AAA11".into(), Position::from_weight(1.0));
    seeded.last_prices.insert("AAA11".into(), 100.0);
    store.save(&seeded).unwrap();

    let outcome = run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    // 25% mark-to-market loss against a 20% limit.
    assert!(report.kill_switch_triggered);
    assert!((report.equity - 75_000.0).abs() < 1e-6);
    assert!((report.drawdown - 0.25).abs() < EPS);
    assert_eq!(report.orders.len(), 1);
    assert_eq!(report.orders[0].action, OrderAction::ForceExit);

    let state = store.load().unwrap();
    assert!(state.kill_switch);
    assert!(state.positions.values().all(|p| p.weight == 0.0));
    assert!(state
        .positions
        .values()
        .all(|p| p.state == TrendState::Off));
    assert_eq!(state.peak_equity, 100_000.0);

    let events = store.read_events().unwrap();
    let AuditEvent::Run(run) = &events.last().unwrap().event else {
        panic!("expected a RUN event");
    };
    assert!(run.kill_switch);
    assert!(run.weights.values().all(|&w| w == 0.0));
    assert!(run.signals.values().all(|s| !s.is_on()));
}

#[test]
fn active_kill_switch_skips_the_run_without_mutation() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);

    let settings = settings_for(&["AAA11"], 3);
    let store = StateStore::new(state_dir.path());

    let mut seeded = settings.initial_state();
    seeded.kill_switch = true;
    store.save(&seeded).unwrap();

    let outcome = run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    assert_eq!(outcome, RunOutcome::SkippedKillSwitch);

    // Nothing mutated: the persisted state is byte-equal to what was seeded.
    assert_eq!(store.load().unwrap(), seeded);

    let events = store.read_events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.kind(), "RUN_SKIPPED");
}

#[test]
fn identity_mismatch_resets_to_initial_state() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);

    let store = StateStore::new(state_dir.path());
    let settings = settings_for(&["AAA11"], 3);
    run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    assert_eq!(
        store.load().unwrap().positions["AAA11"].state,
        TrendState::On
    );

    // A different trend window is a different state shape.
    let reconfigured = settings_for(&["AAA11"], 4);
    let outcome = run_daily(
        &reconfigured,
        &store,
        &csv_router(data.path()),
        &SilentProgress,
    )
    .unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    // The reset emptied positions, so the trending ticker re-enters, and no
    // mark-to-market return carries over.
    assert_eq!(report.orders[0].action, OrderAction::Enter);
    assert_eq!(report.portfolio_return, 0.0);

    let state = store.load().unwrap();
    assert_eq!(state.state_id, reconfigured.state_id());
    assert_eq!(state.equity, 100_000.0);
}

#[test]
fn legacy_state_without_id_adopts_the_current_identity() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[100.0, 105.0, 110.0]);

    let settings = settings_for(&["AAA11"], 3);
    let store = StateStore::new(state_dir.path());

    // State written before identity tracking: empty id, live positions.
    let mut legacy = trendpilot_core::domain::PortfolioState::initial(StateId::default(), 100_000.0);
    legacy
        .positions
        .insert("AAA11".into(), Position::from_weight(1.0));
    legacy.last_prices.insert("AAA11".into(), 100.0);
    store.save(&legacy).unwrap();

    let outcome = run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };

    // No reset happened: the seeded position marked to market.
    assert!((report.portfolio_return - 0.10).abs() < EPS);
    assert_eq!(store.load().unwrap().state_id, settings.state_id());
}

#[test]
fn run_event_carries_the_full_audit_payload() {
    let data = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    write_csv(data.path(), "AAA11", &[10.0, 11.0, 12.0, 13.0, 14.0]);

    let settings = settings_for(&["AAA11", "MISSING"], 3);
    let store = StateStore::new(state_dir.path());
    run_daily(&settings, &store, &csv_router(data.path()), &SilentProgress).unwrap();

    let events = store.read_events().unwrap();
    let AuditEvent::Run(run) = &events[0].event else {
        panic!("expected a RUN event");
    };
    assert_eq!(run.provider, "BRAPI_QUOTE_HISTORY_v1");
    assert_eq!(run.trend.reference, "SMA");
    assert_eq!(run.trend.window, 3);
    assert_eq!(run.universe, vec!["AAA11", "MISSING"]);
    assert_eq!(run.effective_universe, vec!["AAA11"]);
    assert_eq!(run.skipped, vec!["MISSING"]);
    assert_eq!(run.signals["AAA11"], TrendState::On);
    assert!((run.weights["AAA11"] - 1.0).abs() < EPS);
    assert_eq!(run.prices["AAA11"], 14.0);
    assert_eq!(run.state_id, settings.state_id());
}
