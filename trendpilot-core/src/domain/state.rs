//! Persisted portfolio state — the root entity of the state file.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::StateId;

use super::Position;

/// Equity assumed when a loaded file predates the field.
fn default_equity() -> f64 {
    100_000.0
}

/// The persisted root entity, mutated exactly once per run and written
/// atomically by the state store.
///
/// Every field carries a serde default, so a partially-populated or older
/// state file deserializes by filling missing keys with defaults instead of
/// failing. Maps are `BTreeMap` to keep the persisted key order stable.
///
/// Invariants after any update:
/// - `peak_equity >= equity` (running maximum)
/// - `last_drawdown == (peak_equity - equity) / peak_equity` when the peak
///   is positive, else 0
/// - `kill_switch == true` implies every position is flat; the flag is only
///   cleared by out-of-band operator intervention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    #[serde(default)]
    pub state_id: StateId,
    #[serde(default = "default_equity")]
    pub equity: f64,
    #[serde(default = "default_equity")]
    pub peak_equity: f64,
    #[serde(default)]
    pub last_drawdown: f64,
    #[serde(default)]
    pub kill_switch: bool,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub last_prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

impl PortfolioState {
    /// Fresh state for a new identity: initial equity, no positions.
    pub fn initial(state_id: StateId, initial_equity: f64) -> Self {
        Self {
            state_id,
            equity: initial_equity,
            peak_equity: initial_equity,
            last_drawdown: 0.0,
            kill_switch: false,
            positions: BTreeMap::new(),
            last_prices: BTreeMap::new(),
            last_run: None,
        }
    }

    /// Repairs fields a hand-edited or partial file may violate: the peak is
    /// raised to at least the current equity.
    pub fn normalize(&mut self) {
        if self.peak_equity < self.equity {
            self.peak_equity = self.equity;
        }
    }

    /// Current drawdown against the stored peak.
    pub fn drawdown(&self) -> f64 {
        if self.peak_equity > 0.0 {
            (self.peak_equity - self.equity) / self.peak_equity
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrendState;

    #[test]
    fn initial_state_is_flat() {
        let state = PortfolioState::initial(StateId::default(), 50_000.0);
        assert_eq!(state.equity, 50_000.0);
        assert_eq!(state.peak_equity, 50_000.0);
        assert!(!state.kill_switch);
        assert!(state.positions.is_empty());
        assert!(state.last_run.is_none());
    }

    #[test]
    fn missing_fields_fill_with_defaults() {
        // A minimal file from an older deployment.
        let state: PortfolioState = serde_json::from_str(r#"{"equity": 90000.0}"#).unwrap();
        assert_eq!(state.equity, 90_000.0);
        assert_eq!(state.peak_equity, 100_000.0);
        assert!(!state.kill_switch);
        assert!(state.positions.is_empty());
        assert!(state.state_id.is_empty());
    }

    #[test]
    fn empty_object_is_the_default_state() {
        let state: PortfolioState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.equity, 100_000.0);
        assert_eq!(state.peak_equity, 100_000.0);
        assert_eq!(state.last_drawdown, 0.0);
    }

    #[test]
    fn normalize_raises_peak() {
        let mut state = PortfolioState::initial(StateId::default(), 100_000.0);
        state.equity = 120_000.0;
        state.normalize();
        assert_eq!(state.peak_equity, 120_000.0);
    }

    #[test]
    fn drawdown_matches_invariant() {
        let mut state = PortfolioState::initial(StateId::default(), 100_000.0);
        state.equity = 80_000.0;
        assert!((state.drawdown() - 0.2).abs() < 1e-12);

        state.peak_equity = 0.0;
        state.equity = 0.0;
        assert_eq!(state.drawdown(), 0.0);
    }

    #[test]
    fn roundtrip_preserves_positions() {
        let mut state = PortfolioState::initial(StateId::default(), 100_000.0);
        state
            .positions
            .insert("BOVA11".into(), Position::from_weight(0.5));
        state.last_prices.insert("BOVA11".into(), 101.5);

        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: PortfolioState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
        assert_eq!(back.positions["BOVA11"].state, TrendState::On);
    }
}
