//! Portfolio engine — equal-weight targets, drawdown kill switch, order
//! diffing, and mark-to-market.
//!
//! Every function here is pure: the daily runner owns all mutation and
//! persistence. Maps are keyed by ticker so results never depend on the
//! order in which per-ticker data arrived.

use std::collections::BTreeMap;

use crate::domain::{Order, OrderAction, Position, TrendState};

/// Equal-weight targets from a signal map.
///
/// With `on` tickers in the ON state, each receives `1/on`; everything else
/// gets 0.0. With no ON signals, every ticker gets 0.0. Weights sum to
/// exactly 1.0 whenever `on > 0`.
pub fn compute_weights(signals: &BTreeMap<String, TrendState>) -> BTreeMap<String, f64> {
    let on = signals.values().filter(|s| s.is_on()).count();
    if on == 0 {
        return signals.keys().map(|t| (t.clone(), 0.0)).collect();
    }
    let weight = 1.0 / on as f64;
    signals
        .iter()
        .map(|(ticker, state)| (ticker.clone(), if state.is_on() { weight } else { 0.0 }))
        .collect()
}

/// Result of one kill-switch evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KillCheck {
    /// Drawdown reached or exceeded the configured maximum.
    pub triggered: bool,
    /// Updated running peak (never below the previous peak).
    pub peak: f64,
    /// Drawdown against the updated peak, in [0, 1] for non-negative equity.
    pub drawdown: f64,
}

/// Evaluate the drawdown kill switch.
///
/// The peak is a one-way ratchet: `max(peak_equity, equity)`. The function
/// itself is side-effect-free; on `triggered` the caller must zero all
/// target weights and mark the switch permanently on.
pub fn update_kill_switch(equity: f64, peak_equity: f64, max_drawdown: f64) -> KillCheck {
    let peak = peak_equity.max(equity);
    let drawdown = if peak == 0.0 {
        0.0
    } else {
        (peak - equity) / peak
    };
    KillCheck {
        triggered: drawdown >= max_drawdown,
        peak,
        drawdown,
    }
}

/// Diff previous positions against new target weights into orders.
///
/// ENTER on off→on, EXIT on on→off, nothing when unchanged. A ticker absent
/// from `prev` counts as previously off. Tickers present in `prev` but
/// absent from `new_weights` are not visited: a shrinking universe drops
/// them silently, by policy.
pub fn diff_states(
    prev: &BTreeMap<String, Position>,
    new_weights: &BTreeMap<String, f64>,
) -> Vec<Order> {
    let mut orders = Vec::new();
    for (ticker, &weight) in new_weights {
        let was_on = prev.get(ticker).map(|p| p.state.is_on()).unwrap_or(false);
        let is_on = weight > 0.0;
        match (was_on, is_on) {
            (false, true) => orders.push(Order::new(ticker.clone(), OrderAction::Enter)),
            (true, false) => orders.push(Order::new(ticker.clone(), OrderAction::Exit)),
            _ => {}
        }
    }
    orders
}

/// Portfolio return from revaluing yesterday's weights at today's closes.
///
/// Only tickers holding a positive previous weight with both a recorded
/// previous price and a price today contribute; a ticker missing either
/// price is excluded from the sum (no renormalization of the remaining
/// weights). The caller advances equity by `equity * (1 + return)`.
pub fn mark_to_market(
    prev_positions: &BTreeMap<String, Position>,
    last_prices: &BTreeMap<String, f64>,
    today_prices: &BTreeMap<String, f64>,
) -> f64 {
    let mut portfolio_return = 0.0;
    for (ticker, position) in prev_positions {
        if position.weight <= 0.0 {
            continue;
        }
        let (Some(&previous), Some(&today)) =
            (last_prices.get(ticker), today_prices.get(ticker))
        else {
            continue;
        };
        if previous <= 0.0 {
            continue;
        }
        portfolio_return += position.weight * (today / previous - 1.0);
    }
    portfolio_return
}
