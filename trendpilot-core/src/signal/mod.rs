//! Signal engine — SMA trend filter producing a binary on/off decision.
//!
//! The trend rule is deliberately simple: the signal at the most recent
//! point is ON when the close sits above its trailing simple moving average,
//! OFF otherwise (ties resolve OFF). No average is produced until a full
//! window of history exists, so the first `window - 1` points can never be
//! selected as a decision point.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{PriceSeries, Signal, TrendState};

/// Why no signal could be derived for a ticker this run.
///
/// Every variant is recovered locally: the ticker is excluded from the
/// effective universe, never aborting the whole run on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalUnavailable {
    #[error("empty price series")]
    EmptySeries,

    #[error("insufficient history: need {required} closes, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("non-finite close at the decision point")]
    NonFiniteClose,
}

/// Rolling mean of `values` over a trailing `window`.
///
/// `min_periods = window` semantics: indices with fewer than `window`
/// observations behind them hold NaN, as does any index whose window
/// contains a NaN value.
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= 1, "SMA window must be >= 1");

    let n = values.len();
    let mut out = vec![f64::NAN; n];
    let mut sum = 0.0;
    let mut nans_in_window = 0usize;

    for i in 0..n {
        let entering = values[i];
        if entering.is_nan() {
            nans_in_window += 1;
        } else {
            sum += entering;
        }

        if i >= window {
            let leaving = values[i - window];
            if leaving.is_nan() {
                nans_in_window -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= window && nans_in_window == 0 {
            out[i] = sum / window as f64;
        }
    }

    out
}

/// Trend decision for one ticker: the signal plus the context the runner
/// needs for prices, mark-to-market, and the audit payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendDecision {
    pub ticker: String,
    pub state: TrendState,
    pub close: f64,
    pub sma: f64,
    pub as_of: NaiveDate,
}

impl TrendDecision {
    pub fn signal(&self) -> Signal {
        Signal {
            ticker: self.ticker.clone(),
            state: self.state,
        }
    }
}

/// Derive the trend decision at the most recent point of `series`.
///
/// Pure function over its inputs; the series has already dropped points
/// without a finite close during ingestion.
pub fn compute_signal(
    series: &PriceSeries,
    window: usize,
) -> Result<TrendDecision, SignalUnavailable> {
    if series.is_empty() {
        return Err(SignalUnavailable::EmptySeries);
    }

    let closes = series.closes();
    if closes.len() < window {
        return Err(SignalUnavailable::InsufficientHistory {
            required: window,
            available: closes.len(),
        });
    }

    let averages = sma(&closes, window);
    let last = series.last().expect("non-empty series has a last point");
    let close = last.close;
    let average = averages[closes.len() - 1];
    if !close.is_finite() || !average.is_finite() {
        return Err(SignalUnavailable::NonFiniteClose);
    }

    Ok(TrendDecision {
        ticker: series.ticker().to_string(),
        state: TrendState::from_on(close > average),
        close,
        sma: average,
        as_of: last.ts,
    })
}
