//! Price provider trait and structured error types.
//!
//! Providers abstract over vendors (BRAPI, Yahoo Finance, Frankfurter, CSV
//! files) so the runner can swap implementations and tests can run offline.
//! The core treats every provider failure uniformly as "no data for this
//! ticker" — vendor internals never leak past the router.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::PriceSeries;

use super::router::Asset;

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Years(u32),
    Max,
}

/// Sampling interval. Daily bars only — the system makes one decision per
/// asset per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    Daily,
}

/// A bounded history request: period plus interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub period: Period,
    pub interval: Interval,
}

impl FetchWindow {
    pub fn daily_years(years: u32) -> Self {
        Self {
            period: Period::Years(years),
            interval: Interval::Daily,
        }
    }

    /// Period length in calendar days. `Max` is capped at ten years, which
    /// is plenty for any sensible trend window.
    pub fn period_days(&self) -> i64 {
        match self.period {
            Period::Years(years) => i64::from(years) * 365,
            Period::Max => 3_650,
        }
    }

    /// First date covered, counting back from `end`.
    pub fn start_from(&self, end: NaiveDate) -> NaiveDate {
        end - chrono::Duration::days(self.period_days())
    }

    /// BRAPI-style range parameter (`"10y"`, `"max"`).
    pub fn range_param(&self) -> String {
        match self.period {
            Period::Years(years) => format!("{years}y"),
            Period::Max => "max".to_string(),
        }
    }

    /// BRAPI-style interval parameter.
    pub fn interval_param(&self) -> &'static str {
        match self.interval {
            Interval::Daily => "1d",
        }
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::daily_years(10)
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {ticker}")]
    SymbolNotFound { ticker: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("provider blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for price history providers.
///
/// Implementations handle the specifics of one vendor. `fetch_history`
/// receives the full [`Asset`] rather than a bare ticker because symbol
/// normalization is vendor-specific (Yahoo wants a `.SA` suffix for
/// B3-listed instruments, BRAPI wants the raw ticker).
pub trait PriceProvider: Send + Sync {
    /// Human-readable provider name, recorded in fetch diagnostics.
    fn name(&self) -> &str;

    /// Fetch daily history for one asset, bounded by `window`.
    fn fetch_history(&self, asset: &Asset, window: FetchWindow) -> Result<PriceSeries, DataError>;

    /// Whether the provider will currently accept requests (not tripped).
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_params() {
        assert_eq!(FetchWindow::daily_years(10).range_param(), "10y");
        let max = FetchWindow {
            period: Period::Max,
            interval: Interval::Daily,
        };
        assert_eq!(max.range_param(), "max");
        assert_eq!(max.interval_param(), "1d");
    }

    #[test]
    fn start_from_counts_back() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let start = FetchWindow::daily_years(1).start_from(end);
        assert_eq!(start, end - chrono::Duration::days(365));
    }

    #[test]
    fn default_window_is_ten_years_daily() {
        let w = FetchWindow::default();
        assert_eq!(w.period, Period::Years(10));
        assert_eq!(w.interval, Interval::Daily);
    }
}
