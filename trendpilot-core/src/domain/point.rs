//! Price points and per-ticker daily series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV observation for one ticker.
///
/// A point retained in a [`PriceSeries`] always has a finite close; the other
/// fields may be NaN when a provider returned partial data (FX sources, for
/// example, only publish a closing rate).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricePoint {
    pub ts: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    /// Only points with a finite close are usable for signal computation.
    pub fn has_valid_close(&self) -> bool {
        self.close.is_finite()
    }
}

/// Ordered daily price history for one ticker.
///
/// Construction normalizes whatever a provider returned:
/// - points without a finite close are dropped (never treated as zero)
/// - points are sorted by date ascending
/// - duplicate dates collapse to the first occurrence
///
/// The series is never mutated afterwards; it lives for one run and is
/// discarded after signal extraction.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, raw: Vec<PricePoint>) -> Self {
        let mut points: Vec<PricePoint> =
            raw.into_iter().filter(PricePoint::has_valid_close).collect();
        // Stable sort keeps input order within a date, so dedup keeps the
        // first occurrence seen.
        points.sort_by_key(|p| p.ts);
        points.dedup_by_key(|p| p.ts);
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}
