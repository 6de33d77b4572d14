//! CSV directory provider — offline price source.
//!
//! Reads `<dir>/<TICKER>.csv` with a `date,open,high,low,close,volume`
//! header. Serves tests and air-gapped runs; the window is applied relative
//! to the newest date in the file so fixtures keep working regardless of
//! when they were written.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{PricePoint, PriceSeries};

use super::provider::{DataError, FetchWindow, PriceProvider};
use super::router::Asset;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PriceProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_dir"
    }

    fn fetch_history(&self, asset: &Asset, window: FetchWindow) -> Result<PriceSeries, DataError> {
        let ticker = asset.ticker.trim().to_uppercase();
        let path = self.dir.join(format!("{ticker}.csv"));
        if !path.exists() {
            return Err(DataError::SymbolNotFound { ticker });
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::Other(format!("open {}: {e}", path.display())))?;

        let mut points = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad row in {}: {e}", path.display()))
            })?;
            points.push(PricePoint {
                ts: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        if let Some(newest) = points.iter().map(|p| p.ts).max() {
            let start = window.start_from(newest);
            points.retain(|p| p.ts >= start);
        }

        let series = PriceSeries::new(ticker.clone(), points);
        if series.is_empty() {
            return Err(DataError::NoData { ticker });
        }
        Ok(series)
    }
}
