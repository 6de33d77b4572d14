//! Frankfurter FX provider — daily closing rates for currency pairs.
//!
//! Queries `https://api.frankfurter.app/{start}..{end}?from=BASE&to=QUOTE`.
//! FX points carry only a closing rate; OHLC collapse onto the close and
//! volume is zero.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{PricePoint, PriceSeries};

use super::provider::{DataError, FetchWindow, PriceProvider};
use super::router::Asset;

const BASE_URL: &str = "https://api.frankfurter.app";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

pub struct FrankfurterProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl FrankfurterProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("trendpilot/1.0")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Split a pair spec like `"USD/BRL"`, `"USD-BRL"`, or `"USDBRL"` into
    /// base and quote currencies.
    fn split_pair(ticker: &str) -> Result<(String, String), DataError> {
        let cleaned = ticker
            .trim()
            .to_uppercase()
            .replace(['-', '_'], "");
        if let Some((base, quote)) = cleaned.split_once('/') {
            if base.len() == 3 && quote.len() == 3 {
                return Ok((base.to_string(), quote.to_string()));
            }
        } else if cleaned.len() == 6 {
            return Ok((cleaned[..3].to_string(), cleaned[3..].to_string()));
        }
        Err(DataError::Other(format!("unrecognized FX pair '{ticker}'")))
    }

    fn parse_points(resp: RatesResponse, quote: &str) -> Vec<PricePoint> {
        let mut points = Vec::with_capacity(resp.rates.len());
        for (date_str, rates) in resp.rates {
            let Some(&rate) = rates.get(quote) else {
                continue;
            };
            let Ok(ts) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") else {
                continue;
            };
            points.push(PricePoint {
                ts,
                open: rate,
                high: rate,
                low: rate,
                close: rate,
                volume: 0.0,
            });
        }
        points
    }
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "frankfurter"
    }

    fn fetch_history(&self, asset: &Asset, window: FetchWindow) -> Result<PriceSeries, DataError> {
        let (base, quote) = Self::split_pair(&asset.ticker)?;
        let end = chrono::Utc::now().date_naive();
        let start = window.start_from(end);
        let url = format!(
            "{}/{}..{}?from={}&to={}",
            self.base_url, start, end, base, quote
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DataError::Other(format!(
                "HTTP {} for {}",
                resp.status(),
                asset.ticker
            )));
        }

        let rates: RatesResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!(
                "failed to parse response for {}: {e}",
                asset.ticker
            ))
        })?;

        let series = PriceSeries::new(asset.ticker.clone(), Self::parse_points(rates, &quote));
        if series.is_empty() {
            return Err(DataError::NoData {
                ticker: asset.ticker.clone(),
            });
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_slash_pair() {
        assert_eq!(
            FrankfurterProvider::split_pair("USD/BRL").unwrap(),
            ("USD".to_string(), "BRL".to_string())
        );
    }

    #[test]
    fn splits_compact_pair() {
        assert_eq!(
            FrankfurterProvider::split_pair("usdbrl").unwrap(),
            ("USD".to_string(), "BRL".to_string())
        );
        assert_eq!(
            FrankfurterProvider::split_pair("USD-BRL").unwrap(),
            ("USD".to_string(), "BRL".to_string())
        );
    }

    #[test]
    fn rejects_garbage_pair() {
        assert!(FrankfurterProvider::split_pair("NOT_A_PAIR_X").is_err());
    }

    #[test]
    fn parses_rates_into_close_only_points() {
        let resp: RatesResponse = serde_json::from_str(
            r#"{"rates": {"2024-01-02": {"BRL": 4.85}, "2024-01-03": {"BRL": 4.90}}}"#,
        )
        .unwrap();
        let points = FrankfurterProvider::parse_points(resp, "BRL");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].close, 4.85);
        assert_eq!(points[0].open, 4.85);
        assert_eq!(points[0].volume, 0.0);
    }

    #[test]
    fn skips_dates_missing_the_quote_currency() {
        let resp: RatesResponse = serde_json::from_str(
            r#"{"rates": {"2024-01-02": {"EUR": 0.9}, "2024-01-03": {"BRL": 4.90}}}"#,
        )
        .unwrap();
        let points = FrankfurterProvider::parse_points(resp, "BRL");
        assert_eq!(points.len(), 1);
    }
}
