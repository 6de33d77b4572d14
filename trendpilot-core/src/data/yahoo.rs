//! Yahoo Finance chart-API provider.
//!
//! Fetches daily bars from the v8 chart endpoint. Yahoo has no official API
//! and changes formats without notice, so parse failures surface as
//! `ResponseFormatChanged` and the router falls through to BRAPI. B3-listed
//! symbols are queried with the `.SA` suffix Yahoo expects.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{PricePoint, PriceSeries};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, FetchWindow, PriceProvider};
use super::router::{Asset, Market};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Deserialize)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Yahoo symbol for an asset: B3 listings get the `.SA` suffix.
    fn chart_symbol(asset: &Asset) -> String {
        let ticker = asset.ticker.trim().to_uppercase();
        match asset.market {
            Market::B3 if !ticker.ends_with(".SA") => format!("{ticker}.SA"),
            _ => ticker,
        }
    }

    fn chart_url(symbol: &str, window: FetchWindow) -> String {
        let end = chrono::Utc::now().date_naive();
        let start = window.start_from(end);
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval={}",
            window.interval_param()
        )
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<PricePoint>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                ticker: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut points = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            // Rows without a close are holidays or half-day gaps — skip them.
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let Some(date) = chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
            else {
                return Err(DataError::ResponseFormatChanged(format!(
                    "invalid timestamp: {ts}"
                )));
            };
            points.push(PricePoint {
                ts: date,
                open: quote.open.get(i).copied().flatten().unwrap_or(f64::NAN),
                high: quote.high.get(i).copied().flatten().unwrap_or(f64::NAN),
                low: quote.low.get(i).copied().flatten().unwrap_or(f64::NAN),
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
            });
        }

        if points.is_empty() {
            return Err(DataError::NoData {
                ticker: symbol.to_string(),
            });
        }

        Ok(points)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        window: FetchWindow,
    ) -> Result<Vec<PricePoint>, DataError> {
        if !self.breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(symbol, window);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
                if !self.breaker.is_allowed() {
                    return Err(DataError::CircuitBreakerTripped);
                }
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP ban — stop hammering immediately.
                        self.breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let points = Self::parse_response(symbol, chart)?;
                    self.breaker.record_success();
                    return Ok(points);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        self.breaker.record_failure();
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_history(&self, asset: &Asset, window: FetchWindow) -> Result<PriceSeries, DataError> {
        let symbol = Self::chart_symbol(asset);
        let points = self.fetch_with_retry(&symbol, window)?;
        // The series keeps the configured ticker, not the vendor symbol, so
        // downstream maps stay keyed consistently.
        let series = PriceSeries::new(asset.ticker.trim().to_uppercase(), points);
        if series.is_empty() {
            return Err(DataError::NoData {
                ticker: asset.ticker.clone(),
            });
        }
        Ok(series)
    }

    fn is_available(&self) -> bool {
        self.breaker.is_allowed()
    }
}
