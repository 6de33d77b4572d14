//! BRAPI quote-history provider — the primary source for B3 equities.
//!
//! Talks to `GET {base}/quote/{ticker}?range=10y&interval=1d`. Candle
//! timestamps arrive as epoch seconds or milliseconds depending on the
//! endpoint era, so both are accepted. A bearer token (some instruments
//! require one) is read from the `BRAPI_TOKEN` environment variable.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{PricePoint, PriceSeries};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, FetchWindow, PriceProvider};
use super::router::Asset;

/// Version tag for the state identity and audit events. Bump when the
/// provider contract changes in a way that invalidates persisted state.
pub const DATA_PROVIDER_VERSION: &str = "BRAPI_QUOTE_HISTORY_v1";

const DEFAULT_BASE_URL: &str = "https://brapi.dev/api";

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    results: Option<Vec<QuoteResult>>,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    #[serde(rename = "historicalDataPrice")]
    historical: Option<Vec<HistoricalBar>>,
}

#[derive(Debug, Deserialize)]
struct HistoricalBar {
    date: Option<i64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

pub struct BrapiProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
    breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl BrapiProvider {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("trendpilot/1.0")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            breaker,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Base URL and token from `BRAPI_BASE_URL` / `BRAPI_TOKEN`.
    pub fn from_env(breaker: Arc<CircuitBreaker>) -> Self {
        let base_url =
            std::env::var("BRAPI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let token = std::env::var("BRAPI_TOKEN").ok();
        Self::new(base_url, token, breaker)
    }

    /// Convert BRAPI candles into price points. Entries without a date or a
    /// close are skipped; millisecond timestamps are scaled down.
    fn parse_history(bars: Vec<HistoricalBar>) -> Vec<PricePoint> {
        let mut points = Vec::with_capacity(bars.len());
        for bar in bars {
            let (Some(raw_date), Some(close)) = (bar.date, bar.close) else {
                continue;
            };
            let secs = if raw_date > 10_000_000_000 {
                raw_date / 1000
            } else {
                raw_date
            };
            let Some(ts) = chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
            else {
                continue;
            };
            points.push(PricePoint {
                ts,
                open: bar.open.unwrap_or(f64::NAN),
                high: bar.high.unwrap_or(f64::NAN),
                low: bar.low.unwrap_or(f64::NAN),
                close,
                volume: bar.volume.unwrap_or(0.0),
            });
        }
        points
    }

    fn fetch_with_retry(
        &self,
        ticker: &str,
        window: FetchWindow,
    ) -> Result<Vec<PricePoint>, DataError> {
        if !self.breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = format!(
            "{}/quote/{}?range={}&interval={}",
            self.base_url,
            ticker,
            window.range_param(),
            window.interval_param()
        );

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * attempt);
            }

            let mut request = self.client.get(&url);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.breaker.record_failure();
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: 2,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {ticker}")));
                        continue;
                    }

                    let quote: QuoteResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {ticker}: {e}"
                        ))
                    })?;

                    let historical = quote
                        .results
                        .unwrap_or_default()
                        .into_iter()
                        .next()
                        .and_then(|r| r.historical)
                        .unwrap_or_default();

                    if historical.is_empty() {
                        return Err(DataError::NoData {
                            ticker: ticker.to_string(),
                        });
                    }

                    self.breaker.record_success();
                    return Ok(Self::parse_history(historical));
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

impl PriceProvider for BrapiProvider {
    fn name(&self) -> &str {
        "brapi"
    }

    fn fetch_history(&self, asset: &Asset, window: FetchWindow) -> Result<PriceSeries, DataError> {
        let ticker = asset.ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(DataError::NoData {
                ticker: asset.ticker.clone(),
            });
        }

        let points = self.fetch_with_retry(&ticker, window)?;
        let series = PriceSeries::new(ticker.clone(), points);
        if series.is_empty() {
            return Err(DataError::NoData { ticker });
        }
        Ok(series)
    }

    fn is_available(&self) -> bool {
        self.breaker.is_allowed()
    }
}
