//! Asset metadata and provider routing.
//!
//! Each (asset class, market) combination maps to an ordered chain of
//! providers, tried in sequence until one yields a non-empty series or the
//! chain is exhausted. Whatever went wrong inside a chain surfaces as a
//! single [`DataError`] — the runner treats all of them as "no data for
//! this ticker".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::PriceSeries;

use super::brapi::BrapiProvider;
use super::circuit_breaker::CircuitBreaker;
use super::fx::FrankfurterProvider;
use super::provider::{DataError, FetchWindow, PriceProvider};
use super::yahoo::YahooProvider;

/// Asset class, as declared in the universe configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    #[default]
    Etf,
    #[serde(alias = "EQUITY", alias = "ACAO")]
    Stock,
    Fx,
}

/// Listing market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    #[default]
    B3,
    Otc,
}

/// One universe member: ticker plus the routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub ticker: String,
    #[serde(default)]
    pub class: AssetClass,
    #[serde(default)]
    pub market: Market,
}

impl Asset {
    pub fn new(ticker: impl Into<String>, class: AssetClass, market: Market) -> Self {
        Self {
            ticker: ticker.into(),
            class,
            market,
        }
    }

    /// The legacy configuration format lists bare tickers, all ETFs on B3.
    pub fn etf_b3(ticker: impl Into<String>) -> Self {
        Self::new(ticker, AssetClass::Etf, Market::B3)
    }
}

/// Ordered provider chains per route.
pub struct ProviderRouter {
    etf_b3: Vec<Arc<dyn PriceProvider>>,
    stock_b3: Vec<Arc<dyn PriceProvider>>,
    fx: Vec<Arc<dyn PriceProvider>>,
    fallback: Vec<Arc<dyn PriceProvider>>,
}

impl ProviderRouter {
    /// Production routing:
    /// - ETFs on B3 → Yahoo Finance, then BRAPI
    /// - stocks on B3 → BRAPI
    /// - FX pairs → Frankfurter
    /// - anything else → BRAPI
    ///
    /// The HTTP providers share one circuit breaker.
    pub fn live() -> Self {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let yahoo: Arc<dyn PriceProvider> = Arc::new(YahooProvider::new(breaker.clone()));
        let brapi: Arc<dyn PriceProvider> = Arc::new(BrapiProvider::from_env(breaker));
        let fx: Arc<dyn PriceProvider> = Arc::new(FrankfurterProvider::new());
        Self {
            etf_b3: vec![yahoo, Arc::clone(&brapi)],
            stock_b3: vec![Arc::clone(&brapi)],
            fx: vec![fx],
            fallback: vec![brapi],
        }
    }

    /// Route every asset class through one provider. Used for offline mode
    /// (CSV directory) and tests.
    pub fn single(provider: Arc<dyn PriceProvider>) -> Self {
        Self {
            etf_b3: vec![Arc::clone(&provider)],
            stock_b3: vec![Arc::clone(&provider)],
            fx: vec![Arc::clone(&provider)],
            fallback: vec![provider],
        }
    }

    /// Explicit chains, in routing order. Used by tests exercising fallback.
    pub fn with_chains(
        etf_b3: Vec<Arc<dyn PriceProvider>>,
        stock_b3: Vec<Arc<dyn PriceProvider>>,
        fx: Vec<Arc<dyn PriceProvider>>,
        fallback: Vec<Arc<dyn PriceProvider>>,
    ) -> Self {
        Self {
            etf_b3,
            stock_b3,
            fx,
            fallback,
        }
    }

    fn chain(&self, asset: &Asset) -> &[Arc<dyn PriceProvider>] {
        match (asset.class, asset.market) {
            (AssetClass::Etf, Market::B3) => &self.etf_b3,
            (AssetClass::Stock, Market::B3) => &self.stock_b3,
            (AssetClass::Fx, _) => &self.fx,
            _ => &self.fallback,
        }
    }

    /// Fetch history for one asset through its provider chain.
    pub fn fetch(&self, asset: &Asset, window: FetchWindow) -> Result<PriceSeries, DataError> {
        let mut last_error = DataError::NoData {
            ticker: asset.ticker.clone(),
        };
        for provider in self.chain(asset) {
            if !provider.is_available() {
                last_error = DataError::CircuitBreakerTripped;
                continue;
            }
            match provider.fetch_history(asset, window) {
                Ok(series) if !series.is_empty() => return Ok(series),
                Ok(_) => {
                    last_error = DataError::NoData {
                        ticker: asset.ticker.clone(),
                    };
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}
