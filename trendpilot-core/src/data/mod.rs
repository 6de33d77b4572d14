//! Data layer — provider trait, concrete providers, and the asset router.

pub mod brapi;
pub mod circuit_breaker;
pub mod csv;
pub mod fx;
pub mod provider;
pub mod router;
pub mod yahoo;

pub use brapi::{BrapiProvider, DATA_PROVIDER_VERSION};
pub use circuit_breaker::CircuitBreaker;
pub use csv::CsvDirProvider;
pub use fx::FrankfurterProvider;
pub use provider::{DataError, FetchWindow, Interval, Period, PriceProvider};
pub use router::{Asset, AssetClass, Market, ProviderRouter};
pub use yahoo::YahooProvider;
