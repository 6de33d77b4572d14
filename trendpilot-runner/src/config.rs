//! Runner settings, loaded from a TOML file.
//!
//! Every table and field has a default matching the reference deployment,
//! so a missing or partial file still yields a working configuration. The
//! settings value is immutable once handed to the runner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use trendpilot_core::data::{
    Asset, CsvDirProvider, FetchWindow, ProviderRouter, DATA_PROVIDER_VERSION,
};
use trendpilot_core::domain::PortfolioState;
use trendpilot_core::fingerprint::{StateId, StateIdentity};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Universe section. Either a structured asset list or the legacy bare
/// ticker list; the structured form wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub assets: Vec<Asset>,
    pub tickers: Vec<String>,
}

impl UniverseConfig {
    /// The default four-ETF universe of the reference deployment.
    fn default_assets() -> Vec<Asset> {
        ["BOVA11", "IVVB11", "IMAB11", "GOLD11"]
            .into_iter()
            .map(Asset::etf_b3)
            .collect()
    }

    /// Resolve the configured universe into normalized assets.
    pub fn resolve(&self) -> Vec<Asset> {
        let structured: Vec<Asset> = self
            .assets
            .iter()
            .filter(|a| !a.ticker.trim().is_empty())
            .map(|a| Asset::new(a.ticker.trim().to_uppercase(), a.class, a.market))
            .collect();
        if !structured.is_empty() {
            return structured;
        }

        let legacy: Vec<Asset> = self
            .tickers
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Asset::etf_b3(t.trim().to_uppercase()))
            .collect();
        if !legacy.is_empty() {
            return legacy;
        }

        Self::default_assets()
    }
}

/// Trend-filter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub reference: String,
    pub window: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            reference: "SMA".into(),
            window: 126,
        }
    }
}

/// Kill-switch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KillSwitchConfig {
    pub enabled: bool,
    pub max_drawdown: f64,
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_drawdown: 0.20,
        }
    }
}

/// System-level parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub initial_equity: f64,
    pub state_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            initial_equity: 100_000.0,
            state_dir: PathBuf::from("state"),
        }
    }
}

/// Data-fetch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub period_years: u32,
    /// When set, all fetches read `<csv_dir>/<TICKER>.csv` instead of
    /// hitting HTTP providers.
    pub csv_dir: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            period_years: 10,
            csv_dir: None,
        }
    }
}

/// Complete runner settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub universe: UniverseConfig,
    pub trend: TrendConfig,
    pub kill_switch: KillSwitchConfig,
    pub system: SystemConfig,
    pub data: DataConfig,
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Load settings, falling back to defaults when the file is missing —
    /// the system must run unconfigured.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The identity facets that define state compatibility.
    pub fn identity(&self) -> StateIdentity {
        StateIdentity {
            universe: self
                .universe
                .resolve()
                .into_iter()
                .map(|a| a.ticker)
                .collect(),
            reference: self.trend.reference.to_uppercase(),
            window: self.trend.window,
            provider_version: DATA_PROVIDER_VERSION.into(),
        }
    }

    pub fn state_id(&self) -> StateId {
        self.identity().state_id()
    }

    /// Fresh state for this configuration.
    pub fn initial_state(&self) -> PortfolioState {
        PortfolioState::initial(self.state_id(), self.system.initial_equity)
    }

    pub fn fetch_window(&self) -> FetchWindow {
        FetchWindow::daily_years(self.data.period_years)
    }

    /// Provider routing for this configuration: the CSV directory when one
    /// is set, live HTTP providers otherwise.
    pub fn build_router(&self) -> ProviderRouter {
        match &self.data.csv_dir {
            Some(dir) => ProviderRouter::single(Arc::new(CsvDirProvider::new(dir.clone()))),
            None => ProviderRouter::live(),
        }
    }
}
