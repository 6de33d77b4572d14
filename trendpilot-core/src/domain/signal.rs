//! Binary trend state and per-ticker signal.

use serde::{Deserialize, Serialize};

/// Trend on/off flag.
///
/// Serialized as the integers `0`/`1` so persisted positions and logged
/// signal maps match the state file layout consumed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TrendState {
    #[default]
    Off,
    On,
}

impl TrendState {
    pub fn is_on(self) -> bool {
        matches!(self, TrendState::On)
    }

    pub fn from_on(on: bool) -> Self {
        if on {
            TrendState::On
        } else {
            TrendState::Off
        }
    }

    pub fn as_int(self) -> u8 {
        self.into()
    }
}

impl From<TrendState> for u8 {
    fn from(state: TrendState) -> u8 {
        match state {
            TrendState::Off => 0,
            TrendState::On => 1,
        }
    }
}

impl TryFrom<u8> for TrendState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TrendState::Off),
            1 => Ok(TrendState::On),
            other => Err(format!("invalid trend state {other}, expected 0 or 1")),
        }
    }
}

/// One ticker's trend decision for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub ticker: String,
    pub state: TrendState,
}
