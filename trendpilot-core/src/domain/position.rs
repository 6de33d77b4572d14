//! Target position for one asset.

use serde::{Deserialize, Serialize};

use super::TrendState;

/// Target exposure from the most recent completed run, keyed by ticker
/// inside [`super::PortfolioState`].
///
/// Invariant: `weight == 0.0` whenever `state` is off; when on, the weight is
/// the equal-weight fraction of the effective universe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub state: TrendState,
    #[serde(default)]
    pub weight: f64,
}

impl Position {
    /// Flat position (trend off, zero weight).
    pub fn flat() -> Self {
        Self {
            state: TrendState::Off,
            weight: 0.0,
        }
    }

    /// Position derived from a target weight: on iff the weight is positive.
    pub fn from_weight(weight: f64) -> Self {
        Self {
            state: TrendState::from_on(weight > 0.0),
            weight,
        }
    }

    /// Whether state and weight agree (off ⇒ zero weight, on ⇒ positive).
    pub fn is_consistent(&self) -> bool {
        match self.state {
            TrendState::Off => self.weight == 0.0,
            TrendState::On => self.weight > 0.0,
        }
    }
}
