//! Orders derived from position-state transitions.

use serde::{Deserialize, Serialize};

/// What the state diff asks the operator to do with one asset.
///
/// `ForceExit` marks an exit caused by the kill switch tripping in the same
/// run, as opposed to an ordinary trend-off exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    Enter,
    Exit,
    ForceExit,
}

/// Ephemeral order record: derived each run from the position diff, appended
/// to the audit log, never persisted as state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub ticker: String,
    pub action: OrderAction,
}

impl Order {
    pub fn new(ticker: impl Into<String>, action: OrderAction) -> Self {
        Self {
            ticker: ticker.into(),
            action,
        }
    }
}
