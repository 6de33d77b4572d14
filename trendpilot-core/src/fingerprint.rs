//! State identity — deterministic fingerprint of the configuration shape.
//!
//! The persisted state is only meaningful for one combination of universe,
//! trend parameters, and data-provider version. `StateId` is a BLAKE3 hash of
//! that combination; a mismatch on load forces a full reset so incompatible
//! historical state is never silently mixed after a configuration change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the persisted state shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StateId(String);

impl StateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty id marks state written before identity tracking; the runner
    /// adopts the current identity instead of resetting.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The configuration facets that define state compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateIdentity {
    /// Universe tickers, in configuration order.
    pub universe: Vec<String>,
    /// Trend reference name (e.g. "SMA").
    pub reference: String,
    /// Trend window in trading days.
    pub window: usize,
    /// Data provider version tag.
    pub provider_version: String,
}

impl StateIdentity {
    /// Deterministic id for this identity.
    ///
    /// Canonical serialization: serde_json emits object keys in a stable
    /// order, so equal identities hash equally across runs and platforms.
    pub fn state_id(&self) -> StateId {
        let canonical = serde_json::json!({
            "universe": self.universe,
            "reference": self.reference,
            "window": self.window,
            "provider": self.provider_version,
        });
        let hash = blake3::hash(canonical.to_string().as_bytes());
        StateId(hash.to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateIdentity {
        StateIdentity {
            universe: vec!["BOVA11".into(), "IVVB11".into()],
            reference: "SMA".into(),
            window: 126,
            provider_version: "BRAPI_QUOTE_HISTORY_v1".into(),
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(sample().state_id(), sample().state_id());
    }

    #[test]
    fn window_change_changes_id() {
        let mut other = sample();
        other.window = 200;
        assert_ne!(sample().state_id(), other.state_id());
    }

    #[test]
    fn universe_order_is_significant() {
        let mut other = sample();
        other.universe.reverse();
        assert_ne!(sample().state_id(), other.state_id());
    }

    #[test]
    fn provider_version_changes_id() {
        let mut other = sample();
        other.provider_version = "BRAPI_QUOTE_HISTORY_v2".into();
        assert_ne!(sample().state_id(), other.state_id());
    }

    #[test]
    fn default_id_is_empty() {
        assert!(StateId::default().is_empty());
        assert!(!sample().state_id().is_empty());
    }
}
