//! TrendPilot Runner — settings and daily-run orchestration.
//!
//! The runner is the only component with side effects beyond memory: it
//! loads settings and state, fans out per-ticker fetches, drives the
//! signal → weights → kill-switch → orders sequence, and persists the
//! result through the state store.

pub mod config;
pub mod daily;

pub use config::{ConfigError, Settings};
pub use daily::{
    run_daily, FetchProgress, RunError, RunOutcome, RunReport, SilentProgress, StdoutProgress,
};
