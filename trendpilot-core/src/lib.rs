//! TrendPilot Core — domain types, data providers, signal and portfolio engines, state store.
//!
//! This crate contains the decision engine of the daily trend system:
//! - Domain types (price points/series, signals, positions, orders, portfolio state)
//! - Signal engine: SMA trend filter producing a binary on/off decision per asset
//! - Portfolio engine: equal-weight targets, drawdown kill switch, order diffing,
//!   mark-to-market
//! - Crash-safe state store with an append-only JSONL audit log
//! - Data provider trait with BRAPI / Yahoo Finance / Frankfurter / CSV
//!   implementations behind an asset-class router

pub mod data;
pub mod domain;
pub mod fingerprint;
pub mod portfolio;
pub mod signal;
pub mod store;
