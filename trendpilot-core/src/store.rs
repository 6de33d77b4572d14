//! State store — crash-safe portfolio state plus an append-only audit log.
//!
//! Layout under the state directory:
//! - `state.json` — the live portfolio state, pretty-printed
//! - `state.json.bak` — the previous accepted state, rotated on every save
//! - `state.json.tmp` — scratch file for the atomic replace
//! - `events.log` — newline-delimited JSON audit trail, one event per line
//!
//! `save` writes to the temp file, flushes and fsyncs it, rotates the live
//! file to `.bak`, then renames temp → live. A crash at any point leaves
//! either the old or the new state fully intact — never a truncated file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Order, PortfolioState, TrendState};
use crate::fingerprint::StateId;

/// Persistence failure. Fatal to the run: silently continuing would risk
/// losing the audit trail.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state i/o: {0}")]
    Io(#[from] io::Error),

    #[error("state serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Trend parameters echoed into audit events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendParams {
    pub reference: String,
    pub window: usize,
}

/// Payload of a completed decision run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub provider: String,
    pub state_id: StateId,
    pub kill_switch: bool,
    pub trend: TrendParams,
    pub universe: Vec<String>,
    pub effective_universe: Vec<String>,
    pub skipped: Vec<String>,
    pub signals: BTreeMap<String, TrendState>,
    pub weights: BTreeMap<String, f64>,
    pub prices: BTreeMap<String, f64>,
    pub orders: Vec<Order>,
    pub equity: f64,
    pub peak_equity: f64,
    pub drawdown: f64,
    pub portfolio_return: f64,
}

/// Payload when no ticker produced a usable signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoDataEvent {
    pub provider: String,
    pub state_id: StateId,
    pub message: String,
    pub skipped: Vec<String>,
    pub universe: Vec<String>,
}

/// Payload when the run was skipped outright (kill switch already active).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSkippedEvent {
    pub state_id: StateId,
    pub reason: String,
}

/// Payload for a run that failed unexpectedly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunErrorEvent {
    pub message: String,
}

/// One audit event. Every run, whatever its outcome, appends exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    #[serde(rename = "RUN")]
    Run(RunEvent),
    #[serde(rename = "NO_DATA")]
    NoData(NoDataEvent),
    #[serde(rename = "RUN_SKIPPED")]
    RunSkipped(RunSkippedEvent),
    #[serde(rename = "RUN_ERROR")]
    RunError(RunErrorEvent),
}

impl AuditEvent {
    /// The wire tag, for display.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::Run(_) => "RUN",
            AuditEvent::NoData(_) => "NO_DATA",
            AuditEvent::RunSkipped(_) => "RUN_SKIPPED",
            AuditEvent::RunError(_) => "RUN_ERROR",
        }
    }
}

/// An audit event as it appears in the log: the payload plus the UTC
/// timestamp stamped at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Durable storage for portfolio state and the audit log.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join("state.json.bak")
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join("state.json.tmp")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("events.log")
    }

    /// Load the persisted state.
    ///
    /// Resilient by contract: a missing file yields `None`; a corrupt or
    /// truncated live file falls back to the backup; if that fails too,
    /// `None`. The caller substitutes the initial state, so loading can
    /// never abort a run.
    pub fn load(&self) -> Option<PortfolioState> {
        if let Some(state) = Self::read_state(&self.state_path()) {
            return Some(state);
        }
        Self::read_state(&self.backup_path())
    }

    fn read_state(path: &Path) -> Option<PortfolioState> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Persist the state crash-safely.
    ///
    /// Write temp → fsync → rotate live to `.bak` → atomic rename temp to
    /// live. The backup rotation is best-effort; the promote is not.
    pub fn save(&self, state: &PortfolioState) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
            file.sync_all()?;
        }

        let live = self.state_path();
        if live.exists() {
            let _ = fs::rename(&live, self.backup_path());
        }
        fs::rename(&temp, &live)?;
        Ok(())
    }

    /// Append one audit event, stamped with the current UTC time.
    pub fn append_event(&self, event: AuditEvent) -> Result<AuditRecord, StoreError> {
        self.append_record(AuditRecord {
            ts: Utc::now(),
            event,
        })
    }

    /// Append a pre-stamped record. Exposed so tests can pin timestamps.
    pub fn append_record(&self, record: AuditRecord) -> Result<AuditRecord, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(record)
    }

    /// Read the whole audit log, oldest first. Blank and malformed lines
    /// are skipped — a half-written tail line must never break consumers.
    pub fn read_events(&self) -> Result<Vec<AuditRecord>, StoreError> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        let reader = io::BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(_) => continue,
            }
        }
        Ok(records)
    }
}
