//! # Run State Machine
//!
//! Lifecycle of an import run with validated state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Running → Completed
//!    ↓  ↑
//!    ↓  └── (resume)
//!    ├──→ Stopped
//!    └──→ Failed
//! ```
//!
//! A run state only exists between `start()` and the next `start()`; "no
//! stored state" is reported as `Idle`. The state value is persisted to the
//! durable KV store after every mutation, so any tick can run in a fresh
//! process.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Unique identifier for one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of the current (or reported absence of a) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run state exists. Only used in status reports.
    Idle,
    Running,
    Stopped,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for RunStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(SyncError::Data(format!("unknown run status: {}", s))),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase the run is in. Phases 1-3 happen inside `start()`; a persisted
/// state is always in `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Validating,
    Counting,
    Collecting,
    Processing,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Counting => "counting",
            Self::Collecting => "collecting",
            Self::Processing => "processing",
        }
    }
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Successfully processed items (imported + updated).
    pub processed: u64,
    pub imported: u64,
    pub updated: u64,
    /// Items popped from the queue but not processable (e.g. empty id).
    pub skipped: u64,
    /// Items whose processing failed; never fatal to the run.
    pub errors: u64,
}

/// Durable state of one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub id: RunId,
    pub status: RunStatus,
    pub phase: RunPhase,
    /// Items collected into the queue at start.
    pub total: u64,
    pub counters: RunCounters,
    pub started_at: i64,
    pub last_update_at: i64,
    pub stopped_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl RunState {
    /// Create the state for a freshly started run: phases 1-3 already
    /// succeeded, processing begins.
    pub fn new(total: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: RunId::new(),
            status: RunStatus::Running,
            phase: RunPhase::Processing,
            total,
            counters: RunCounters::default(),
            started_at: now,
            last_update_at: now,
            stopped_at: None,
            completed_at: None,
        }
    }

    pub fn record_imported(&mut self) {
        self.counters.processed += 1;
        self.counters.imported += 1;
    }

    pub fn record_updated(&mut self) {
        self.counters.processed += 1;
        self.counters.updated += 1;
    }

    pub fn record_skipped(&mut self) {
        self.counters.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.counters.errors += 1;
    }

    /// Refresh the last-update timestamp.
    pub fn touch(&mut self) {
        self.last_update_at = chrono::Utc::now().timestamp();
    }

    /// Running → Stopped. The in-flight tick is never interrupted; only the
    /// next tick is prevented.
    pub fn stop(&mut self) -> Result<()> {
        self.validate_transition(RunStatus::Stopped)?;
        self.status = RunStatus::Stopped;
        self.stopped_at = Some(chrono::Utc::now().timestamp());
        self.touch();
        Ok(())
    }

    /// Stopped → Running. Counters are untouched; resumption is purely
    /// "schedule more ticks".
    pub fn resume(&mut self) -> Result<()> {
        self.validate_transition(RunStatus::Running)?;
        self.status = RunStatus::Running;
        self.touch();
        Ok(())
    }

    /// Running → Completed.
    pub fn complete(&mut self) -> Result<()> {
        self.validate_transition(RunStatus::Completed)?;
        self.status = RunStatus::Completed;
        self.completed_at = Some(chrono::Utc::now().timestamp());
        self.touch();
        Ok(())
    }

    /// Running → Failed. Reserved for infrastructure failures (the queue or
    /// state store itself); per-item errors only increment counters.
    pub fn fail(&mut self) -> Result<()> {
        self.validate_transition(RunStatus::Failed)?;
        self.status = RunStatus::Failed;
        self.completed_at = Some(chrono::Utc::now().timestamp());
        self.touch();
        Ok(())
    }

    /// Seconds since start, capped at completion time when finished.
    pub fn duration_secs(&self) -> u64 {
        let end = self
            .completed_at
            .or(self.stopped_at)
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        (end - self.started_at).max(0) as u64
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let handled = self.counters.processed + self.counters.errors + self.counters.skipped;
        ((handled as f64 / self.total as f64) * 100.0).min(100.0)
    }

    fn validate_transition(&self, to: RunStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (RunStatus::Running, RunStatus::Stopped)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Stopped, RunStatus::Running)
        );

        if !valid {
            return Err(SyncError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}
