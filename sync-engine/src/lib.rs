//! # Sync Engine
//!
//! Synchronizes the remote vehicle catalog into the local content store.
//!
//! ## Overview
//!
//! The engine decomposes an import into short, independently scheduled
//! ticks rather than one long-running loop. All cross-tick state lives in
//! durable storage, so a run survives process interruption and any tick can
//! execute on any worker:
//!
//! - **Run state machine** (`state`): Running / Stopped / Completed /
//!   Failed with validated transitions, persisted per tick
//! - **Listing queue** (`queue`): durable FIFO of collected ids with TTL
//! - **Progress snapshots** (`progress`): step status for observability
//!   polling, independent of the run state
//! - **Item processor** (`processor`): fetch-map-upsert for one listing
//!   with volatility-field change detection
//! - **Media pipeline** (`media`): per-item image queue with best-format
//!   selection, one image per worker tick
//! - **Import orchestrator** (`orchestrator`): the four-phase run driver
//!   exposing start / tick / stop / resume / status
//! - **Reconciliation engine** (`reconcile`): local-vs-remote set diff with
//!   configurable orphan remediation and missing-item import
//!
//! ## Concurrency model
//!
//! At most one run is active globally; items are processed in FIFO
//! collection order with no parallelism, respecting the remote API's rate
//! expectations. Cancellation is cooperative: `stop()` prevents the next
//! tick, never interrupting the one in flight.

pub mod config;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod queue;
pub mod reconcile;
pub mod state;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use media::{
    job_name as media_job_name, select_best_url, MediaQueue, MediaQueueEntry, MediaQueueStatus,
    MediaTickOutcome, MediaWorker, MEDIA_JOB_PREFIX,
};
pub use orchestrator::{ImportOrchestrator, RunStatusReport, TickOutcome, PROCESS_JOB};
pub use processor::{detect_changes, ItemProcessor, ProcessAction, ProcessOutcome};
pub use progress::{steps, ProgressSnapshot, ProgressTracker};
pub use queue::{ListingQueue, QueueItem, QueueMeta, QueueProgress};
pub use reconcile::{
    ImportMissingSummary, OrphanPolicy, ReconciliationEngine, ReconciliationResult,
    RemediationSummary,
};
pub use state::{RunCounters, RunId, RunPhase, RunState, RunStatus};
