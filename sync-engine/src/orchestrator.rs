//! # Import Orchestrator
//!
//! Drives the four-phase run state machine:
//!
//! 1. **Validating** - mandatory connection preflight; any failure aborts
//!    before any state is created
//! 2. **Counting** - fetch the remote total
//! 3. **Collecting** - collect every listing id into the durable queue
//! 4. **Processing** - one listing per externally scheduled tick, each tick
//!    re-scheduling its own continuation
//!
//! All cross-tick state lives in durable storage (run state, queue,
//! progress snapshots), so any tick can execute on any worker process.
//! `stop()` only cancels the next scheduled tick; an in-flight tick always
//! finishes its item.

use bridge_traits::{KvStore, KvStoreExt, ScheduledJob, Scheduler};
use catalog_client::{ConnectionValidator, QueryClient};
use content_store::{
    ContentRepository, HistoryStatus, HistoryStore, ItemAction, ItemLogStore, OperationCounters,
    OperationType,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::processor::{ItemProcessor, ProcessAction};
use crate::progress::{steps, ProgressTracker};
use crate::queue::{ListingQueue, QueueProgress};
use crate::reconcile::{OrphanPolicy, ReconciliationEngine};
use crate::state::{RunCounters, RunPhase, RunState, RunStatus};

const RUN_STATE_KEY: &str = "sync:run-state";

/// Scheduler job name for processing ticks.
pub const PROCESS_JOB: &str = "sync.process-listing";

/// What one `tick()` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No running state; nothing happened.
    Idle,
    /// One item processed successfully.
    Processed(ProcessAction),
    /// One item failed; the run continues.
    Errored,
    /// An unusable queue entry was skipped.
    Skipped,
    /// The queue drained and the run completed.
    Completed,
}

/// Merged status view for the operational surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunStatusReport {
    pub status: RunStatus,
    pub phase: Option<RunPhase>,
    pub total: u64,
    pub counters: RunCounters,
    pub progress_percent: f64,
    pub local_published: u64,
    pub queue: QueueProgress,
    pub message: String,
}

/// Coordinates a full import run across its collaborators.
pub struct ImportOrchestrator {
    validator: Arc<ConnectionValidator>,
    client: Arc<QueryClient>,
    queue: Arc<ListingQueue>,
    processor: Arc<ItemProcessor>,
    reconciler: Arc<ReconciliationEngine>,
    repo: Arc<dyn ContentRepository>,
    kv: Arc<dyn KvStore>,
    progress: Arc<ProgressTracker>,
    history: Arc<dyn HistoryStore>,
    item_logs: Arc<dyn ItemLogStore>,
    scheduler: Arc<dyn Scheduler>,
    config: SyncConfig,
}

impl ImportOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        validator: Arc<ConnectionValidator>,
        client: Arc<QueryClient>,
        queue: Arc<ListingQueue>,
        processor: Arc<ItemProcessor>,
        reconciler: Arc<ReconciliationEngine>,
        repo: Arc<dyn ContentRepository>,
        kv: Arc<dyn KvStore>,
        progress: Arc<ProgressTracker>,
        history: Arc<dyn HistoryStore>,
        item_logs: Arc<dyn ItemLogStore>,
        scheduler: Arc<dyn Scheduler>,
        config: SyncConfig,
    ) -> Self {
        Self {
            validator,
            client,
            queue,
            processor,
            reconciler,
            repo,
            kv,
            progress,
            history,
            item_logs,
            scheduler,
            config,
        }
    }

    async fn load_state(&self) -> Result<Option<RunState>> {
        Ok(self.kv.get_json(RUN_STATE_KEY).await?)
    }

    async fn save_state(&self, state: &RunState) -> Result<()> {
        self.kv.set_json(RUN_STATE_KEY, state, None).await?;
        Ok(())
    }

    /// Start a new import run.
    ///
    /// Runs phases 1-3 synchronously; any failure there aborts with no run
    /// state created. On success the run state exists with status Running
    /// and the first processing tick is scheduled. Returns the number of
    /// collected ids.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<u64> {
        if let Some(state) = self.load_state().await? {
            if state.status == RunStatus::Running {
                warn!("Rejected start: a run is already in progress");
                return Err(SyncError::RunInProgress);
            }
        }

        info!("Starting import run");
        self.progress.clear().await?;
        self.queue.reset().await?;
        self.kv.delete(RUN_STATE_KEY).await?;

        // Phase 1: connection validation (mandatory)
        let report = match self.validator.validate().await {
            Ok(report) => {
                self.progress
                    .record(
                        steps::VALIDATION,
                        json!({ "status": "complete", "total_listings": report.total_listings }),
                    )
                    .await?;
                report
            }
            Err(e) => {
                error!(error = %e, "Connection validation failed; aborting run");
                self.progress
                    .record(
                        steps::VALIDATION,
                        json!({ "status": "failed", "error": e.to_string() }),
                    )
                    .await?;
                return Err(e.into());
            }
        };
        debug!(
            total_listings = report.total_listings,
            "Connection validation passed"
        );

        // Phase 2: remote total count
        let total = match self.client.total_count().await {
            Ok(total) => {
                self.progress
                    .record(
                        steps::TOTAL_COUNT,
                        json!({ "status": "complete", "total": total }),
                    )
                    .await?;
                total
            }
            Err(e) => {
                error!(error = %e, "Total count failed; aborting run");
                self.progress
                    .record(
                        steps::TOTAL_COUNT,
                        json!({ "status": "failed", "error": e.to_string() }),
                    )
                    .await?;
                return Err(e.into());
            }
        };
        info!(total, "Remote catalog total");

        // Phase 3: id collection
        let collected = match self.queue.collect_all(total).await {
            Ok(collected) => {
                self.progress
                    .record(
                        steps::COLLECTION,
                        json!({ "status": "complete", "collected": collected }),
                    )
                    .await?;
                collected
            }
            Err(e) => {
                error!(error = %e, "Id collection failed; aborting run");
                self.progress
                    .record(
                        steps::COLLECTION,
                        json!({ "status": "failed", "error": e.to_string() }),
                    )
                    .await?;
                return Err(e);
            }
        };

        // Phase 4: create the run state and schedule the first tick
        let state = RunState::new(collected);
        self.save_state(&state).await?;
        self.progress
            .record(
                steps::PROCESSING,
                json!({ "status": "started", "total": collected }),
            )
            .await?;
        self.history
            .add(
                OperationType::Import,
                HistoryStatus::Running,
                OperationCounters::default(),
                0,
                &format!("Import started with {} listings", collected),
            )
            .await?;

        self.scheduler
            .schedule_once(ScheduledJob::new(PROCESS_JOB), Duration::ZERO)
            .await?;

        info!(run_id = %state.id, total = collected, "Import run started");
        Ok(collected)
    }

    /// Process one queued listing. No-op unless a run is Running.
    ///
    /// Per-item failures increment the error counter and never abort the
    /// run; only infrastructure failures (the queue or state store itself)
    /// mark the run Failed.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(mut state) = self.load_state().await? else {
            debug!("Tick with no run state");
            return Ok(TickOutcome::Idle);
        };
        if state.status != RunStatus::Running {
            debug!(status = %state.status, "Tick while not running");
            return Ok(TickOutcome::Idle);
        }

        let item = match self.queue.pop_front().await {
            Ok(item) => item,
            Err(e) => {
                error!(error = %e, "Queue read failed; failing run");
                state.fail()?;
                self.save_state(&state).await?;
                self.history
                    .add(
                        OperationType::Import,
                        HistoryStatus::Failed,
                        counters_of(&state),
                        state.duration_secs(),
                        &format!("Import failed: {}", e),
                    )
                    .await?;
                return Err(e);
            }
        };

        let Some(item) = item else {
            return self.complete_run(state).await;
        };

        if item.external_id.is_empty() {
            warn!("Skipping queue entry with empty external id");
            state.record_skipped();
            state.touch();
            self.save_state(&state).await?;
            self.schedule_next_tick().await?;
            return Ok(TickOutcome::Skipped);
        }

        let position =
            state.counters.processed + state.counters.errors + state.counters.skipped + 1;
        info!(
            external_id = %item.external_id,
            position,
            total = state.total,
            "Processing listing"
        );

        let outcome = match self.processor.process(&item.external_id).await {
            Ok(outcome) => {
                match outcome.action {
                    ProcessAction::Imported => state.record_imported(),
                    ProcessAction::Updated => state.record_updated(),
                }
                self.queue.mark_processed(&item.external_id).await?;
                TickOutcome::Processed(outcome.action)
            }
            Err(e) => {
                state.record_error();
                error!(
                    external_id = %item.external_id,
                    kind = e.kind(),
                    error = %e,
                    "Failed to process listing"
                );
                if let Err(log_err) = self
                    .item_logs
                    .add(&item.external_id, None, ItemAction::Error, &[], &e.to_string())
                    .await
                {
                    warn!(error = %log_err, "Failed to write item error log");
                }
                TickOutcome::Errored
            }
        };

        state.touch();
        self.save_state(&state).await?;
        self.progress
            .record(
                steps::PROCESSING,
                json!({
                    "status": "progress",
                    "processed": state.counters.processed,
                    "total": state.total,
                    "imported": state.counters.imported,
                    "updated": state.counters.updated,
                    "errors": state.counters.errors,
                    "percent": state.progress_percent(),
                }),
            )
            .await?;
        self.schedule_next_tick().await?;

        Ok(outcome)
    }

    async fn schedule_next_tick(&self) -> Result<()> {
        self.scheduler
            .schedule_once(ScheduledJob::new(PROCESS_JOB), self.config.tick_delay)
            .await?;
        Ok(())
    }

    async fn complete_run(&self, mut state: RunState) -> Result<TickOutcome> {
        state.complete()?;
        self.save_state(&state).await?;

        let duration = state.duration_secs();
        info!(
            run_id = %state.id,
            processed = state.counters.processed,
            imported = state.counters.imported,
            updated = state.counters.updated,
            errors = state.counters.errors,
            duration_secs = duration,
            "Import run complete"
        );

        self.progress
            .record(
                steps::PROCESSING,
                json!({
                    "status": "complete",
                    "processed": state.counters.processed,
                    "imported": state.counters.imported,
                    "updated": state.counters.updated,
                    "errors": state.counters.errors,
                    "duration_secs": duration,
                }),
            )
            .await?;
        self.history
            .add(
                OperationType::Import,
                HistoryStatus::Completed,
                counters_of(&state),
                duration,
                &format!(
                    "Import completed: {} imported, {} updated, {} errors",
                    state.counters.imported, state.counters.updated, state.counters.errors
                ),
            )
            .await?;

        if self.config.reconcile_on_complete {
            // A reconciliation failure never un-completes the run.
            if let Err(e) = self.post_run_reconciliation().await {
                error!(error = %e, "Post-run reconciliation failed");
            }
        }

        Ok(TickOutcome::Completed)
    }

    async fn post_run_reconciliation(&self) -> Result<()> {
        info!("Running post-import reconciliation");
        let result = self.reconciler.compare().await?;

        if self.config.auto_handle_orphans
            && self.config.orphan_policy != OrphanPolicy::None
            && !result.orphaned_local.is_empty()
        {
            let ids: Vec<String> = result.orphaned_local.keys().cloned().collect();
            let summary = self
                .reconciler
                .handle_orphaned(&ids, self.config.orphan_policy)
                .await?;
            info!(
                processed = summary.processed,
                errors = summary.errors,
                policy = self.config.orphan_policy.as_str(),
                "Auto-handled orphaned listings"
            );
        }

        if self.config.auto_import_missing && !result.missing_remote.is_empty() {
            let ids: Vec<String> = result.missing_remote.iter().cloned().collect();
            let summary = self.reconciler.import_missing(&ids).await?;
            info!(
                processed = summary.processed,
                imported = summary.imported,
                errors = summary.errors,
                "Auto-imported missing listings"
            );
        }

        Ok(())
    }

    /// Stop the current run. Returns false when nothing was running.
    ///
    /// Cancels the pending next tick; a tick already in flight finishes its
    /// item and its own reschedule lands after the status change, where the
    /// next tick sees Stopped and does nothing.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<bool> {
        let Some(mut state) = self.load_state().await? else {
            warn!("Stop requested with no run state");
            return Ok(false);
        };
        if state.status != RunStatus::Running {
            warn!(status = %state.status, "Stop requested while not running");
            return Ok(false);
        }

        self.scheduler.cancel(PROCESS_JOB).await?;
        state.stop()?;
        self.save_state(&state).await?;

        self.history
            .add(
                OperationType::Import,
                HistoryStatus::Stopped,
                counters_of(&state),
                state.duration_secs(),
                "Import stopped by operator",
            )
            .await?;

        info!(run_id = %state.id, processed = state.counters.processed, "Import run stopped");
        Ok(true)
    }

    /// Resume a stopped run. Returns false when there is nothing resumable.
    ///
    /// Counters are untouched: all cross-tick state already lives in
    /// durable storage, so resumption is purely "schedule more ticks".
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<bool> {
        let Some(mut state) = self.load_state().await? else {
            warn!("Resume requested with no run state");
            return Ok(false);
        };
        if state.status != RunStatus::Stopped {
            warn!(status = %state.status, "Resume requested while not stopped");
            return Ok(false);
        }
        if !self.queue.has_items().await? {
            warn!("Resume requested with an empty queue");
            return Ok(false);
        }

        state.resume()?;
        self.save_state(&state).await?;
        self.schedule_next_tick().await?;

        info!(run_id = %state.id, "Import run resumed");
        Ok(true)
    }

    /// Merged run/queue/repository status for polling.
    pub async fn status(&self) -> Result<RunStatusReport> {
        let queue = self.queue.progress().await?;
        let local_published = self.repo.count_published().await?;

        let Some(state) = self.load_state().await? else {
            return Ok(RunStatusReport {
                status: RunStatus::Idle,
                phase: None,
                total: 0,
                counters: RunCounters::default(),
                progress_percent: 0.0,
                local_published,
                queue,
                message: "No import in progress.".to_string(),
            });
        };

        let message = match state.status {
            RunStatus::Running => format!(
                "Processing {} of {} listings ({:.1}%)...",
                state.counters.processed + state.counters.errors + state.counters.skipped,
                state.total,
                state.progress_percent()
            ),
            RunStatus::Completed => format!(
                "Import completed: {} imported, {} updated, {} errors",
                state.counters.imported, state.counters.updated, state.counters.errors
            ),
            RunStatus::Stopped => format!(
                "Import stopped after {} of {} listings",
                state.counters.processed, state.total
            ),
            RunStatus::Failed => "Import failed; see history for details".to_string(),
            RunStatus::Idle => "No import in progress.".to_string(),
        };

        Ok(RunStatusReport {
            status: state.status,
            phase: Some(state.phase),
            total: state.total,
            counters: state.counters,
            progress_percent: state.progress_percent(),
            local_published,
            queue,
            message,
        })
    }
}

fn counters_of(state: &RunState) -> OperationCounters {
    OperationCounters {
        processed: state.counters.processed,
        imported: state.counters.imported,
        updated: state.counters.updated,
        removed: 0,
        errors: state.counters.errors,
    }
}
