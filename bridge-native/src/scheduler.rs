//! In-Process Job Scheduler Implementation
//!
//! Tokio-based [`Scheduler`] for hosts that run the sync engine inside a
//! long-lived process. Scheduled jobs sleep on a timer task and are then
//! delivered onto an unbounded channel; the host drains the channel and
//! dispatches each job to the orchestrator or media worker.
//!
//! Jobs are keyed by name: scheduling a name that is already pending aborts
//! the previous timer, and `cancel` aborts without delivery. This mirrors
//! the engine's expectation that at most one continuation tick is pending
//! per job name.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    schedule::{ScheduledJob, Scheduler},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tokio-based one-shot scheduler.
pub struct TokioScheduler {
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    tx: UnboundedSender<ScheduledJob>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver the host drains for due jobs.
    pub fn new() -> (Self, UnboundedReceiver<ScheduledJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: Arc::new(Mutex::new(HashMap::new())),
                tx,
            },
            rx,
        )
    }

    /// Number of jobs currently waiting on their timer.
    pub async fn pending_count(&self) -> usize {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, handle| !handle.is_finished());
        pending.len()
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn schedule_once(&self, job: ScheduledJob, delay: Duration) -> Result<()> {
        let name = job.name.clone();
        let tx = self.tx.clone();

        let handle = tokio::spawn({
            let name = name.clone();
            async move {
                tokio::time::sleep(delay).await;
                if tx.send(job).is_err() {
                    warn!(job = %name, "Scheduler receiver dropped; job not delivered");
                }
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|_, existing| !existing.is_finished());
        if let Some(previous) = pending.insert(name.clone(), handle) {
            previous.abort();
            debug!(job = %name, "Replaced pending job");
        } else {
            debug!(job = %name, delay_ms = delay.as_millis() as u64, "Scheduled job");
        }

        Ok(())
    }

    async fn cancel(&self, name: &str) -> Result<()> {
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.remove(name) {
            handle.abort();
            debug!(job = %name, "Cancelled pending job");
        }
        Ok(())
    }
}
