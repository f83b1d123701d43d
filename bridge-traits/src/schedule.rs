//! Deferred Job Scheduling Abstraction
//!
//! The sync engine never blocks across work items: each tick re-schedules
//! its own continuation through this trait. Hosts decide how a scheduled job
//! actually fires (an in-process timer loop, a cron-like system scheduler,
//! a message queue).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// A named unit of deferred work with string arguments.
///
/// Job names are the cancellation handle: scheduling a second job under the
/// same name replaces the pending one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub name: String,
    pub args: Vec<String>,
}

impl ScheduledJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// One-shot job scheduler trait
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Schedule a job to fire once after `delay`. A pending job with the
    /// same name is replaced.
    async fn schedule_once(&self, job: ScheduledJob, delay: Duration) -> Result<()>;

    /// Cancel a pending job by name. Cancelling an unknown name is a no-op.
    async fn cancel(&self, name: &str) -> Result<()>;
}
