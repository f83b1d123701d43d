//! # Progress Snapshots
//!
//! Append-only step→snapshot map written at every phase transition and
//! during processing, stored in the durable KV store. Observability polling
//! reads these snapshots without touching the run state itself.

use bridge_traits::{KvStore, KvStoreExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

const PROGRESS_KEY: &str = "sync:progress";

/// Step identifiers used by the orchestrator.
pub mod steps {
    pub const VALIDATION: &str = "validation";
    pub const TOTAL_COUNT: &str = "total-count";
    pub const COLLECTION: &str = "collection";
    pub const PROCESSING: &str = "processing";
}

/// One recorded snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub at: i64,
    pub data: serde_json::Value,
}

/// Writes and reads step snapshots.
pub struct ProgressTracker {
    kv: Arc<dyn KvStore>,
}

impl ProgressTracker {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Record the latest snapshot for a step, replacing the previous one.
    pub async fn record(&self, step: &str, data: serde_json::Value) -> Result<()> {
        let mut snapshots = self.snapshots().await?;
        snapshots.insert(
            step.to_string(),
            ProgressSnapshot {
                at: chrono::Utc::now().timestamp(),
                data,
            },
        );
        self.kv.set_json(PROGRESS_KEY, &snapshots, None).await?;
        debug!(step, "Progress snapshot recorded");
        Ok(())
    }

    /// All current snapshots, keyed by step.
    pub async fn snapshots(&self) -> Result<BTreeMap<String, ProgressSnapshot>> {
        Ok(self.kv.get_json(PROGRESS_KEY).await?.unwrap_or_default())
    }

    /// Drop all snapshots (called by a fresh `start()`).
    pub async fn clear(&self) -> Result<()> {
        self.kv.delete(PROGRESS_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::MemoryKvStore;
    use serde_json::json;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn test_record_and_read() {
        let tracker = tracker();

        tracker
            .record(steps::VALIDATION, json!({"status": "complete"}))
            .await
            .unwrap();
        tracker
            .record(steps::PROCESSING, json!({"processed": 3, "total": 10}))
            .await
            .unwrap();

        let snapshots = tracker.snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(
            snapshots[steps::PROCESSING].data["processed"],
            json!(3)
        );
    }

    #[tokio::test]
    async fn test_record_replaces_step_snapshot() {
        let tracker = tracker();

        tracker
            .record(steps::PROCESSING, json!({"processed": 1}))
            .await
            .unwrap();
        tracker
            .record(steps::PROCESSING, json!({"processed": 2}))
            .await
            .unwrap();

        let snapshots = tracker.snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[steps::PROCESSING].data["processed"], json!(2));
    }

    #[tokio::test]
    async fn test_clear() {
        let tracker = tracker();

        tracker
            .record(steps::VALIDATION, json!({"status": "failed"}))
            .await
            .unwrap();
        tracker.clear().await.unwrap();

        assert!(tracker.snapshots().await.unwrap().is_empty());
    }
}
