//! # Reconciliation Engine
//!
//! Computes the set difference between the local content repository's
//! external-id index and a freshly collected remote id set, and drives the
//! two remediations: orphan handling (local records the remote no longer
//! has) and missing-item import (remote records with no local counterpart).
//!
//! Remediation is per-id isolated: one failure increments the error counter
//! and the rest keep going.

use bridge_traits::{KvStore, KvStoreExt};
use catalog_client::QueryClient;
use content_store::{
    ContentRepository, ContentStatus, HistoryStatus, HistoryStore, LocalId, OperationCounters,
    OperationType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::processor::{ItemProcessor, ProcessAction};
use crate::queue::ListingQueue;

const COMPARISON_KEY: &str = "sync:comparison";

/// Remediation applied to orphaned listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Move to trash (recoverable).
    Trash,
    /// Archive: keep the record but take it out of publication.
    Archive,
    /// Keep published, mark with an orphaned-at field.
    Mark,
    /// Leave untouched.
    None,
    /// Delete permanently.
    HardDelete,
}

impl OrphanPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trash => "trash",
            Self::Archive => "archive",
            Self::Mark => "mark",
            Self::None => "none",
            Self::HardDelete => "hard_delete",
        }
    }
}

impl FromStr for OrphanPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trash" => Ok(Self::Trash),
            "archive" => Ok(Self::Archive),
            "mark" => Ok(Self::Mark),
            "none" => Ok(Self::None),
            "hard_delete" => Ok(Self::HardDelete),
            _ => Err(SyncError::Data(format!("unknown orphan policy: {}", s))),
        }
    }
}

/// Result of one comparison pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Exists locally but not in the current remote set.
    pub orphaned_local: BTreeMap<String, LocalId>,
    /// Exists remotely but not locally.
    pub missing_remote: BTreeSet<String>,
    /// Exists on both sides.
    pub synced: BTreeSet<String>,
    pub local_count: u64,
    pub remote_count: u64,
}

impl ReconciliationResult {
    pub fn orphaned_count(&self) -> u64 {
        self.orphaned_local.len() as u64
    }

    pub fn missing_count(&self) -> u64 {
        self.missing_remote.len() as u64
    }

    pub fn synced_count(&self) -> u64 {
        self.synced.len() as u64
    }
}

/// Aggregate outcome of orphan remediation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemediationSummary {
    pub processed: u64,
    pub errors: u64,
}

/// Aggregate outcome of missing-item import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportMissingSummary {
    pub processed: u64,
    pub imported: u64,
    pub updated: u64,
    pub errors: u64,
}

/// Local-vs-remote reconciliation.
pub struct ReconciliationEngine {
    repo: Arc<dyn ContentRepository>,
    client: Arc<QueryClient>,
    queue: Arc<ListingQueue>,
    processor: Arc<ItemProcessor>,
    history: Arc<dyn HistoryStore>,
    kv: Arc<dyn KvStore>,
    cache_ttl: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        client: Arc<QueryClient>,
        queue: Arc<ListingQueue>,
        processor: Arc<ItemProcessor>,
        history: Arc<dyn HistoryStore>,
        kv: Arc<dyn KvStore>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            repo,
            client,
            queue,
            processor,
            history,
            kv,
            cache_ttl: config.comparison_cache_ttl,
        }
    }

    /// Compare local and remote id sets. The result is cached with a short
    /// TTL for the status surface.
    pub async fn compare(&self) -> Result<ReconciliationResult> {
        info!("Starting local/remote reconciliation comparison");

        let local = self.repo.external_id_index().await?;
        let total = self.client.total_count().await?;
        let remote: BTreeSet<String> = self
            .queue
            .collect_remote_ids(total)
            .await?
            .into_iter()
            .collect();

        let mut orphaned_local = BTreeMap::new();
        let mut synced = BTreeSet::new();
        for (external_id, local_id) in &local {
            if remote.contains(external_id) {
                synced.insert(external_id.clone());
            } else {
                orphaned_local.insert(external_id.clone(), *local_id);
            }
        }

        let missing_remote: BTreeSet<String> = remote
            .iter()
            .filter(|id| !local.contains_key(*id))
            .cloned()
            .collect();

        let result = ReconciliationResult {
            local_count: local.len() as u64,
            remote_count: remote.len() as u64,
            orphaned_local,
            missing_remote,
            synced,
        };

        info!(
            local = result.local_count,
            remote = result.remote_count,
            orphaned = result.orphaned_count(),
            missing = result.missing_count(),
            synced = result.synced_count(),
            "Reconciliation comparison complete"
        );

        self.kv
            .set_json(COMPARISON_KEY, &result, Some(self.cache_ttl))
            .await?;

        Ok(result)
    }

    /// The last comparison, if its cache entry is still alive.
    pub async fn cached_comparison(&self) -> Result<Option<ReconciliationResult>> {
        Ok(self.kv.get_json(COMPARISON_KEY).await?)
    }

    /// Apply `policy` to each orphaned listing independently.
    pub async fn handle_orphaned(
        &self,
        external_ids: &[String],
        policy: OrphanPolicy,
    ) -> Result<RemediationSummary> {
        if external_ids.is_empty() || policy == OrphanPolicy::None {
            return Ok(RemediationSummary::default());
        }

        info!(
            count = external_ids.len(),
            policy = policy.as_str(),
            "Handling orphaned listings"
        );

        let mut summary = RemediationSummary::default();
        for external_id in external_ids {
            match self.apply_policy(external_id, policy).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        external_id = %external_id,
                        error = %e,
                        "Failed to remediate orphaned listing"
                    );
                }
            }
        }

        let removed = match policy {
            OrphanPolicy::Trash | OrphanPolicy::HardDelete => summary.processed,
            _ => 0,
        };
        self.history
            .add(
                OperationType::Reconciliation,
                if summary.errors == 0 {
                    HistoryStatus::Completed
                } else {
                    HistoryStatus::Failed
                },
                OperationCounters {
                    processed: summary.processed,
                    removed,
                    errors: summary.errors,
                    ..Default::default()
                },
                0,
                &format!(
                    "Handled {} orphaned listing(s) with policy {} ({} errors)",
                    summary.processed,
                    policy.as_str(),
                    summary.errors
                ),
            )
            .await?;

        Ok(summary)
    }

    async fn apply_policy(&self, external_id: &str, policy: OrphanPolicy) -> Result<()> {
        let local_id = self
            .repo
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                SyncError::Data(format!("no local record for external id {}", external_id))
            })?;

        match policy {
            OrphanPolicy::Trash => self.repo.set_status(local_id, ContentStatus::Trashed).await?,
            OrphanPolicy::Archive => {
                self.repo
                    .set_status(local_id, ContentStatus::Archived)
                    .await?
            }
            OrphanPolicy::Mark => {
                self.repo
                    .set_field(local_id, "orphaned-at", &chrono::Utc::now().to_rfc3339())
                    .await?
            }
            OrphanPolicy::HardDelete => self.repo.delete(local_id).await?,
            OrphanPolicy::None => {}
        }
        Ok(())
    }

    /// Import each missing listing through the item processor, isolating
    /// per-id failures.
    pub async fn import_missing(&self, external_ids: &[String]) -> Result<ImportMissingSummary> {
        if external_ids.is_empty() {
            return Ok(ImportMissingSummary::default());
        }

        info!(count = external_ids.len(), "Importing missing listings");

        let mut summary = ImportMissingSummary::default();
        for external_id in external_ids {
            match self.processor.process(external_id).await {
                Ok(outcome) => {
                    summary.processed += 1;
                    match outcome.action {
                        ProcessAction::Imported => summary.imported += 1,
                        ProcessAction::Updated => summary.updated += 1,
                    }
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        external_id = %external_id,
                        error = %e,
                        "Failed to import missing listing"
                    );
                }
            }
        }

        self.history
            .add(
                OperationType::Reconciliation,
                if summary.errors == 0 {
                    HistoryStatus::Completed
                } else {
                    HistoryStatus::Failed
                },
                OperationCounters {
                    processed: summary.processed,
                    imported: summary.imported,
                    updated: summary.updated,
                    errors: summary.errors,
                    ..Default::default()
                },
                0,
                &format!(
                    "Imported {} missing listing(s): {} imported, {} updated, {} errors",
                    summary.processed, summary.imported, summary.updated, summary.errors
                ),
            )
            .await?;

        Ok(summary)
    }
}
