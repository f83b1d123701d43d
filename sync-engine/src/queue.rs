//! # Listing Queue + ID Collection
//!
//! Durable FIFO queue of pending listing ids, populated by paging through
//! the catalog's lightweight id query and persisted in the KV store under a
//! 24-hour TTL. `pop_front` is destructive: the shortened list is written
//! back before the popped item is returned to the caller.
//!
//! A page that still fails after the query client's own retry budget fails
//! the whole collection with the page number in the error; an import that
//! silently under-collects is worse than one that fails loudly.

use bridge_traits::{KvStore, KvStoreExt};
use catalog_client::QueryClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

const QUEUE_KEY: &str = "sync:queue:ids";
const META_KEY: &str = "sync:queue:meta";
const PROCESSED_KEY: &str = "sync:queue:processed";

/// One pending listing, immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub external_id: String,
    /// Remote change timestamp from the collection pass, when available.
    pub changed_hint: Option<String>,
}

/// Collection metadata stored alongside the queue, same TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMeta {
    pub total: u64,
    pub collected_at: i64,
}

/// Progress view over the queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueProgress {
    pub total: u64,
    pub processed: u64,
    pub remaining: u64,
    pub percent: f64,
    pub collected_at: Option<i64>,
}

/// Durable FIFO queue of pending listing identifiers.
pub struct ListingQueue {
    kv: Arc<dyn KvStore>,
    client: Arc<QueryClient>,
    page_size: u32,
    ttl: Duration,
}

impl ListingQueue {
    pub fn new(kv: Arc<dyn KvStore>, client: Arc<QueryClient>, config: &SyncConfig) -> Self {
        Self {
            kv,
            client,
            page_size: config.page_size,
            ttl: config.queue_ttl,
        }
    }

    /// Collect all listing ids into a fresh queue.
    ///
    /// `expected_total` comes from the counting phase and determines the
    /// page count. Returns the number of ids collected.
    pub async fn collect_all(&self, expected_total: u64) -> Result<u64> {
        let items = self.fetch_all_pages(expected_total).await?;

        if items.is_empty() {
            return Err(SyncError::Collection(
                "no listing ids were collected".to_string(),
            ));
        }

        let meta = QueueMeta {
            total: items.len() as u64,
            collected_at: chrono::Utc::now().timestamp(),
        };

        self.kv.set_json(QUEUE_KEY, &items, Some(self.ttl)).await?;
        self.kv.set_json(META_KEY, &meta, Some(self.ttl)).await?;
        self.kv.delete(PROCESSED_KEY).await?;

        info!(collected = meta.total, "Listing id collection complete");
        Ok(meta.total)
    }

    /// Collect the current remote id set without touching the queue.
    ///
    /// Reconciliation reuses the collection mechanism through this method so
    /// a comparison can run while a stopped run still holds queued items.
    pub async fn collect_remote_ids(&self, expected_total: u64) -> Result<Vec<String>> {
        let items = self.fetch_all_pages(expected_total).await?;
        Ok(items.into_iter().map(|item| item.external_id).collect())
    }

    async fn fetch_all_pages(&self, expected_total: u64) -> Result<Vec<QueueItem>> {
        let pages = expected_total.div_ceil(self.page_size as u64).max(1) as u32;
        let mut items = Vec::with_capacity(expected_total as usize);

        info!(
            expected_total,
            pages, "Collecting listing ids from the catalog"
        );

        for page in 1..=pages {
            debug!(page, pages, "Fetching id page");

            let listings_page = self
                .client
                .fetch_id_page(page, self.page_size)
                .await
                .map_err(|e| {
                    SyncError::Collection(format!(
                        "page {} of {} failed after retries: {}",
                        page, pages, e
                    ))
                })?;

            if listings_page.listings.is_empty() {
                warn!(page, "Id page returned no listings");
                continue;
            }

            for summary in &listings_page.listings {
                if summary.id.is_empty() {
                    continue;
                }
                items.push(QueueItem {
                    external_id: summary.id.clone(),
                    changed_hint: summary.changed_hint(),
                });
            }

            debug!(
                page,
                collected = items.len(),
                "Collected ids from page"
            );
        }

        Ok(items)
    }

    /// Remove and return the head of the queue.
    pub async fn pop_front(&self) -> Result<Option<QueueItem>> {
        let Some(mut items) = self.kv.get_json::<Vec<QueueItem>>(QUEUE_KEY).await? else {
            return Ok(None);
        };

        if items.is_empty() {
            return Ok(None);
        }

        let head = items.remove(0);
        self.kv.set_json(QUEUE_KEY, &items, Some(self.ttl)).await?;
        Ok(Some(head))
    }

    /// Track an id as processed so queue progress stays observable.
    pub async fn mark_processed(&self, external_id: &str) -> Result<()> {
        let mut processed: Vec<String> =
            self.kv.get_json(PROCESSED_KEY).await?.unwrap_or_default();

        if !processed.iter().any(|id| id == external_id) {
            processed.push(external_id.to_string());
            self.kv
                .set_json(PROCESSED_KEY, &processed, Some(self.ttl))
                .await?;
        }
        Ok(())
    }

    pub async fn size(&self) -> Result<u64> {
        let items: Vec<QueueItem> = self.kv.get_json(QUEUE_KEY).await?.unwrap_or_default();
        Ok(items.len() as u64)
    }

    pub async fn has_items(&self) -> Result<bool> {
        Ok(self.size().await? > 0)
    }

    /// Drop the queue, its metadata, and the processed-id set.
    pub async fn reset(&self) -> Result<()> {
        self.kv.delete(QUEUE_KEY).await?;
        self.kv.delete(META_KEY).await?;
        self.kv.delete(PROCESSED_KEY).await?;
        info!("Listing queue reset");
        Ok(())
    }

    pub async fn progress(&self) -> Result<QueueProgress> {
        let meta: Option<QueueMeta> = self.kv.get_json(META_KEY).await?;
        let remaining = self.size().await?;
        let processed: Vec<String> = self.kv.get_json(PROCESSED_KEY).await?.unwrap_or_default();

        let total = meta.as_ref().map(|m| m.total).unwrap_or(0);
        let processed = processed.len() as u64;

        Ok(QueueProgress {
            total,
            processed,
            remaining,
            percent: if total > 0 {
                (processed as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            collected_at: meta.map(|m| m.collected_at),
        })
    }
}
