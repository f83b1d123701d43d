//! # Media Queue and Worker
//!
//! Per-item ordered image pipeline, independent of the main listing queue.
//! `MediaQueue::enqueue` selects exactly one URL per candidate image by
//! format preference, persists the queue with a zeroed status, and schedules
//! the first worker tick. Each worker tick handles one image and schedules
//! its own continuation; when the queue drains, the attached ids become the
//! owner's gallery and the transient keys are deleted.
//!
//! De-duplication is by exact URL: an image already stored under the same
//! URL is relinked to the owner without a fetch. Re-enqueueing an owner
//! overwrites any previous queue, so repeated updates are safe.

use bridge_traits::{
    HttpClient, HttpMethod, HttpRequest, KvStore, KvStoreExt, MediaCandidate, ScheduledJob,
    Scheduler,
};
use content_store::{ContentRepository, LocalId, MediaId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// Job name prefix for media worker ticks; the owner id is the suffix and
/// the single argument.
pub const MEDIA_JOB_PREFIX: &str = "media.worker";

/// Scheduler job name for one owner's media queue.
pub fn job_name(owner: LocalId) -> String {
    format!("{}:{}", MEDIA_JOB_PREFIX, owner)
}

fn queue_key(owner: LocalId) -> String {
    format!("sync:media:queue:{}", owner)
}

fn status_key(owner: LocalId) -> String {
    format!("sync:media:status:{}", owner)
}

/// One queued image: the selected URL and its position in the gallery.
/// Ordinal 0 becomes the owner's cover image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaQueueEntry {
    pub url: String,
    pub ordinal: usize,
}

/// Mutable per-owner processing status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaQueueStatus {
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    /// Attached media ids in processing order; becomes the gallery.
    pub attached: Vec<MediaId>,
}

/// Pick the single URL to fetch for one candidate image, by descending
/// format and resolution preference.
pub fn select_best_url(candidate: &MediaCandidate) -> Option<&str> {
    candidate
        .webp
        .size_1280x960
        .as_deref()
        .or(candidate.jpg.size_1280x960.as_deref())
        .or(candidate.webp.size_800x600.as_deref())
        .or(candidate.jpg.size_800x600.as_deref())
        .or(candidate.webp.size_640x480.as_deref())
        .or(candidate.jpg.size_640x480.as_deref())
}

/// Enqueues media candidates for asynchronous processing.
pub struct MediaQueue {
    kv: Arc<dyn KvStore>,
    scheduler: Arc<dyn Scheduler>,
    tick_delay: Duration,
}

impl MediaQueue {
    pub fn new(kv: Arc<dyn KvStore>, scheduler: Arc<dyn Scheduler>, config: &SyncConfig) -> Self {
        Self {
            kv,
            scheduler,
            tick_delay: config.media_tick_delay,
        }
    }

    /// Queue the owner's images and schedule the first worker tick.
    ///
    /// Candidates without any usable URL are skipped. Returns the number of
    /// entries queued; zero leaves any existing queue untouched.
    pub async fn enqueue(&self, owner: LocalId, candidates: &[MediaCandidate]) -> Result<usize> {
        let entries: Vec<MediaQueueEntry> = candidates
            .iter()
            .enumerate()
            .filter_map(|(ordinal, candidate)| {
                select_best_url(candidate).map(|url| MediaQueueEntry {
                    url: url.to_string(),
                    ordinal,
                })
            })
            .collect();

        if entries.is_empty() {
            debug!(owner = %owner, "No usable image urls to queue");
            return Ok(0);
        }

        let status = MediaQueueStatus {
            total: entries.len() as u64,
            ..Default::default()
        };

        self.kv.set_json(&queue_key(owner), &entries, None).await?;
        self.kv.set_json(&status_key(owner), &status, None).await?;

        self.scheduler
            .schedule_once(
                ScheduledJob::with_args(job_name(owner), vec![owner.to_string()]),
                self.tick_delay,
            )
            .await?;

        info!(owner = %owner, count = entries.len(), "Queued media for processing");
        Ok(entries.len())
    }

    /// Current status for an owner, if a queue is in flight.
    pub async fn status(&self, owner: LocalId) -> Result<Option<MediaQueueStatus>> {
        Ok(self.kv.get_json(&status_key(owner)).await?)
    }
}

/// Outcome of one worker tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaTickOutcome {
    /// No queue exists for the owner.
    Idle,
    /// One entry handled; more remain and the next tick is scheduled.
    Processed { remaining: usize },
    /// Queue drained; gallery written and transient keys deleted.
    Finalized { attached: usize, failed: u64 },
}

/// Processes one queued image per tick.
pub struct MediaWorker {
    kv: Arc<dyn KvStore>,
    http: Arc<dyn HttpClient>,
    repo: Arc<dyn ContentRepository>,
    scheduler: Arc<dyn Scheduler>,
    tick_delay: Duration,
    fetch_timeout: Duration,
}

impl MediaWorker {
    pub fn new(
        kv: Arc<dyn KvStore>,
        http: Arc<dyn HttpClient>,
        repo: Arc<dyn ContentRepository>,
        scheduler: Arc<dyn Scheduler>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            kv,
            http,
            repo,
            scheduler,
            tick_delay: config.media_tick_delay,
            fetch_timeout: config.media_fetch_timeout,
        }
    }

    /// Handle one image for the owner, then either schedule the next tick
    /// or finalize the queue.
    pub async fn tick(&self, owner: LocalId) -> Result<MediaTickOutcome> {
        let Some(mut entries) = self
            .kv
            .get_json::<Vec<MediaQueueEntry>>(&queue_key(owner))
            .await?
        else {
            debug!(owner = %owner, "No media queue for owner");
            return Ok(MediaTickOutcome::Idle);
        };

        let mut status: MediaQueueStatus = self
            .kv
            .get_json(&status_key(owner))
            .await?
            .unwrap_or_default();

        if entries.is_empty() {
            return self.finalize(owner, status).await;
        }

        let entry = entries.remove(0);
        self.kv.set_json(&queue_key(owner), &entries, None).await?;

        match self.attach(owner, &entry).await {
            Ok(media_id) => {
                if entry.ordinal == 0 {
                    self.repo.set_primary_media(owner, media_id).await?;
                }
                status.processed += 1;
                status.attached.push(media_id);
                debug!(
                    owner = %owner,
                    processed = status.processed,
                    total = status.total,
                    "Attached media"
                );
            }
            Err(e) => {
                status.failed += 1;
                error!(owner = %owner, url = %entry.url, error = %e, "Failed to attach media");
            }
        }

        if entries.is_empty() {
            self.finalize(owner, status).await
        } else {
            self.kv.set_json(&status_key(owner), &status, None).await?;
            self.scheduler
                .schedule_once(
                    ScheduledJob::with_args(job_name(owner), vec![owner.to_string()]),
                    self.tick_delay,
                )
                .await?;
            Ok(MediaTickOutcome::Processed {
                remaining: entries.len(),
            })
        }
    }

    async fn attach(&self, owner: LocalId, entry: &MediaQueueEntry) -> Result<MediaId> {
        if let Some(existing) = self.repo.find_media_by_url(&entry.url).await? {
            self.repo.relink_media(existing, owner).await?;
            debug!(owner = %owner, media = %existing, "Relinked existing media");
            return Ok(existing);
        }

        let request = HttpRequest::new(HttpMethod::Get, &entry.url).timeout(self.fetch_timeout);
        let response = self.http.execute(request).await?;

        if !response.is_success() {
            return Err(SyncError::Data(format!(
                "image fetch returned HTTP {}",
                response.status
            )));
        }

        let file_name = entry
            .url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("image");

        let media_id = self
            .repo
            .store_media(owner, &entry.url, file_name, &response.body)
            .await?;
        Ok(media_id)
    }

    async fn finalize(&self, owner: LocalId, status: MediaQueueStatus) -> Result<MediaTickOutcome> {
        if !status.attached.is_empty() {
            self.repo.set_gallery(owner, &status.attached).await?;
        }

        self.kv.delete(&queue_key(owner)).await?;
        self.kv.delete(&status_key(owner)).await?;

        info!(
            owner = %owner,
            processed = status.processed,
            failed = status.failed,
            "Media processing complete"
        );

        Ok(MediaTickOutcome::Finalized {
            attached: status.attached.len(),
            failed: status.failed,
        })
    }
}
