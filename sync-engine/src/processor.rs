//! # Item Processor
//!
//! Processes exactly one listing: fetch the full record, map it, upsert it
//! into the content repository, detect changes against the stored
//! volatility fields, write an item log entry, and enqueue the media
//! pipeline. Find-before-create keeps the external id unique locally.
//!
//! Errors here are always scoped to the single item; the orchestrator
//! counts them and keeps the run going.

use bridge_traits::{CanonicalRecord, RecordMapper, VolatilityField};
use catalog_client::QueryClient;
use content_store::{
    ContentRepository, ContentStatus, FieldChange, ItemAction, ItemLogStore, LocalId, NewContent,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::media::MediaQueue;

/// What a successful `process` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAction {
    Imported,
    Updated,
}

impl ProcessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Updated => "updated",
        }
    }
}

/// Result of processing one listing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOutcome {
    pub action: ProcessAction,
    pub local_id: LocalId,
}

/// Fetch-map-upsert pipeline for a single listing.
pub struct ItemProcessor {
    client: Arc<QueryClient>,
    repo: Arc<dyn ContentRepository>,
    mapper: Arc<dyn RecordMapper>,
    item_logs: Arc<dyn ItemLogStore>,
    media: Arc<MediaQueue>,
}

impl ItemProcessor {
    pub fn new(
        client: Arc<QueryClient>,
        repo: Arc<dyn ContentRepository>,
        mapper: Arc<dyn RecordMapper>,
        item_logs: Arc<dyn ItemLogStore>,
        media: Arc<MediaQueue>,
    ) -> Self {
        Self {
            client,
            repo,
            mapper,
            item_logs,
            media,
        }
    }

    /// Process one listing by external id.
    pub async fn process(&self, external_id: &str) -> Result<ProcessOutcome> {
        debug!(external_id, "Fetching full listing");
        let raw = self.client.fetch_listing(external_id).await?;

        if let Some(actual) = raw.get("id").and_then(|v| v.as_str()) {
            if actual != external_id {
                warn!(
                    requested = external_id,
                    actual, "Listing id mismatch in API response"
                );
            }
        }

        let record = self
            .mapper
            .map(&raw)
            .map_err(|e| SyncError::Data(e.to_string()))?;

        match self.repo.find_by_external_id(external_id).await? {
            None => self.import_new(external_id, &record).await,
            Some(local_id) => self.update_existing(external_id, local_id, &record).await,
        }
    }

    async fn import_new(&self, external_id: &str, record: &CanonicalRecord) -> Result<ProcessOutcome> {
        let local_id = self
            .repo
            .create(&NewContent {
                // The requested id is the join key even when the remote
                // response reports a different one.
                external_id: external_id.to_string(),
                title: record.title.clone(),
                body: record.body.clone(),
                status: ContentStatus::Published,
            })
            .await?;

        self.apply_record(local_id, record).await?;
        self.media.enqueue(local_id, &record.media).await?;

        self.item_logs
            .add(
                external_id,
                Some(local_id),
                ItemAction::Imported,
                &[],
                "Listing imported",
            )
            .await?;

        info!(external_id, local_id = %local_id, "Imported listing");
        Ok(ProcessOutcome {
            action: ProcessAction::Imported,
            local_id,
        })
    }

    async fn update_existing(
        &self,
        external_id: &str,
        local_id: LocalId,
        record: &CanonicalRecord,
    ) -> Result<ProcessOutcome> {
        let previous = self.volatile_snapshot(local_id).await?;

        self.repo
            .update(local_id, &record.title, &record.body)
            .await?;
        self.apply_record(local_id, record).await?;

        let current = volatile_values(record, self.mapper.volatility_fields());
        let changes = detect_changes(&previous, &current, self.mapper.volatility_fields());
        let message = if changes.is_empty() {
            "No changes detected".to_string()
        } else {
            format!("{} field(s) changed", changes.len())
        };

        self.item_logs
            .add(
                external_id,
                Some(local_id),
                ItemAction::Updated,
                &changes,
                &message,
            )
            .await?;

        self.media.enqueue(local_id, &record.media).await?;

        info!(
            external_id,
            local_id = %local_id,
            changes = changes.len(),
            "Updated listing"
        );
        Ok(ProcessOutcome {
            action: ProcessAction::Updated,
            local_id,
        })
    }

    async fn apply_record(&self, local_id: LocalId, record: &CanonicalRecord) -> Result<()> {
        for (name, value) in &record.fields {
            self.repo.set_field(local_id, name, value).await?;
        }
        for assignment in &record.taxonomies {
            self.repo
                .set_taxonomy(local_id, &assignment.taxonomy, &assignment.term)
                .await?;
        }
        Ok(())
    }

    /// Snapshot the stored values of the volatility fields before an update.
    async fn volatile_snapshot(&self, local_id: LocalId) -> Result<BTreeMap<String, String>> {
        let stored = self
            .repo
            .get(local_id)
            .await?
            .ok_or_else(|| SyncError::Data(format!("listing {} vanished mid-update", local_id)))?;

        let mut snapshot = BTreeMap::new();
        for field in self.mapper.volatility_fields() {
            let value = if field.name == "title" {
                Some(stored.title.clone())
            } else {
                stored.fields.get(field.name).cloned()
            };
            if let Some(value) = value {
                snapshot.insert(field.name.to_string(), value);
            }
        }
        Ok(snapshot)
    }
}

/// Extract the volatility-field values from a freshly mapped record.
pub fn volatile_values(
    record: &CanonicalRecord,
    fields: &[VolatilityField],
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for field in fields {
        let value = if field.name == "title" {
            Some(record.title.clone())
        } else {
            record.fields.get(field.name).cloned()
        };
        if let Some(value) = value {
            values.insert(field.name.to_string(), value);
        }
    }
    values
}

/// Compare old and new volatility values into a change-set.
pub fn detect_changes(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
    fields: &[VolatilityField],
) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for field in fields {
        let old_value = old.get(field.name);
        let new_value = new.get(field.name);
        if old_value != new_value {
            changes.push(FieldChange {
                field: field.name.to_string(),
                label: field.label.to_string(),
                old: old_value.cloned(),
                new: new_value.cloned(),
            });
        }
    }
    changes
}
