//! Content store entity types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::StoreError;

/// Local identifier of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub i64);

impl LocalId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local identifier of a stored media object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub i64);

impl MediaId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publication status of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Published,
    Draft,
    Archived,
    Trashed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Archived => "archived",
            Self::Trashed => "trashed",
        }
    }
}

impl FromStr for ContentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(Self::Published),
            "draft" => Ok(Self::Draft),
            "archived" => Ok(Self::Archived),
            "trashed" => Ok(Self::Trashed),
            _ => Err(StoreError::Serialization(format!(
                "unknown content status: {}",
                s
            ))),
        }
    }
}

/// Input for creating a content record.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
}

/// A stored content record with its field map and gallery.
#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub id: LocalId,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
    pub fields: BTreeMap<String, String>,
    pub gallery: Vec<MediaId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One detected field change, as persisted in item logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub label: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// What happened to one processed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemAction {
    Imported,
    Updated,
    Error,
}

impl ItemAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Updated => "updated",
            Self::Error => "error",
        }
    }
}

impl FromStr for ItemAction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imported" => Ok(Self::Imported),
            "updated" => Ok(Self::Updated),
            "error" => Ok(Self::Error),
            _ => Err(StoreError::Serialization(format!(
                "unknown item action: {}",
                s
            ))),
        }
    }
}

/// Append-only per-item audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemLogRecord {
    pub id: i64,
    pub external_id: String,
    pub local_id: Option<LocalId>,
    pub action: ItemAction,
    pub changes: Vec<FieldChange>,
    pub message: String,
    pub created_at: i64,
}

/// Operation category for history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Import,
    Reconciliation,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Reconciliation => "reconciliation",
        }
    }
}

impl FromStr for OperationType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(Self::Import),
            "reconciliation" => Ok(Self::Reconciliation),
            _ => Err(StoreError::Serialization(format!(
                "unknown operation type: {}",
                s
            ))),
        }
    }
}

/// Terminal or running status recorded for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            _ => Err(StoreError::Serialization(format!(
                "unknown history status: {}",
                s
            ))),
        }
    }
}

/// Aggregate counters carried by a history record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounters {
    pub processed: u64,
    pub imported: u64,
    pub updated: u64,
    pub removed: u64,
    pub errors: u64,
}

/// Append-only per-operation audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub op_type: OperationType,
    pub status: HistoryStatus,
    pub counters: OperationCounters,
    pub duration_secs: u64,
    pub message: String,
    pub created_at: i64,
}
