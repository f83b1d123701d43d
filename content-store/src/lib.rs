//! # Content Store
//!
//! Local persistence for the sync engine, backed by SQLite through sqlx.
//!
//! ## Components
//!
//! - **Content repository** (`content`): synchronized listings with their
//!   field maps, taxonomy assignments, media objects, and gallery ordering
//! - **Key-value store** (`kv`): the durable `KvStore` implementation that
//!   holds all cross-tick sync state (run state, queues, progress)
//! - **History store** (`history`): append-only per-operation audit records
//! - **Item log store** (`item_log`): append-only per-item audit records
//!   with detected field changes
//!
//! Every store exposes a trait so the sync engine can run against in-memory
//! fakes in tests; the SQLite implementations here are the production path.

pub mod content;
pub mod db;
pub mod error;
pub mod history;
pub mod item_log;
pub mod kv;
pub mod models;

pub use content::{ContentRepository, SqliteContentRepository};
pub use db::{create_pool, create_test_pool, initialize};
pub use error::{Result, StoreError};
pub use history::{HistoryQuery, HistoryStore, SqliteHistoryStore};
pub use item_log::{ItemLogQuery, ItemLogStore, SqliteItemLogStore};
pub use kv::SqliteKvStore;
pub use models::{
    ContentRecord, ContentStatus, FieldChange, HistoryRecord, HistoryStatus, ItemAction,
    ItemLogRecord, LocalId, MediaId, NewContent, OperationCounters, OperationType,
};
