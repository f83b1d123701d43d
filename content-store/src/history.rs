//! # Operation History Store
//!
//! Append-only audit records, one per import run or reconciliation batch.
//! Queryable by status and operation type with limit/offset pagination,
//! newest first.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::Result;
use crate::models::{HistoryRecord, HistoryStatus, OperationCounters, OperationType};

/// Query parameters for listing history records.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<HistoryStatus>,
    pub op_type: Option<OperationType>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            status: None,
            op_type: None,
        }
    }
}

/// History record sink and query surface.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record; returns its id.
    async fn add(
        &self,
        op_type: OperationType,
        status: HistoryStatus,
        counters: OperationCounters,
        duration_secs: u64,
        message: &str,
    ) -> Result<i64>;

    async fn records(&self, query: HistoryQuery) -> Result<Vec<HistoryRecord>>;

    async fn count(&self, query: HistoryQuery) -> Result<u64>;

    /// Delete every record; returns the number removed.
    async fn clear_all(&self) -> Result<u64>;
}

/// SQLite implementation of [`HistoryStore`].
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                op_type TEXT NOT NULL,
                status TEXT NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0,
                imported INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                removed INTEGER NOT NULL DEFAULT 0,
                errors INTEGER NOT NULL DEFAULT 0,
                duration_secs INTEGER NOT NULL DEFAULT 0,
                message TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<HistoryRecord> {
        Ok(HistoryRecord {
            id: row.get("id"),
            op_type: row.get::<String, _>("op_type").parse()?,
            status: row.get::<String, _>("status").parse()?,
            counters: OperationCounters {
                processed: row.get::<i64, _>("processed") as u64,
                imported: row.get::<i64, _>("imported") as u64,
                updated: row.get::<i64, _>("updated") as u64,
                removed: row.get::<i64, _>("removed") as u64,
                errors: row.get::<i64, _>("errors") as u64,
            },
            duration_secs: row.get::<i64, _>("duration_secs") as u64,
            message: row.get("message"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn add(
        &self,
        op_type: OperationType,
        status: HistoryStatus,
        counters: OperationCounters,
        duration_secs: u64,
        message: &str,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO sync_history (
                op_type, status, processed, imported, updated, removed, errors,
                duration_secs, message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(op_type.as_str())
        .bind(status.as_str())
        .bind(counters.processed as i64)
        .bind(counters.imported as i64)
        .bind(counters.updated as i64)
        .bind(counters.removed as i64)
        .bind(counters.errors as i64)
        .bind(duration_secs as i64)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(
            op_type = op_type.as_str(),
            status = status.as_str(),
            "History record added"
        );
        Ok(result.last_insert_rowid())
    }

    async fn records(&self, query: HistoryQuery) -> Result<Vec<HistoryRecord>> {
        let status = query.status.map(|s| s.as_str().to_string());
        let op_type = query.op_type.map(|t| t.as_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT id, op_type, status, processed, imported, updated, removed, errors,
                   duration_secs, message, created_at
            FROM sync_history
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR op_type = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&status)
        .bind(&status)
        .bind(&op_type)
        .bind(&op_type)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count(&self, query: HistoryQuery) -> Result<u64> {
        let status = query.status.map(|s| s.as_str().to_string());
        let op_type = query.op_type.map(|t| t.as_str().to_string());

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sync_history
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR op_type = ?)
            "#,
        )
        .bind(&status)
        .bind(&status)
        .bind(&op_type)
        .bind(&op_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_history")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
