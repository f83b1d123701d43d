//! # Item Log Store
//!
//! Append-only per-item audit entries: one per processed listing, carrying
//! the action taken and the detected field changes.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::{Result, StoreError};
use crate::models::{FieldChange, ItemAction, ItemLogRecord, LocalId};

/// Query parameters for listing item logs.
#[derive(Debug, Clone)]
pub struct ItemLogQuery {
    pub limit: u32,
    pub offset: u32,
    pub action: Option<ItemAction>,
    pub external_id: Option<String>,
}

impl Default for ItemLogQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            action: None,
            external_id: None,
        }
    }
}

/// Item log sink and query surface.
#[async_trait]
pub trait ItemLogStore: Send + Sync {
    async fn add(
        &self,
        external_id: &str,
        local_id: Option<LocalId>,
        action: ItemAction,
        changes: &[FieldChange],
        message: &str,
    ) -> Result<i64>;

    async fn records(&self, query: ItemLogQuery) -> Result<Vec<ItemLogRecord>>;

    async fn clear_all(&self) -> Result<u64>;
}

/// SQLite implementation of [`ItemLogStore`].
pub struct SqliteItemLogStore {
    pool: SqlitePool,
}

impl SqliteItemLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS item_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL,
                local_id INTEGER,
                action TEXT NOT NULL,
                changes TEXT,
                message TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_item_logs_external_id ON item_logs(external_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ItemLogStore for SqliteItemLogStore {
    async fn add(
        &self,
        external_id: &str,
        local_id: Option<LocalId>,
        action: ItemAction,
        changes: &[FieldChange],
        message: &str,
    ) -> Result<i64> {
        let changes_json = if changes.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(changes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            )
        };

        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO item_logs (external_id, local_id, action, changes, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(external_id)
        .bind(local_id.map(|id| id.as_i64()))
        .bind(action.as_str())
        .bind(changes_json)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn records(&self, query: ItemLogQuery) -> Result<Vec<ItemLogRecord>> {
        let action = query.action.map(|a| a.as_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT id, external_id, local_id, action, changes, message, created_at
            FROM item_logs
            WHERE (? IS NULL OR action = ?)
              AND (? IS NULL OR external_id = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&action)
        .bind(&action)
        .bind(&query.external_id)
        .bind(&query.external_id)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let changes = match row.get::<Option<String>, _>("changes") {
                Some(json) => serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(format!("corrupt changes: {}", e)))?,
                None => Vec::new(),
            };

            records.push(ItemLogRecord {
                id: row.get("id"),
                external_id: row.get("external_id"),
                local_id: row.get::<Option<i64>, _>("local_id").map(LocalId),
                action: row.get::<String, _>("action").parse()?,
                changes,
                message: row.get("message"),
                created_at: row.get("created_at"),
            });
        }

        Ok(records)
    }

    async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM item_logs")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn store() -> SqliteItemLogStore {
        let pool = create_test_pool().await.unwrap();
        let store = SqliteItemLogStore::new(pool);
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_and_query_with_changes() {
        let store = store().await;

        let changes = vec![FieldChange {
            field: "price".to_string(),
            label: "Price".to_string(),
            old: Some("27900".to_string()),
            new: Some("26900".to_string()),
        }];

        store
            .add(
                "guid-1",
                Some(LocalId(7)),
                ItemAction::Updated,
                &changes,
                "1 field(s) changed",
            )
            .await
            .unwrap();

        let records = store.records(ItemLogQuery::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, ItemAction::Updated);
        assert_eq!(records[0].local_id, Some(LocalId(7)));
        assert_eq!(records[0].changes, changes);
    }

    #[tokio::test]
    async fn test_filter_by_action_and_external_id() {
        let store = store().await;

        store
            .add("guid-1", Some(LocalId(1)), ItemAction::Imported, &[], "ok")
            .await
            .unwrap();
        store
            .add("guid-2", None, ItemAction::Error, &[], "fetch failed")
            .await
            .unwrap();

        let errors = store
            .records(ItemLogQuery {
                action: Some(ItemAction::Error),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].external_id, "guid-2");

        let by_id = store
            .records(ItemLogQuery {
                external_id: Some("guid-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert!(by_id[0].changes.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = store().await;

        store
            .add("guid-1", None, ItemAction::Imported, &[], "")
            .await
            .unwrap();
        assert_eq!(store.clear_all().await.unwrap(), 1);
        assert!(store
            .records(ItemLogQuery::default())
            .await
            .unwrap()
            .is_empty());
    }
}
