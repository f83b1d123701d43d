//! # Content Repository
//!
//! Persistence for synchronized listings: the record itself, its flat field
//! map, taxonomy assignments, and attached media objects. The external id
//! is the join key against the remote catalog; `find_by_external_id`
//! returns the first match so the find-before-create upsert in the item
//! processor can guarantee at most one local record per external id.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::{ContentRecord, ContentStatus, LocalId, MediaId, NewContent};

/// Abstract content repository consumed by the sync engine.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Find the local record for an external id. First match wins when
    /// duplicates exist.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LocalId>>;

    /// Load a full record including fields and gallery.
    async fn get(&self, id: LocalId) -> Result<Option<ContentRecord>>;

    async fn create(&self, new: &NewContent) -> Result<LocalId>;

    async fn update(&self, id: LocalId, title: &str, body: &str) -> Result<()>;

    async fn set_field(&self, id: LocalId, name: &str, value: &str) -> Result<()>;

    async fn set_taxonomy(&self, id: LocalId, taxonomy: &str, term: &str) -> Result<()>;

    async fn set_status(&self, id: LocalId, status: ContentStatus) -> Result<()>;

    /// Hard-delete a record with its fields, taxonomies, and media links.
    async fn delete(&self, id: LocalId) -> Result<()>;

    async fn count_published(&self) -> Result<u64>;

    /// Map of external id → local id for every published record with a
    /// non-empty external id. Exactly one entry per local record.
    async fn external_id_index(&self) -> Result<BTreeMap<String, LocalId>>;

    // Media operations

    /// Look up a media object by exact source URL.
    async fn find_media_by_url(&self, url: &str) -> Result<Option<MediaId>>;

    /// Store a fetched media object and attach it to its owner.
    async fn store_media(
        &self,
        owner: LocalId,
        url: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<MediaId>;

    /// Re-attach an existing media object to a (possibly different) owner.
    async fn relink_media(&self, media: MediaId, owner: LocalId) -> Result<()>;

    /// Mark one media object as the owner's cover image.
    async fn set_primary_media(&self, owner: LocalId, media: MediaId) -> Result<()>;

    /// Replace the owner's ordered gallery.
    async fn set_gallery(&self, owner: LocalId, media: &[MediaId]) -> Result<()>;
}

/// SQLite implementation of [`ContentRepository`].
pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                gallery TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_listings_external_id ON listings(external_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listing_fields (
                listing_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (listing_id, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listing_taxonomies (
                listing_id INTEGER NOT NULL,
                taxonomy TEXT NOT NULL,
                term TEXT NOT NULL,
                PRIMARY KEY (listing_id, taxonomy)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER,
                url TEXT NOT NULL,
                file_name TEXT NOT NULL,
                content BLOB,
                is_primary INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_url ON media(url)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn decode_gallery(raw: Option<String>) -> Result<Vec<MediaId>> {
        match raw {
            Some(json) if !json.is_empty() => {
                let ids: Vec<i64> = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(format!("corrupt gallery: {}", e)))?;
                Ok(ids.into_iter().map(MediaId).collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LocalId>> {
        let row = sqlx::query(
            "SELECT id FROM listings WHERE external_id = ? ORDER BY id ASC LIMIT 1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LocalId(r.get("id"))))
    }

    async fn get(&self, id: LocalId) -> Result<Option<ContentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, title, body, status, gallery, created_at, updated_at
            FROM listings WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let field_rows = sqlx::query("SELECT name, value FROM listing_fields WHERE listing_id = ?")
            .bind(id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        let mut fields = BTreeMap::new();
        for field in field_rows {
            fields.insert(field.get::<String, _>("name"), field.get::<String, _>("value"));
        }

        Ok(Some(ContentRecord {
            id,
            external_id: row.get("external_id"),
            title: row.get("title"),
            body: row.get("body"),
            status: row.get::<String, _>("status").parse()?,
            fields,
            gallery: Self::decode_gallery(row.get("gallery"))?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn create(&self, new: &NewContent) -> Result<LocalId> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO listings (external_id, title, body, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.external_id)
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = LocalId(result.last_insert_rowid());
        debug!(local_id = %id, external_id = %new.external_id, "Created content record");
        Ok(id)
    }

    async fn update(&self, id: LocalId, title: &str, body: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE listings SET title = ?, body = ?, updated_at = ? WHERE id = ?",
        )
        .bind(title)
        .bind(body)
        .bind(now)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                what: format!("listing {}", id),
            });
        }
        Ok(())
    }

    async fn set_field(&self, id: LocalId, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listing_fields (listing_id, name, value) VALUES (?, ?, ?)
            ON CONFLICT (listing_id, name) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(id.as_i64())
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_taxonomy(&self, id: LocalId, taxonomy: &str, term: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listing_taxonomies (listing_id, taxonomy, term) VALUES (?, ?, ?)
            ON CONFLICT (listing_id, taxonomy) DO UPDATE SET term = excluded.term
            "#,
        )
        .bind(id.as_i64())
        .bind(taxonomy)
        .bind(term)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, id: LocalId, status: ContentStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE listings SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                what: format!("listing {}", id),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: LocalId) -> Result<()> {
        sqlx::query("DELETE FROM listing_fields WHERE listing_id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM listing_taxonomies WHERE listing_id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM media WHERE owner_id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        debug!(local_id = %id, "Deleted content record");
        Ok(())
    }

    async fn count_published(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE status = 'published'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn external_id_index(&self) -> Result<BTreeMap<String, LocalId>> {
        let rows = sqlx::query(
            r#"
            SELECT id, external_id FROM listings
            WHERE status = 'published' AND external_id != ''
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut index = BTreeMap::new();
        for row in rows {
            // First record wins for a duplicated external id.
            index
                .entry(row.get::<String, _>("external_id"))
                .or_insert(LocalId(row.get("id")));
        }
        Ok(index)
    }

    async fn find_media_by_url(&self, url: &str) -> Result<Option<MediaId>> {
        let row = sqlx::query("SELECT id FROM media WHERE url = ? ORDER BY id ASC LIMIT 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| MediaId(r.get("id"))))
    }

    async fn store_media(
        &self,
        owner: LocalId,
        url: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<MediaId> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO media (owner_id, url, file_name, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner.as_i64())
        .bind(url)
        .bind(file_name)
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(MediaId(result.last_insert_rowid()))
    }

    async fn relink_media(&self, media: MediaId, owner: LocalId) -> Result<()> {
        let result = sqlx::query("UPDATE media SET owner_id = ? WHERE id = ?")
            .bind(owner.as_i64())
            .bind(media.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                what: format!("media {}", media),
            });
        }
        Ok(())
    }

    async fn set_primary_media(&self, owner: LocalId, media: MediaId) -> Result<()> {
        sqlx::query("UPDATE media SET is_primary = 0 WHERE owner_id = ?")
            .bind(owner.as_i64())
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE media SET is_primary = 1 WHERE id = ?")
            .bind(media.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_gallery(&self, owner: LocalId, media: &[MediaId]) -> Result<()> {
        let ids: Vec<i64> = media.iter().map(MediaId::as_i64).collect();
        let json = serde_json::to_string(&ids)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query("UPDATE listings SET gallery = ? WHERE id = ?")
            .bind(json)
            .bind(owner.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                what: format!("listing {}", owner),
            });
        }
        Ok(())
    }
}
