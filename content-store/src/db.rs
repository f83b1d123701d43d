//! # Database Connection Pool
//!
//! SQLite pool construction and schema bootstrap for the content store.
//! WAL mode is enabled for concurrent reads; all tables are created
//! idempotently so a fresh database is usable without a migration step.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::content::SqliteContentRepository;
use crate::error::Result;
use crate::history::SqliteHistoryStore;
use crate::item_log::SqliteItemLogStore;
use crate::kv::SqliteKvStore;

/// Create a connection pool for the given SQLite database URL
/// (e.g. `sqlite:lotsync.db`).
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create an in-memory pool for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    Ok(pool)
}

/// Create all content-store tables if they do not exist.
pub async fn initialize(pool: &SqlitePool) -> Result<()> {
    SqliteContentRepository::new(pool.clone()).initialize().await?;
    SqliteKvStore::new(pool.clone()).initialize().await?;
    SqliteHistoryStore::new(pool.clone()).initialize().await?;
    SqliteItemLogStore::new(pool.clone()).initialize().await?;

    info!("Content store schema initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        initialize(&pool).await.unwrap();
        initialize(&pool).await.unwrap();
    }
}
