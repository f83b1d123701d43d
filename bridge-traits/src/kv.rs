//! Durable Key-Value Storage Abstraction
//!
//! Backs all cross-tick synchronization state: the run state, the pending
//! listing queue, media queues, and progress snapshots. Values are plain
//! strings (typically JSON); entries may carry a time-to-live after which
//! they are treated as absent.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Durable key-value store trait
///
/// Implementations must persist entries across process restarts; the sync
/// engine assumes any tick can run in a fresh process and recover its state
/// through this interface alone.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value. Expired entries behave as if never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous entry under the same key.
    /// A `ttl` of `None` means the entry never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Remove an entry. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// JSON convenience layer over [`KvStore`].
#[async_trait]
pub trait KvStoreExt: KvStore {
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                BridgeError::Storage(format!("corrupt value under key {}: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| BridgeError::Storage(format!("failed to encode {}: {}", key, e)))?;
        self.set(key, &raw, ttl).await
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// In-memory store for tests and single-process development hosts.
///
/// Honors TTLs against the system clock; no persistence.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Option<i64>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.lock().expect("kv store lock poisoned");

        if let Some(entry) = entries.get(key) {
            if entry.expires_at.is_some_and(|at| at <= now) {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| chrono::Utc::now().timestamp() + d.as_secs() as i64);
        let mut entries = self.entries.lock().expect("kv store lock poisoned");
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("kv store lock poisoned");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryKvStore::new();

        store.set("alpha", "1", None).await.unwrap();
        assert_eq!(store.get("alpha").await.unwrap(), Some("1".to_string()));

        store.delete("alpha").await.unwrap();
        assert_eq!(store.get("alpha").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryKvStore::new();

        store.set("key", "old", None).await.unwrap();
        store.set("key", "new", None).await.unwrap();

        assert_eq!(store.get("key").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_behaves_as_absent() {
        let store = MemoryKvStore::new();

        store
            .set("ephemeral", "x", Some(Duration::from_secs(0)))
            .await
            .unwrap();

        assert_eq!(store.get("ephemeral").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryKvStore::new();

        let ids = vec!["a".to_string(), "b".to_string()];
        store.set_json("ids", &ids, None).await.unwrap();

        let loaded: Option<Vec<String>> = store.get_json("ids").await.unwrap();
        assert_eq!(loaded, Some(ids));

        let missing: Option<Vec<String>> = store.get_json("absent").await.unwrap();
        assert!(missing.is_none());
    }
}
