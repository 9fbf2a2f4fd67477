//! In-memory snapshot store
//!
//! Keeps encoded payloads in a map with per-key expiry, so it behaves like
//! the Redis store: values go through the same JSON encoding and expire
//! on the tokio clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::models::Snapshot;

use super::traits::{decode_snapshot, encode_snapshot, SnapshotStore};

#[derive(Debug, Clone)]
struct StoredValue {
    payload: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Snapshot store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw payload under `key` without expiry
    pub async fn put_raw(&self, key: &str, payload: impl Into<String>) {
        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                payload: payload.into(),
                expires_at: None,
            },
        );
    }

    /// Raw payload under `key`, if present and not expired
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|value| !value.is_expired())
            .map(|value| value.payload.clone())
    }

    /// Remaining time to live for `key`
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .and_then(|value| value.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<Snapshot>, StoreError> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            Some(value) if value.is_expired() => {
                debug!(key = key, "Snapshot expired");
                entries.remove(key);
                Ok(None)
            }
            Some(value) => decode_snapshot(key, &value.payload).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, snapshot: &Snapshot, ttl: Duration) -> Result<(), StoreError> {
        let payload = encode_snapshot(snapshot)?;
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);

        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                payload,
                expires_at,
            },
        );
        debug!(key = key, items = snapshot.len(), "Snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn snapshot(items: &[&str]) -> Snapshot {
        Snapshot::new("k", items.iter().map(|s| s.to_string()).collect())
    }

    // Test 1: Store name
    #[test]
    fn test_store_name() {
        assert_eq!(MemorySnapshotStore::new().name(), "memory");
    }

    // Test 2: Load on an unset key is NotFound
    #[tokio::test]
    async fn test_load_missing_key() {
        let store = MemorySnapshotStore::new();
        assert_eq!(store.load("missing").await.unwrap(), None);
    }

    // Test 3: Saved items load back as the same set
    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemorySnapshotStore::new();
        let saved = snapshot(&["a.com", "b.com", "c.com"]);

        store.save("k", &saved, Duration::ZERO).await.unwrap();
        let loaded = store.load("k").await.unwrap().unwrap();

        let expected: HashSet<&str> = saved.item_set();
        assert_eq!(loaded.item_set(), expected);
        assert_eq!(store.get_raw("k").await.unwrap(), r#"["a.com","b.com","c.com"]"#);
    }

    // Test 4: Save overwrites the previous value
    #[tokio::test]
    async fn test_save_overwrites() {
        let store = MemorySnapshotStore::new();
        store
            .save("k", &snapshot(&["a.com"]), Duration::ZERO)
            .await
            .unwrap();
        store
            .save("k", &snapshot(&["b.com"]), Duration::ZERO)
            .await
            .unwrap();

        let loaded = store.load("k").await.unwrap().unwrap();
        assert_eq!(loaded.items(), &["b.com".to_string()][..]);
    }

    // Test 5: Entries expire after their TTL
    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiration() {
        let store = MemorySnapshotStore::new();
        store
            .save("k", &snapshot(&["a.com"]), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(store.load("k").await.unwrap().is_some());
        assert_eq!(store.ttl("k").await, Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.load("k").await.unwrap().is_none());
    }

    // Test 6: Saving refreshes the TTL
    #[tokio::test(start_paused = true)]
    async fn test_save_refreshes_ttl() {
        let store = MemorySnapshotStore::new();
        let ttl = Duration::from_secs(60);
        store.save("k", &snapshot(&["a.com"]), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        store.save("k", &snapshot(&["a.com"]), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(store.load("k").await.unwrap().is_some());
    }

    // Test 7: Corrupt payload is an error, not NotFound
    #[tokio::test]
    async fn test_corrupt_payload() {
        let store = MemorySnapshotStore::new();
        store.put_raw("k", r#"{"not": "an array"}"#).await;

        assert!(matches!(
            store.load("k").await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
