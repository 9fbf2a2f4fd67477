//! Snapshot store trait and wire format
//!
//! A stored snapshot is a bare JSON array of strings under its key. The
//! timestamp of a loaded snapshot is the load time, since the payload
//! carries none.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;
use crate::models::Snapshot;

/// Trait for snapshot persistence backends
///
/// Implementations must ensure:
/// - A missing key is `Ok(None)`, never an error
/// - A payload that is not a JSON array of strings is [`StoreError::Corrupt`]
/// - `save` overwrites in a single write and refreshes the TTL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Get the store name (e.g. "redis", "memory")
    fn name(&self) -> &str;

    /// Load the snapshot stored under `key`
    async fn load(&self, key: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Store `snapshot` under `key`, expiring after `ttl`
    ///
    /// A zero `ttl` stores the snapshot without expiry.
    async fn save(&self, key: &str, snapshot: &Snapshot, ttl: Duration) -> Result<(), StoreError>;
}

/// Encode a snapshot's items as a JSON array
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, StoreError> {
    serde_json::to_string(snapshot.items()).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a JSON array payload into a snapshot
pub fn decode_snapshot(key: &str, payload: &str) -> Result<Snapshot, StoreError> {
    let items: Vec<String> = serde_json::from_str(payload).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Snapshot::new(key, items))
}
