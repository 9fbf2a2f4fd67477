//! Snapshot persistence
//!
//! - [`RedisSnapshotStore`]: production backend on Redis
//! - [`MemorySnapshotStore`]: in-process backend with the same semantics

pub mod memory;
pub mod redis;
pub mod traits;

pub use memory::MemorySnapshotStore;
pub use self::redis::RedisSnapshotStore;
pub use traits::{decode_snapshot, encode_snapshot, SnapshotStore};

#[cfg(test)]
pub use traits::MockSnapshotStore;
