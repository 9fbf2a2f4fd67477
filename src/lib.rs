//! scope-watch - Attack-surface scope monitor
//!
//! This crate periodically collects the in-scope assets of bug-bounty
//! programs, diffs them against the last stored snapshot, and publishes
//! the added and removed items to a notification channel that a consumer
//! delivers to a chat transport.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod otel;
pub mod snapshot;
pub mod sources;
pub mod store;
pub mod sync;
pub mod watcher;
