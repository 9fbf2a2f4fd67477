//! Snapshot and change-set models
//!
//! A [`Snapshot`] is the deduplicated set of items observed under one key at
//! one point in time. A [`ChangeSet`] is the delta between two snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::snapshot::dedupe;

/// Deduplicated item collection observed under a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSnapshot")]
pub struct Snapshot {
    /// Namespaced store key (e.g. `hackerone:previous_urls`)
    pub key: String,
    /// Unique items in first-seen order
    items: Vec<String>,
    /// When this snapshot was materialized
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from a raw item sequence, dropping duplicates
    pub fn new(key: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            key: key.into(),
            items: dedupe(items),
            created_at: Utc::now(),
        }
    }

    /// An empty snapshot
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, Vec::new())
    }

    /// Items in first-seen order
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Consume the snapshot, returning its items
    pub fn into_items(self) -> Vec<String> {
        self.items
    }

    /// Membership view of the items
    pub fn item_set(&self) -> HashSet<&str> {
        self.items.iter().map(String::as_str).collect()
    }

    /// Whether the snapshot holds the item
    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }

    /// Number of unique items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Wire form of a snapshot; items are deduplicated on conversion
#[derive(Deserialize)]
struct RawSnapshot {
    key: String,
    items: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<RawSnapshot> for Snapshot {
    fn from(raw: RawSnapshot) -> Self {
        Self {
            key: raw.key,
            items: dedupe(raw.items),
            created_at: raw.created_at,
        }
    }
}

/// Items added and removed between two snapshots
///
/// `added` and `removed` are disjoint. Their order follows the input
/// snapshots; call [`ChangeSet::sorted`] when a stable order is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Items present now but not before
    pub added: Vec<String>,
    /// Items present before but not now
    pub removed: Vec<String>,
}

impl ChangeSet {
    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Sort both sides lexicographically
    pub fn sorted(mut self) -> Self {
        self.added.sort_unstable();
        self.removed.sort_unstable();
        self
    }

    /// Apply this change set to a previous item set
    pub fn apply<'a>(&'a self, previous: &HashSet<&'a str>) -> HashSet<&'a str> {
        let removed: HashSet<&str> = self.removed.iter().map(String::as_str).collect();
        previous
            .iter()
            .copied()
            .filter(|item| !removed.contains(item))
            .chain(self.added.iter().map(String::as_str))
            .collect()
    }
}
