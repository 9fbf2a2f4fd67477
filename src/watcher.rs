//! Change-detection cycle
//!
//! A [`Watcher`] tracks one inventory key. Each cycle walks the stages
//! collect, dedupe, load baseline, diff, notify, persist:
//!
//! - a collection or baseline-load failure aborts the cycle and leaves the
//!   stored baseline untouched
//! - a missing baseline skips diffing and notifying and seeds the store
//! - an empty change set publishes nothing
//! - a failed snapshot write is logged and the cycle still completes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{NotificationConfig, RedisConfig, ScopeWatcherConfig, SubdomainWatcherConfig};
use crate::models::{ChangeSet, CycleOutcome, CycleStage, Snapshot};
use crate::notify::NotificationFanout;
use crate::otel::Metrics;
use crate::snapshot::diff;
use crate::sources::InventorySource;
use crate::store::SnapshotStore;
use crate::sync::{Collector, Watch};

/// How a watcher announces a non-empty change set
#[derive(Debug, Clone, PartialEq)]
pub enum AnnounceStyle {
    /// One `Added: [...]` and one `Removed: [...]` message
    Inline,
    /// A summary message, then the item lists in numbered chunks
    Chunked {
        /// Summary prefix, e.g. "Subdomain"
        label: String,
        /// Chunk title for added items
        added_title: String,
        /// Chunk title for removed items
        removed_title: String,
        /// Items per chunk
        chunk_size: usize,
        /// Whether removed items are listed too
        announce_removed: bool,
    },
}

/// Per-watcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherSettings {
    /// Watcher name used in logs, metrics and status
    pub name: String,
    /// Snapshot key
    pub key: String,
    /// Period between cycles
    pub interval: Duration,
    /// Retention of the stored snapshot
    pub snapshot_ttl: Duration,
    /// Announcement style
    pub style: AnnounceStyle,
}

impl WatcherSettings {
    /// URL-scope watcher: inline announcements
    pub fn scope(config: &ScopeWatcherConfig, redis: &RedisConfig) -> Self {
        Self {
            name: "scope".to_string(),
            key: config.key.clone(),
            interval: Duration::from_secs(config.interval_secs),
            snapshot_ttl: redis.snapshot_ttl(),
            style: AnnounceStyle::Inline,
        }
    }

    /// Subdomain watcher: summary plus chunked lists
    pub fn subdomains(
        config: &SubdomainWatcherConfig,
        redis: &RedisConfig,
        notifications: &NotificationConfig,
    ) -> Self {
        Self {
            name: "subdomains".to_string(),
            key: config.key.clone(),
            interval: Duration::from_secs(config.interval_secs),
            snapshot_ttl: redis.snapshot_ttl(),
            style: AnnounceStyle::Chunked {
                label: "Subdomain".to_string(),
                added_title: "🆕 Added Subdomains".to_string(),
                removed_title: "🗑️ Removed Subdomains".to_string(),
                chunk_size: notifications.chunk_size,
                announce_removed: config.announce_removed,
            },
        }
    }
}

/// Periodic change detector over one inventory source
pub struct Watcher {
    settings: WatcherSettings,
    source: Arc<dyn InventorySource>,
    collector: Collector,
    store: Arc<dyn SnapshotStore>,
    fanout: NotificationFanout,
    metrics: Option<Arc<Metrics>>,
}

impl Watcher {
    /// Create a watcher
    pub fn new(
        settings: WatcherSettings,
        source: Arc<dyn InventorySource>,
        collector: Collector,
        store: Arc<dyn SnapshotStore>,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            settings,
            source,
            collector,
            store,
            fanout,
            metrics: None,
        }
    }

    /// Record cycle metrics on `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Watcher settings
    pub fn settings(&self) -> &WatcherSettings {
        &self.settings
    }

    /// Run one full cycle
    pub async fn cycle(&self) -> CycleOutcome {
        let started = Instant::now();
        let outcome = self.run_stages().await;

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(
                &self.settings.name,
                outcome.label(),
                started.elapsed().as_secs_f64(),
            );
        }
        outcome
    }

    async fn run_stages(&self) -> CycleOutcome {
        let name = self.settings.name.as_str();
        let key = self.settings.key.as_str();

        let collection = match self.collector.run(self.source.clone()).await {
            Ok(collection) => collection,
            Err(err) => return self.abort(CycleStage::Collecting, err),
        };
        if !collection.failures.is_empty() {
            warn!(
                watcher = name,
                failed = collection.failures.len(),
                partitions = collection.partitions,
                "Continuing with partial collection"
            );
        }

        let current = Snapshot::new(key, collection.items);
        info!(watcher = name, items = current.len(), "Collected current inventory");
        if let Some(metrics) = &self.metrics {
            metrics.record_items_collected(name, current.len());
        }

        let previous = match self.store.load(key).await {
            Ok(Some(previous)) => previous,
            Ok(None) => {
                info!(watcher = name, key = key, "No baseline found, seeding snapshot");
                let persisted = self.persist(&current).await;
                return CycleOutcome::Seeded {
                    items: current.len(),
                    persisted,
                };
            }
            Err(err) => return self.abort(CycleStage::LoadingBaseline, err),
        };

        let changes = diff(&previous, &current).sorted();
        self.notify(&changes).await;

        let persisted = self.persist(&current).await;
        CycleOutcome::Compared {
            items: current.len(),
            added: changes.added.len(),
            removed: changes.removed.len(),
            persisted,
        }
    }

    async fn notify(&self, changes: &ChangeSet) {
        let name = self.settings.name.as_str();

        if changes.is_empty() {
            info!(watcher = name, "No changes detected");
            return;
        }

        info!(
            watcher = name,
            added = changes.added.len(),
            removed = changes.removed.len(),
            "Changes detected"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_changes(name, changes.added.len(), changes.removed.len());
        }

        match &self.settings.style {
            AnnounceStyle::Inline => {
                self.fanout.announce_inline("Added", &changes.added).await;
                self.fanout.announce_inline("Removed", &changes.removed).await;
            }
            AnnounceStyle::Chunked {
                label,
                added_title,
                removed_title,
                chunk_size,
                announce_removed,
            } => {
                self.fanout
                    .announce_summary(label, changes.added.len(), changes.removed.len())
                    .await;
                self.fanout
                    .announce_items(&changes.added, added_title, *chunk_size)
                    .await;
                if *announce_removed {
                    self.fanout
                        .announce_items(&changes.removed, removed_title, *chunk_size)
                        .await;
                }
            }
        }
    }

    async fn persist(&self, current: &Snapshot) -> bool {
        match self
            .store
            .save(&self.settings.key, current, self.settings.snapshot_ttl)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(
                    watcher = %self.settings.name,
                    key = %self.settings.key,
                    error = %err,
                    "Failed to persist snapshot"
                );
                false
            }
        }
    }

    fn abort(&self, stage: CycleStage, err: impl std::fmt::Display) -> CycleOutcome {
        error!(
            watcher = %self.settings.name,
            stage = %stage,
            error = %err,
            "Cycle aborted"
        );
        CycleOutcome::Aborted {
            stage,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Watch for Watcher {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn interval(&self) -> Duration {
        self.settings.interval
    }

    async fn run_cycle(&self) -> CycleOutcome {
        self.cycle().await
    }
}
