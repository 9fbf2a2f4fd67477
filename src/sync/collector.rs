//! Worker pool collector
//!
//! Fans a list of partitions out to a bounded set of workers. Each worker
//! pulls partitions from a shared queue, waits on its own [`RateLimiter`],
//! and fetches with a per-call deadline. Items and per-partition failures
//! travel back on two separate channels, drained only after every worker
//! has been joined.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::{CollectorConfig, FailurePolicy};
use crate::error::{CollectError, FetchError, PartitionFailure};
use crate::sources::InventorySource;
use crate::sync::RateLimiter;

/// Runtime settings for a collector
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSettings {
    /// Upper bound on concurrent workers
    pub max_workers: usize,
    /// Minimum spacing between calls made by one worker
    pub request_interval: Duration,
    /// Calls a worker may make back to back
    pub burst: u32,
    /// Deadline for one partition fetch
    pub fetch_timeout: Duration,
    /// Partial-failure policy
    pub policy: FailurePolicy,
}

impl From<&CollectorConfig> for CollectorSettings {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            request_interval: Duration::from_millis(config.request_interval_ms),
            burst: config.burst,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            policy: config.policy,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from(&CollectorConfig::default())
    }
}

/// Union of fetched items plus the partitions that failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// Items from every successful partition, in arrival order
    pub items: Vec<String>,
    /// Partitions that failed or timed out
    pub failures: Vec<PartitionFailure>,
    /// Number of partitions attempted
    pub partitions: usize,
}

impl Collection {
    /// Fraction of partitions that failed (0 when nothing was attempted)
    pub fn error_rate(&self) -> f64 {
        if self.partitions == 0 {
            return 0.0;
        }
        self.failures.len() as f64 / self.partitions as f64
    }
}

/// Bounded worker pool over an [`InventorySource`]
#[derive(Debug, Clone)]
pub struct Collector {
    settings: CollectorSettings,
}

impl Collector {
    /// Create a collector with the given settings
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }

    /// Current settings
    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// List the source's partitions, collect them and apply the failure policy
    pub async fn run(&self, source: Arc<dyn InventorySource>) -> Result<Collection, CollectError> {
        let partitions = source.partitions().await?;
        let collection = self.collect(source, partitions).await;
        self.apply_policy(collection)
    }

    /// Fetch every partition and return the partial union with all failures
    ///
    /// No policy is applied here; see [`Collector::apply_policy`].
    pub async fn collect(
        &self,
        source: Arc<dyn InventorySource>,
        partitions: Vec<String>,
    ) -> Collection {
        let total = partitions.len();
        if total == 0 {
            debug!(source = source.name(), "No partitions to collect");
            return Collection::default();
        }

        let workers = self.settings.max_workers.clamp(1, total);
        info!(
            source = source.name(),
            partitions = total,
            workers = workers,
            "Starting collection"
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(partitions)));
        let (items_tx, mut items_rx) = mpsc::unbounded_channel::<Vec<String>>();
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<PartitionFailure>();

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let source = source.clone();
            let queue = queue.clone();
            let items_tx = items_tx.clone();
            let failures_tx = failures_tx.clone();
            let settings = self.settings.clone();

            handles.push(tokio::spawn(async move {
                Self::run_worker(worker, source, queue, items_tx, failures_tx, settings).await;
            }));
        }
        drop(items_tx);
        drop(failures_tx);

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Collector worker panicked");
            }
        }

        let mut collection = Collection {
            partitions: total,
            ..Collection::default()
        };
        while let Some(items) = items_rx.recv().await {
            collection.items.extend(items);
        }
        while let Some(failure) = failures_rx.recv().await {
            collection.failures.push(failure);
        }

        info!(
            source = source.name(),
            items = collection.items.len(),
            failed = collection.failures.len(),
            "Collection finished"
        );
        collection
    }

    async fn run_worker(
        worker: usize,
        source: Arc<dyn InventorySource>,
        queue: Arc<Mutex<VecDeque<String>>>,
        items_tx: mpsc::UnboundedSender<Vec<String>>,
        failures_tx: mpsc::UnboundedSender<PartitionFailure>,
        settings: CollectorSettings,
    ) {
        let limiter = RateLimiter::new(settings.request_interval, settings.burst);

        loop {
            let next = queue.lock().await.pop_front();
            let Some(partition) = next else {
                break;
            };

            limiter.acquire().await;

            let result = tokio::time::timeout(settings.fetch_timeout, source.fetch(&partition))
                .await
                .unwrap_or(Err(FetchError::Timeout(settings.fetch_timeout.as_secs())));

            match result {
                Ok(items) => {
                    debug!(
                        worker = worker,
                        partition = %partition,
                        items = items.len(),
                        "Fetched partition"
                    );
                    let _ = items_tx.send(items);
                }
                Err(err) => {
                    warn!(
                        worker = worker,
                        partition = %partition,
                        error = %err,
                        "Partition fetch failed"
                    );
                    let _ = failures_tx.send(PartitionFailure {
                        partition,
                        error: err,
                    });
                }
            }
        }
    }

    /// Decide whether a collection is usable under the configured policy
    pub fn apply_policy(&self, collection: Collection) -> Result<Collection, CollectError> {
        let failed = collection.failures.len();
        let total = collection.partitions;

        match self.settings.policy {
            FailurePolicy::FailFast if failed > 0 => {
                Err(CollectError::PartialFailure { failed, total })
            }
            FailurePolicy::MaxErrorRate(threshold) if collection.error_rate() > threshold => {
                Err(CollectError::ErrorRateExceeded {
                    failed,
                    total,
                    threshold,
                })
            }
            _ => Ok(collection),
        }
    }
}
