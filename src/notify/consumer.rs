//! Notification consumer
//!
//! Reads payloads from a [`Subscription`] and delivers each one on its own
//! task through a [`Transport`], retrying with exponential backoff. At most
//! `max_in_flight` deliveries run at once; when all slots are taken the
//! consumer stops reading until one frees up. Messages are not ordered
//! relative to each other.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::NotificationConfig;
use crate::error::DeliveryError;
use crate::otel::Metrics;
use crate::sync::RetryManager;

use super::channel::Subscription;

/// Outbound delivery transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport name (e.g. "telegram")
    fn name(&self) -> &str;

    /// Deliver one message
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Result of delivering one message
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Delivered after the given number of attempts
    Delivered {
        /// Attempts made
        attempts: u32,
    },
    /// Every attempt failed; the message was dropped
    Dropped {
        /// Attempts made
        attempts: u32,
        /// Last error
        error: DeliveryError,
    },
}

/// Totals over one consumer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Messages received from the subscription
    pub received: u64,
    /// Messages delivered
    pub delivered: u64,
    /// Messages dropped after exhausting retries
    pub dropped: u64,
}

impl ConsumerReport {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { .. } => self.delivered += 1,
            DeliveryOutcome::Dropped { .. } => self.dropped += 1,
        }
    }
}

/// Delivers subscribed messages with bounded concurrency and retry
#[derive(Clone)]
pub struct NotificationConsumer {
    transport: Arc<dyn Transport>,
    retry: RetryManager,
    slots: Arc<Semaphore>,
    metrics: Option<Arc<Metrics>>,
}

impl NotificationConsumer {
    /// Create a consumer with the configured retry policy and concurrency bound
    pub fn new(transport: Arc<dyn Transport>, config: &NotificationConfig) -> Self {
        Self {
            transport,
            retry: RetryManager::new(config.retry.clone()),
            slots: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            metrics: None,
        }
    }

    /// Record delivery outcomes on `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Deliver one message, retrying transient failures
    pub async fn deliver(&self, text: &str) -> DeliveryOutcome {
        let transport = self.transport.clone();
        let outcome = match self.retry.execute(|| transport.deliver(text)).await {
            Ok(done) => {
                info!(
                    transport = self.transport.name(),
                    attempts = done.attempts,
                    "Message delivered"
                );
                DeliveryOutcome::Delivered {
                    attempts: done.attempts,
                }
            }
            Err(failed) => {
                error!(
                    transport = self.transport.name(),
                    attempts = failed.attempts,
                    error = %failed.value,
                    "Dropping message after failed deliveries"
                );
                DeliveryOutcome::Dropped {
                    attempts: failed.attempts,
                    error: failed.value,
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            let label = match outcome {
                DeliveryOutcome::Delivered { .. } => "delivered",
                DeliveryOutcome::Dropped { .. } => "dropped",
            };
            metrics.record_delivery(label);
        }
        outcome
    }

    /// Consume `subscription` until it ends or shutdown is signalled
    ///
    /// In-flight deliveries are awaited before returning.
    pub async fn run(
        &self,
        mut subscription: Subscription,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> ConsumerReport {
        let mut report = ConsumerReport::default();
        let mut tasks = JoinSet::new();

        info!(transport = self.transport.name(), "Notification consumer started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping notification consumer");
                    break;
                }
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::reap(&mut report, finished);
                }
                payload = subscription.recv() => {
                    let Some(text) = payload else {
                        warn!("Notification subscription closed");
                        break;
                    };
                    report.received += 1;

                    let Ok(permit) = self.slots.clone().acquire_owned().await else {
                        break;
                    };
                    debug!(
                        available = self.slots.available_permits(),
                        "Dispatching delivery"
                    );

                    let consumer = self.clone();
                    tasks.spawn(async move {
                        let outcome = consumer.deliver(&text).await;
                        drop(permit);
                        outcome
                    });
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            Self::reap(&mut report, finished);
        }

        info!(
            received = report.received,
            delivered = report.delivered,
            dropped = report.dropped,
            "Notification consumer stopped"
        );
        report
    }

    fn reap(
        report: &mut ConsumerReport,
        finished: Result<DeliveryOutcome, tokio::task::JoinError>,
    ) {
        match finished {
            Ok(outcome) => report.record(&outcome),
            Err(err) => {
                error!(error = %err, "Delivery task failed");
                report.dropped += 1;
            }
        }
    }
}
