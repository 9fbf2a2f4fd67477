//! Watch scheduler
//!
//! Runs every registered watch on its own period. Each watch gets a
//! background task that runs one cycle, then sleeps for the watch's
//! interval. A shutdown signal is observed between cycles, so a cycle that
//! is already running finishes (or hits its timeout) before the task exits.

use crate::config::SchedulerSettings;
use crate::models::CycleOutcome;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Initial delay before the first cycle
    pub initial_delay: Duration,
    /// Upper bound on one cycle
    pub cycle_timeout: Duration,
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            cycle_timeout: Duration::from_secs(settings.cycle_timeout_secs),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

/// Status of one watch
#[derive(Debug, Clone, Default)]
pub struct WatchStatus {
    /// When the last cycle finished
    pub last_cycle: Option<SystemTime>,
    /// Last cycle outcome, or the reason it produced none
    pub last_outcome: Option<Result<CycleOutcome, String>>,
    /// Next scheduled cycle
    pub next_cycle: Option<SystemTime>,
    /// Whether a cycle is currently running
    pub in_progress: bool,
    /// Cycles run so far
    pub cycles: u64,
}

/// Shared status map, keyed by watch name
pub type StatusMap = Arc<RwLock<HashMap<String, WatchStatus>>>;

/// A periodic job driven by the scheduler
#[async_trait]
pub trait Watch: Send + Sync {
    /// Get the name of this watch
    fn name(&self) -> &str;

    /// Get the period between cycles
    fn interval(&self) -> Duration;

    /// Run one cycle
    ///
    /// Failures are part of the outcome; a cycle never errors out.
    async fn run_cycle(&self) -> CycleOutcome;
}

/// Scheduler for watches
pub struct Scheduler {
    config: SchedulerConfig,
    watches: Vec<Arc<dyn Watch>>,
    status: StatusMap,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduler configuration
    /// * `watches` - Watches to run
    /// * `shutdown_rx` - Broadcast receiver for shutdown signal
    pub fn new(
        config: SchedulerConfig,
        watches: Vec<Arc<dyn Watch>>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let status = watches
            .iter()
            .map(|w| (w.name().to_string(), WatchStatus::default()))
            .collect();

        Self {
            config,
            watches,
            status: Arc::new(RwLock::new(status)),
            shutdown_rx,
        }
    }

    /// Get a handle to the status map
    pub fn status_handle(&self) -> StatusMap {
        self.status.clone()
    }

    /// Get the current status for all watches
    pub async fn get_status(&self) -> HashMap<String, WatchStatus> {
        self.status.read().await.clone()
    }

    /// Run one cycle of every watch, in order, and return their outcomes
    pub async fn run_once(&self) -> Vec<(String, Result<CycleOutcome, String>)> {
        let mut outcomes = Vec::with_capacity(self.watches.len());
        for watch in &self.watches {
            let outcome = Self::perform_cycle(watch, &self.status, &self.config).await;
            outcomes.push((watch.name().to_string(), outcome));
        }
        outcomes
    }

    /// Run the scheduler until shutdown is signalled
    pub async fn run(mut self) {
        info!(watches = self.watches.len(), "Starting scheduler");

        if !self.config.initial_delay.is_zero() {
            debug!(
                delay_secs = self.config.initial_delay.as_secs(),
                "Waiting for initial delay"
            );
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received before first cycle");
                    return;
                }
                _ = tokio::time::sleep(self.config.initial_delay) => {}
            }
        }

        // First round: one watch at a time, in registration order
        for watch in &self.watches {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received during first round");
                    return;
                }
                _ = Self::perform_cycle(watch, &self.status, &self.config) => {}
            }
        }

        let mut handles = Vec::new();
        let (task_shutdown_tx, _) = broadcast::channel::<()>(1);

        for watch in &self.watches {
            let watch = watch.clone();
            let status = self.status.clone();
            let config = self.config.clone();
            let task_shutdown_rx = task_shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                Self::run_watch(watch, status, config, task_shutdown_rx).await;
            }));
        }

        let _ = self.shutdown_rx.recv().await;
        info!("Shutdown signal received, stopping scheduler");
        let _ = task_shutdown_tx.send(());

        for handle in handles {
            let _ = handle.await;
        }

        info!("Scheduler stopped");
    }

    async fn run_watch(
        watch: Arc<dyn Watch>,
        status: StatusMap,
        config: SchedulerConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let name = watch.name().to_string();
        let interval = watch.interval();

        loop {
            debug!(
                watch = %name,
                interval_secs = interval.as_secs(),
                "Scheduled next cycle"
            );

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(watch = %name, "Watch task shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let _ = Self::perform_cycle(&watch, &status, &config).await;
        }
    }

    async fn perform_cycle(
        watch: &Arc<dyn Watch>,
        status: &StatusMap,
        config: &SchedulerConfig,
    ) -> Result<CycleOutcome, String> {
        let name = watch.name().to_string();

        {
            let mut status_map = status.write().await;
            if let Some(s) = status_map.get_mut(&name) {
                s.in_progress = true;
            }
        }

        let result = match tokio::time::timeout(config.cycle_timeout, watch.run_cycle()).await {
            Ok(outcome) => {
                match &outcome {
                    CycleOutcome::Aborted { stage, reason } => {
                        warn!(watch = %name, stage = %stage, reason = %reason, "Cycle aborted");
                    }
                    outcome => {
                        info!(watch = %name, outcome = outcome.label(), "Cycle completed");
                    }
                }
                Ok(outcome)
            }
            Err(_) => {
                error!(
                    watch = %name,
                    timeout_secs = config.cycle_timeout.as_secs(),
                    "Cycle timed out"
                );
                Err("Cycle timed out".to_string())
            }
        };

        let mut status_map = status.write().await;
        if let Some(s) = status_map.get_mut(&name) {
            s.in_progress = false;
            s.cycles += 1;
            s.last_cycle = Some(SystemTime::now());
            s.last_outcome = Some(result.clone());
            s.next_cycle = Some(SystemTime::now() + watch.interval());
        }

        result
    }
}
