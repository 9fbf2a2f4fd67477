//! scope-watch - Attack-surface scope monitor
//!
//! This is the main entry point for the scope-watch application.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use scope_watch::config::Config;
use scope_watch::error::AppError;
use scope_watch::notify::{
    ConsumerReport, NotificationChannel, NotificationConsumer, NotificationFanout, RedisChannel,
    TelegramTransport,
};
use scope_watch::otel::{init_tracing, Metrics, OtelProvider};
use scope_watch::sources::{AnubisSource, HackerOneSource};
use scope_watch::store::{RedisSnapshotStore, SnapshotStore};
use scope_watch::sync::{
    Collector, CollectorSettings, HttpClient, Scheduler, SchedulerConfig, Watch,
};
use scope_watch::watcher::{Watcher, WatcherSettings};

/// scope-watch - Attack-surface scope monitor
#[derive(Parser, Debug)]
#[command(name = "scope-watch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SCOPE_WATCH_CONFIG")]
    config: Option<String>,

    /// Path to a .env file loaded before the configuration
    #[arg(long, env = "SCOPE_WATCH_DOTENV")]
    dotenv: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the watchers on their schedule together with the consumer
    Run,
    /// Run one cycle of every enabled watcher and exit
    Once,
    /// Run only the notification consumer
    Notify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Run);

    load_dotenv(&args);

    // Load configuration
    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize OpenTelemetry provider
    let otel_provider = OtelProvider::new(&config.otel)?;

    // Initialize tracing/logging
    init_tracing(&otel_provider, &config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?command,
        "Starting scope-watch"
    );

    let metrics = Arc::new(Metrics::new(&otel_provider.meter()));

    let result = match command {
        Command::Run => run(&config, metrics).await,
        Command::Once => once(&config, metrics).await,
        Command::Notify => notify(&config, metrics).await,
    };

    // Shutdown OpenTelemetry
    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("scope-watch shutdown complete");

    result
}

/// Scheduled watchers plus the consumer, until a shutdown signal
async fn run(config: &Config, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let channel = connect_channel(config).await?;
    let watches = build_watchers(config, channel.clone(), metrics.clone()).await?;
    let consumer = build_consumer(config, metrics)?;
    let subscription = channel.subscribe().await.map_err(AppError::from)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler = Scheduler::new(
        SchedulerConfig::from(&config.scheduler),
        watches,
        shutdown_tx.subscribe(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    let consumer_shutdown = shutdown_tx.subscribe();
    let consumer_handle =
        tokio::spawn(async move { consumer.run(subscription, consumer_shutdown).await });

    let result = supervise_consumer(consumer_handle, &shutdown_tx).await;

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task failed");
    }

    result
}

/// One cycle of every enabled watcher
async fn once(config: &Config, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let channel = connect_channel(config).await?;
    let watches = build_watchers(config, channel, metrics).await?;

    let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let scheduler = Scheduler::new(SchedulerConfig::from(&config.scheduler), watches, shutdown_rx);

    let mut failed = 0;
    for (name, result) in scheduler.run_once().await {
        match result {
            Ok(outcome) if outcome.is_complete() => {
                info!(watcher = %name, outcome = outcome.label(), "Cycle finished")
            }
            Ok(outcome) => {
                failed += 1;
                warn!(watcher = %name, outcome = ?outcome, "Cycle did not complete");
            }
            Err(e) => {
                failed += 1;
                error!(watcher = %name, error = %e, "Cycle failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} watcher cycle(s) did not complete", failed);
    }
    Ok(())
}

/// Consumer only, until a shutdown signal
async fn notify(config: &Config, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let channel = connect_channel(config).await?;
    let consumer = build_consumer(config, metrics)?;
    let subscription = channel.subscribe().await.map_err(AppError::from)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { consumer.run(subscription, shutdown_rx).await });

    supervise_consumer(handle, &shutdown_tx).await
}

/// Wait for a shutdown signal, failing if the consumer stops first
///
/// Shutdown is broadcast either way, so the scheduler stops with the consumer.
async fn supervise_consumer(
    mut handle: JoinHandle<ConsumerReport>,
    shutdown_tx: &broadcast::Sender<()>,
) -> anyhow::Result<()> {
    let early = tokio::select! {
        _ = shutdown_signal() => None,
        finished = &mut handle => Some(finished),
    };
    let _ = shutdown_tx.send(());

    let (report, unexpected) = match early {
        None => (handle.await?, false),
        Some(finished) => (finished?, true),
    };
    info!(
        received = report.received,
        delivered = report.delivered,
        dropped = report.dropped,
        "Consumer stopped"
    );

    if unexpected {
        error!("Notification consumer stopped before shutdown");
        anyhow::bail!("notification consumer stopped unexpectedly");
    }
    Ok(())
}

async fn connect_channel(config: &Config) -> Result<Arc<dyn NotificationChannel>, AppError> {
    let channel = RedisChannel::connect(&config.redis.url, &config.notifications.channel)
        .await?
        .with_reconnect(config.notifications.retry.clone());
    info!(channel = %config.notifications.channel, "Notification channel connected");
    Ok(Arc::new(channel))
}

/// Wire the enabled watchers onto the Redis store and `channel`
async fn build_watchers(
    config: &Config,
    channel: Arc<dyn NotificationChannel>,
    metrics: Arc<Metrics>,
) -> Result<Vec<Arc<dyn Watch>>, AppError> {
    let store = RedisSnapshotStore::connect(&config.redis.url).await?;
    info!(url = %store.url(), "Snapshot store connected");
    let store: Arc<dyn SnapshotStore> = Arc::new(store);

    let client = HttpClient::new(&config.http)?;
    let fanout = NotificationFanout::new(
        channel,
        Duration::from_millis(config.notifications.chunk_delay_ms),
    );

    let mut watches: Vec<Arc<dyn Watch>> = vec![];

    let scope = &config.watchers.scope;
    if scope.enabled {
        let source = HackerOneSource::new(config.hackerone.clone(), client.clone());
        let watcher = Watcher::new(
            WatcherSettings::scope(scope, &config.redis),
            Arc::new(source),
            Collector::new(CollectorSettings::from(&config.collector)),
            store.clone(),
            fanout.clone(),
        )
        .with_metrics(metrics.clone());
        info!(key = %scope.key, interval_secs = scope.interval_secs, "Scope watcher enabled");
        watches.push(Arc::new(watcher));
    }

    let subdomains = &config.watchers.subdomains;
    if subdomains.enabled {
        let source = AnubisSource::new(
            config.anubis.clone(),
            client.clone(),
            store.clone(),
            scope.key.clone(),
        );
        let settings = CollectorSettings {
            max_workers: subdomains.max_workers,
            request_interval: Duration::from_millis(subdomains.request_interval_ms),
            policy: subdomains.policy,
            ..CollectorSettings::from(&config.collector)
        };
        let watcher = Watcher::new(
            WatcherSettings::subdomains(subdomains, &config.redis, &config.notifications),
            Arc::new(source),
            Collector::new(settings),
            store.clone(),
            fanout,
        )
        .with_metrics(metrics);
        info!(
            key = %subdomains.key,
            interval_secs = subdomains.interval_secs,
            "Subdomain watcher enabled"
        );
        watches.push(Arc::new(watcher));
    }

    if watches.is_empty() {
        return Err(AppError::Config("no watcher is enabled".to_string()));
    }
    Ok(watches)
}

fn build_consumer(config: &Config, metrics: Arc<Metrics>) -> Result<NotificationConsumer, AppError> {
    if config.telegram.bot_token.is_empty() || config.telegram.chat_id.is_empty() {
        return Err(AppError::Config(
            "telegram.bot_token and telegram.chat_id are required".to_string(),
        ));
    }
    let client = HttpClient::new(&config.http)?;
    let transport = TelegramTransport::new(config.telegram.clone(), client);
    Ok(NotificationConsumer::new(Arc::new(transport), &config.notifications).with_metrics(metrics))
}

/// Load the .env file if present
fn load_dotenv(args: &Args) {
    // Use eprintln! since tracing is not yet initialized
    match &args.dotenv {
        Some(path) => {
            if let Err(e) = dotenvy::from_path(path) {
                eprintln!("Failed to load env file {}: {}", path, e);
            }
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
