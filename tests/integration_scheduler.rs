//! Scheduler integration tests
//!
//! Runs real watchers under the scheduler:
//! - one-shot runs report every watcher outcome
//! - periodic runs pick up upstream changes and stop on shutdown

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use scope_watch::config::FailurePolicy;
use scope_watch::models::CycleOutcome;
use scope_watch::notify::{LocalChannel, NotificationChannel, NotificationFanout};
use scope_watch::store::MemorySnapshotStore;
use scope_watch::sync::{Scheduler, SchedulerConfig, Watch};
use scope_watch::watcher::{AnnounceStyle, Watcher, WatcherSettings};
use tokio::sync::broadcast;

fn watcher(
    name: &str,
    interval: Duration,
    source: Arc<StaticSource>,
    store: Arc<MemorySnapshotStore>,
    channel: Arc<LocalChannel>,
) -> Arc<dyn Watch> {
    Arc::new(Watcher::new(
        WatcherSettings {
            name: name.to_string(),
            key: format!("{}:previous", name),
            interval,
            snapshot_ttl: Duration::ZERO,
            style: AnnounceStyle::Inline,
        },
        source,
        create_test_collector(1, FailurePolicy::FailFast),
        store,
        NotificationFanout::new(channel, Duration::ZERO),
    ))
}

/// Test 1: run_once reports one outcome per watcher
#[tokio::test]
async fn test_run_once_reports_outcomes() {
    let store = Arc::new(MemorySnapshotStore::new());
    let channel = Arc::new(LocalChannel::default());
    let watches = vec![
        watcher(
            "first",
            Duration::from_secs(60),
            StaticSource::new(&["a.com"]),
            store.clone(),
            channel.clone(),
        ),
        watcher(
            "second",
            Duration::from_secs(60),
            StaticSource::new(&["b.com", "c.com"]),
            store.clone(),
            channel.clone(),
        ),
    ];

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = Scheduler::new(SchedulerConfig::default(), watches, shutdown_rx);

    let outcomes = scheduler.run_once().await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, "first");
    assert_eq!(
        outcomes[0].1,
        Ok(CycleOutcome::Seeded {
            items: 1,
            persisted: true
        })
    );
    assert_eq!(outcomes[1].0, "second");

    let status = scheduler.get_status().await;
    assert_eq!(status["first"].cycles, 1);
    assert!(!status["second"].in_progress);
}

/// Test 2: Periodic cycles announce changes until shutdown
#[tokio::test]
async fn test_periodic_cycles_until_shutdown() {
    let store = Arc::new(MemorySnapshotStore::new());
    let channel = Arc::new(LocalChannel::default());
    let mut subscription = channel.subscribe().await.unwrap();
    let source = StaticSource::new(&["a.com"]);

    let watches = vec![watcher(
        "periodic",
        Duration::from_millis(200),
        source.clone(),
        store,
        channel.clone(),
    )];
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = Scheduler::new(SchedulerConfig::default(), watches, shutdown_rx);
    let status = scheduler.status_handle();
    let handle = tokio::spawn(scheduler.run());

    // First cycle seeds, then the inventory changes before the next one
    tokio::time::sleep(Duration::from_millis(100)).await;
    source.set(&["a.com", "b.com"]).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();

    let messages = drain(&mut subscription).await;
    assert_eq!(messages, vec!["Added: [b.com]"]);

    let status = status.read().await;
    assert!(status["periodic"].cycles >= 2);
}
