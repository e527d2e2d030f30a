//! Contract Test: Scheduled Refresh Engine
//!
//! Constraints verified:
//! - With run_on_start, a refresh runs immediately and is reported
//! - Without it, nothing runs before the first interval elapses
//! - A failed refresh is reported as an event, the engine keeps running
//! - The shutdown signal terminates the engine promptly

mod common;

use common::*;
use hostsync_core::config::ScheduleConfig;
use hostsync_core::{MemoryKvStore, SyncEngine, SyncEvent, UpdateOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn schedule(run_on_start: bool) -> ScheduleConfig {
    ScheduleConfig {
        interval_secs: 3600,
        run_on_start,
        event_channel_capacity: 16,
    }
}

async fn next_event(rx: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within 5 seconds")
        .expect("channel open")
}

#[tokio::test]
async fn refresh_runs_on_start_and_is_reported() {
    let kv = MemoryKvStore::new();
    let transport = ScriptedTransport::new();
    transport.script("github.com", Script::Address("140.82.114.25"));
    let coordinator = Arc::new(coordinator(
        &transport,
        Arc::new(kv.clone()),
        &fast_config(&["github.com"]),
    ));

    let (engine, mut events) = SyncEngine::new(coordinator, &schedule(true)).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    assert_eq!(
        next_event(&mut events).await,
        SyncEvent::Started {
            domains_count: 1,
            interval_secs: 3600
        }
    );
    assert_eq!(next_event(&mut events).await, SyncEvent::RefreshStarted { cycle: 1 });
    assert_eq!(
        next_event(&mut events).await,
        SyncEvent::RefreshCompleted {
            cycle: 1,
            outcome: UpdateOutcome::Merged {
                changed: 1,
                unchanged: 0,
                skipped: 0
            }
        }
    );
    assert_eq!(stored(&kv).await.unwrap().len(), 1);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert!(matches!(next_event(&mut events).await, SyncEvent::Stopped { .. }));
}

#[tokio::test]
async fn no_refresh_before_first_interval_without_run_on_start() {
    let transport = ScriptedTransport::new();
    let coordinator = Arc::new(coordinator(
        &transport,
        Arc::new(MemoryKvStore::new()),
        &fast_config(&["github.com"]),
    ));

    let (engine, mut events) = SyncEngine::new(coordinator, &schedule(false)).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    assert!(matches!(next_event(&mut events).await, SyncEvent::Started { .. }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert!(matches!(next_event(&mut events).await, SyncEvent::Stopped { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn failed_refresh_is_reported() {
    let transport = ScriptedTransport::new();
    transport.script("github.com", Script::Address("140.82.114.25"));
    let coordinator = Arc::new(coordinator(
        &transport,
        Arc::new(FailingKvStore::broken()),
        &fast_config(&["github.com"]),
    ));

    let (engine, mut events) = SyncEngine::new(coordinator, &schedule(true)).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    next_event(&mut events).await;
    next_event(&mut events).await;
    assert!(matches!(
        next_event(&mut events).await,
        SyncEvent::RefreshFailed { cycle: 1, .. }
    ));

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "engine should terminate within 5 seconds");
}

#[tokio::test]
async fn invalid_schedule_is_rejected() {
    let coordinator = Arc::new(coordinator(
        &ScriptedTransport::new(),
        Arc::new(MemoryKvStore::new()),
        &fast_config(&["github.com"]),
    ));
    let mut config = schedule(true);
    config.interval_secs = 0;

    assert!(SyncEngine::new(coordinator, &config).is_err());
}
