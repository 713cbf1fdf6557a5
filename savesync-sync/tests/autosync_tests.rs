use savesync_storage::MemoryStore;
use savesync_sync::remote::mock::MemoryRemote;
use savesync_sync::{AutoSync, SyncConfig, SyncEngine};
use savesync_types::UserId;
use std::sync::Arc;
use std::time::Duration;

fn engine(remote: &MemoryRemote) -> Arc<SyncEngine> {
    Arc::new(SyncEngine::new(
        SyncConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(remote.clone()),
    ))
}

async fn wait_for_puts(remote: &MemoryRemote, at_least: usize) -> bool {
    for _ in 0..200 {
        if remote.put_count() >= at_least {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn periodic_ticks_run_syncs() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);

    let handle = AutoSync::spawn_with_period(engine.clone(), UserId::new("p1"), Duration::from_millis(30));
    assert!(wait_for_puts(&remote, 2).await);
    handle.shutdown().await;

    assert!(engine.status().last_sync.is_some());
}

#[tokio::test]
async fn disabled_autosync_does_not_sync() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);
    engine.set_auto_sync(false);

    let handle = AutoSync::spawn_with_period(engine.clone(), UserId::new("p1"), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.shutdown().await;

    assert_eq!(remote.put_count(), 0);
    assert!(engine.operations().is_empty());
}

#[tokio::test]
async fn reconnect_triggers_immediate_sync() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);
    engine.set_online(false);

    let handle = AutoSync::spawn_with_period(engine.clone(), UserId::new("p1"), Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(remote.put_count(), 0);

    engine.set_online(true);
    assert!(wait_for_puts(&remote, 1).await);
    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);

    let handle = AutoSync::spawn_with_period(engine.clone(), UserId::new("p1"), Duration::from_millis(20));
    assert!(wait_for_puts(&remote, 1).await);
    handle.shutdown().await;

    let after = remote.put_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(remote.put_count(), after);
}

#[tokio::test]
async fn dropping_the_handle_stops_the_loop() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);

    let handle = AutoSync::spawn_with_period(engine.clone(), UserId::new("p1"), Duration::from_millis(20));
    assert!(wait_for_puts(&remote, 1).await);
    drop(handle);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = remote.put_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(remote.put_count(), after);
}
