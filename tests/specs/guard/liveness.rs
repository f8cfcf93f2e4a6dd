//! Liveness specs
//!
//! Verify collected instances, stalled completions and wrapped instances.

use crate::prelude::*;
use std::time::Duration;

#[test]
fn collected_instance_is_ignored() {
    let Shard { guard, store, a, b } = Shard::new();
    guard.begin_batch_for(SHARD, &FakeInstance::shared(&a));
    assert!(guard.is_batch_open(SHARD));

    drop(a);
    assert!(!guard.is_batch_open(SHARD));

    let done = Recorder::new();
    guard.notify_batch_committed(SHARD, done.completion());
    assert_eq!(done.results(), vec![Ok(Value::Null)]);
    assert_eq!(store.log(), vec!["b:refresh"]);
    assert_eq!(b.calls(), vec![InstanceCall::Refresh]);
}

#[test]
fn absent_registration_never_blocks() {
    let guard = BatchGuard::new();
    guard.register(SHARD, None);
    let noop: SharedInstance = Arc::new(NoOpInstance::new());
    guard.register(SHARD, Some(&noop));

    assert!(!guard.is_batch_open(SHARD));
    let done = Recorder::new();
    guard.notify_batch_committed(SHARD, done.completion());
    assert_eq!(done.results(), vec![Ok(Value::Null)]);
}

#[test]
fn stalled_refresh_blocks_replay_until_released() {
    let shard = Shard::new();
    shard.begin(&shard.a);
    shard.b.hold_refreshes();
    shard.submit(FakeInstance::put(&shard.b, "x", 1));

    let final_cb = Recorder::new();
    shard.submit(Action::commit(&FakeInstance::shared(&shard.a)).with_callback(final_cb.callback()));
    assert!(final_cb.results().is_empty());
    assert_eq!(shard.store.get("x"), None);

    shard.b.release_refreshes();

    assert_eq!(final_cb.results(), vec![Ok(Value::Null)]);
    assert_eq!(shard.store.get("x"), Some(Value::from(1)));
}

#[tokio::test]
async fn stalled_refresh_times_out_and_still_replays() {
    let config = GuardConfig::new().with_resolution_timeout(Duration::from_millis(20));
    let shard = Shard::with_guard(BatchGuard::with_config(config));
    shard.begin(&shard.a);
    shard.b.hold_refreshes();
    shard.submit(FakeInstance::put(&shard.b, "x", 1));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Mutex::new(Some(tx));
    shard.submit(
        Action::commit(&FakeInstance::shared(&shard.a)).with_callback(move |result| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        }),
    );

    let result = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        result,
        Err(InstanceError::TimedOut {
            after: Duration::from_millis(20)
        })
    );
    assert_eq!(shard.store.get("x"), Some(Value::from(1)));
}

#[test]
fn traced_instances_coordinate_like_any_other() {
    let guard = BatchGuard::new();
    let store = FakeStore::new();
    let a = FakeInstance::new("a", &store);
    let b = FakeInstance::new("b", &store);
    let traced_a: SharedInstance = Arc::new(TracedInstance::new("a", Arc::clone(&a)));
    let traced_b: SharedInstance = Arc::new(TracedInstance::new("b", Arc::clone(&b)));
    guard.register(SHARD, Some(&traced_a));
    guard.register(SHARD, Some(&traced_b));

    guard.begin_batch_for(SHARD, &traced_a);
    assert!(a.batch_in_progress());

    let dispatch = guard.execute_or_delay(SHARD, FakeInstance::put(&b, "x", 1));
    assert!(dispatch.is_deferred());

    guard.execute_or_delay(SHARD, Action::commit(&traced_a));

    assert_eq!(store.get("x"), Some(Value::from(1)));
    similar_asserts::assert_eq!(
        store.log(),
        log(&["a:commit", "a:refresh", "b:refresh", "b:put:x"])
    );
}
