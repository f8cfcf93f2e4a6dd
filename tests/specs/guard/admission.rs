//! Admission specs
//!
//! Verify when actions run immediately and when they are deferred.

use crate::prelude::*;

#[test]
fn actions_run_immediately_without_open_batch() {
    let shard = Shard::new();
    let cb = Recorder::new();

    let dispatch = shard.submit(FakeInstance::put(&shard.b, "x", 1).with_callback(cb.callback()));

    assert!(!dispatch.is_deferred());
    assert_eq!(shard.store.get("x"), Some(Value::from(1)));
    assert_eq!(cb.results(), vec![Ok(Value::Null)]);
    assert_eq!(shard.guard.queued_instances(SHARD), 0);
}

#[test]
fn other_instance_is_deferred_while_batch_open() {
    let shard = Shard::new();
    shard.begin(&shard.a);
    let cb = Recorder::new();

    let dispatch = shard.submit(FakeInstance::put(&shard.b, "x", 1).with_callback(cb.callback()));

    assert_eq!(dispatch, Dispatch::Deferred { admission_index: 0 });
    // Released immediately, nothing written yet
    assert_eq!(cb.results(), vec![Ok(Value::Null)]);
    assert_eq!(shard.store.get("x"), None);
    assert_eq!(shard.pending(&shard.b), vec!["put"]);
    assert!(shard.b.calls().is_empty());
}

#[test]
fn batch_owner_runs_its_own_actions() {
    let shard = Shard::new();
    shard.begin(&shard.a);

    let dispatch = shard.submit(FakeInstance::put(&shard.a, "x", 1));

    assert!(!dispatch.is_deferred());
    assert_eq!(shard.a.staged(), 1);
    assert!(shard.pending(&shard.a).is_empty());
}

#[test]
fn immediate_get_returns_value() {
    let shard = Shard::new();
    shard.submit(FakeInstance::put(&shard.a, "x", "v"));
    shard
        .guard
        .notify_batch_committed(SHARD, |result| assert!(result.is_ok()));

    let dispatch = shard.submit(FakeInstance::get(&shard.b, "x"));

    assert_eq!(dispatch, Dispatch::Executed(Value::from("v")));
}

#[test]
fn keys_do_not_block_each_other() {
    let shard = Shard::new();
    shard.begin(&shard.a);
    let other_store = FakeStore::new();
    let c = FakeInstance::new("c", &other_store);
    shard
        .guard
        .register("shard2", Some(&FakeInstance::shared(&c)));

    let dispatch = shard
        .guard
        .execute_or_delay("shard2", FakeInstance::put(&c, "x", 1));

    assert!(!dispatch.is_deferred());
    assert_eq!(other_store.get("x"), Some(Value::from(1)));
}

#[test]
fn deferral_publishes_event() {
    let shard = Shard::new();
    let mut events = shard.guard.subscribe();
    shard.begin(&shard.a);

    shard.submit(FakeInstance::remove(&shard.b, "x"));

    assert_eq!(
        events.try_recv().unwrap(),
        GuardEvent::ActionDeferred {
            key: SHARD.to_string(),
            action: "remove".to_string(),
            admission_index: 0,
        }
    );
}
