//! Shared fixtures for specs

pub use batchguard_adapters::{FakeInstance, FakeStore, InstanceCall, NoOpInstance, TracedInstance};
pub use batchguard_core::{
    Action, ActionResult, BatchGuard, BatchInstance, Dispatch, GuardConfig, GuardEvent,
    InstanceError, SharedInstance,
};
pub use serde_json::Value;
pub use std::sync::{Arc, Mutex};

pub const SHARD: &str = "shard1";

/// A guard with instances A and B registered under `SHARD` over one store
pub struct Shard {
    pub guard: BatchGuard,
    pub store: FakeStore,
    pub a: Arc<FakeInstance>,
    pub b: Arc<FakeInstance>,
}

impl Shard {
    pub fn new() -> Self {
        Self::with_guard(BatchGuard::new())
    }

    pub fn with_guard(guard: BatchGuard) -> Self {
        let store = FakeStore::new();
        let a = FakeInstance::new("a", &store);
        let b = FakeInstance::new("b", &store);
        guard.register(SHARD, Some(&FakeInstance::shared(&a)));
        guard.register(SHARD, Some(&FakeInstance::shared(&b)));
        Self { guard, store, a, b }
    }

    pub fn begin(&self, instance: &Arc<FakeInstance>) {
        self.guard
            .begin_batch_for(SHARD, &FakeInstance::shared(instance));
    }

    pub fn submit(&self, action: Action) -> Dispatch {
        self.guard.execute_or_delay(SHARD, action)
    }

    pub fn pending(&self, instance: &Arc<FakeInstance>) -> Vec<String> {
        self.guard
            .pending_actions(SHARD, &FakeInstance::shared(instance))
    }
}

/// Callback that records every result it receives, in order
#[derive(Clone, Default)]
pub struct Recorder {
    results: Arc<Mutex<Vec<Result<Value, InstanceError>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(ActionResult) + Send + Sync + 'static {
        let results = Arc::clone(&self.results);
        move |result| results.lock().unwrap().push(result)
    }

    /// Single-shot completion for resolution operations
    pub fn completion(&self) -> impl FnOnce(Result<(), InstanceError>) + Send + 'static {
        let results = Arc::clone(&self.results);
        move |result| results.lock().unwrap().push(result.map(|()| Value::Null))
    }

    pub fn results(&self) -> Vec<Result<Value, InstanceError>> {
        self.results.lock().unwrap().clone()
    }
}

/// Owned copy of an expected store log
pub fn log(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|e| e.to_string()).collect()
}
