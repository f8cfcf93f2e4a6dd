// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake instance for testing
//!
//! Each `FakeInstance` is a view over a `FakeStore` shared by every instance
//! under a key. Writes made inside a batch are staged and only reach the
//! store on commit; writes outside a batch apply directly.
#![cfg_attr(coverage_nightly, coverage(off))]

use batchguard_core::{Action, BatchInstance, Completion, InstanceError, SharedInstance};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Recorded instance call
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceCall {
    BeginBatch,
    Commit,
    Refresh,
    Put { key: String, value: Value },
    Remove { key: String },
}

#[derive(Default)]
struct StoreInner {
    data: BTreeMap<String, Value>,
    log: Vec<String>,
}

/// Shared resource behind a key, with an ordered log of applied operations
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .get(key)
            .cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .clone()
    }

    /// Every operation across all instances, as `instance:op[:key]`
    pub fn log(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .log
            .clone()
    }

    fn record(&self, entry: String) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .log
            .push(entry);
    }

    fn apply(&self, key: String, value: Option<Value>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match value {
            Some(value) => inner.data.insert(key, value),
            None => inner.data.remove(&key),
        };
    }
}

#[derive(Default)]
struct FakeState {
    in_batch: bool,
    staged: Vec<(String, Option<Value>)>,
    view: BTreeMap<String, Value>,
    calls: Vec<InstanceCall>,
    refresh_error: Option<InstanceError>,
    commit_error: Option<InstanceError>,
    held_refreshes: Option<Vec<Completion>>,
}

/// Fake instance for testing
pub struct FakeInstance {
    name: String,
    store: FakeStore,
    state: Mutex<FakeState>,
}

impl FakeInstance {
    pub fn new(name: impl Into<String>, store: &FakeStore) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            store: store.clone(),
            state: Mutex::new(FakeState::default()),
        })
    }

    /// Erase the concrete type for registration with a guard
    pub fn shared(this: &Arc<Self>) -> SharedInstance {
        Arc::clone(this) as SharedInstance
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<InstanceCall> {
        self.state().calls.clone()
    }

    /// Store contents as of the last refresh
    pub fn view(&self) -> BTreeMap<String, Value> {
        self.state().view.clone()
    }

    /// Writes waiting for this instance's commit
    pub fn staged(&self) -> usize {
        self.state().staged.len()
    }

    /// Make subsequent refreshes fail with `error`
    pub fn fail_refresh(&self, error: InstanceError) {
        self.state().refresh_error = Some(error);
    }

    /// Make subsequent commits fail with `error`; staged writes are kept
    pub fn fail_commit(&self, error: InstanceError) {
        self.state().commit_error = Some(error);
    }

    /// Park refresh completions until `release_refreshes` is called
    pub fn hold_refreshes(&self) {
        self.state().held_refreshes = Some(Vec::new());
    }

    /// Complete every parked refresh successfully and stop parking
    pub fn release_refreshes(&self) {
        let held = self.state().held_refreshes.take().unwrap_or_default();
        for done in held {
            self.store.record(format!("{}:refresh", self.name));
            self.sync_view();
            done(Ok(()));
        }
    }

    /// Action writing `value` under `key`
    pub fn put(this: &Arc<Self>, key: impl Into<String>, value: impl Into<Value>) -> Action {
        let key = key.into();
        let value = value.into();
        let target = Arc::clone(this);
        Action::new("put", &Self::shared(this), move |_, callback| {
            target.write(key, Some(value));
            if let Some(callback) = callback {
                callback(Ok(Value::Null));
            }
            Value::Null
        })
    }

    /// Action deleting `key`
    pub fn remove(this: &Arc<Self>, key: impl Into<String>) -> Action {
        let key = key.into();
        let target = Arc::clone(this);
        Action::new("remove", &Self::shared(this), move |_, callback| {
            target.write(key, None);
            if let Some(callback) = callback {
                callback(Ok(Value::Null));
            }
            Value::Null
        })
    }

    /// Action reading `key` from this instance's view
    pub fn get(this: &Arc<Self>, key: impl Into<String>) -> Action {
        let key = key.into();
        let target = Arc::clone(this);
        Action::new("get", &Self::shared(this), move |_, callback| {
            let value = target.state().view.get(&key).cloned().unwrap_or(Value::Null);
            if let Some(callback) = callback {
                callback(Ok(value.clone()));
            }
            value
        })
    }

    fn write(&self, key: String, value: Option<Value>) {
        let call = match &value {
            Some(value) => InstanceCall::Put {
                key: key.clone(),
                value: value.clone(),
            },
            None => InstanceCall::Remove { key: key.clone() },
        };
        let op = if value.is_some() { "put" } else { "remove" };

        let mut state = self.state();
        state.calls.push(call);
        if state.in_batch {
            state.staged.push((key, value));
            return;
        }
        drop(state);

        self.store.record(format!("{}:{}:{}", self.name, op, key));
        self.store.apply(key, value);
    }

    fn sync_view(&self) {
        let snapshot = self.store.snapshot();
        self.state().view = snapshot;
    }
}

impl BatchInstance for FakeInstance {
    fn begin_batch(&self) {
        let mut state = self.state();
        state.calls.push(InstanceCall::BeginBatch);
        state.in_batch = true;
    }

    fn batch_in_progress(&self) -> bool {
        self.state().in_batch
    }

    fn commit_batch(&self, done: Completion) {
        let mut state = self.state();
        state.calls.push(InstanceCall::Commit);
        if let Some(error) = state.commit_error.clone() {
            drop(state);
            return done(Err(error));
        }
        state.in_batch = false;
        let staged = std::mem::take(&mut state.staged);
        drop(state);

        self.store.record(format!("{}:commit", self.name));
        for (key, value) in staged {
            self.store.apply(key, value);
        }
        done(Ok(()))
    }

    fn refresh(&self, done: Completion) {
        let mut state = self.state();
        state.calls.push(InstanceCall::Refresh);
        if let Some(held) = state.held_refreshes.as_mut() {
            held.push(done);
            return;
        }
        let error = state.refresh_error.clone();
        drop(state);

        self.store.record(format!("{}:refresh", self.name));
        match error {
            Some(error) => done(Err(error)),
            None => {
                self.sync_view();
                done(Ok(()))
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
