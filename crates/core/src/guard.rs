// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch coordination guard
//!
//! Serializes mutations across instances that share a key. While any
//! instance under a key has an open batch, actions from the other instances
//! are queued instead of executed. When the batch resolves, every instance
//! under the key is refreshed and the longest-waiting blocked instance has
//! its queue replayed.
//!
//! Registry and ledger live behind one mutex. The lock is never held while
//! calling into an instance or a callback, so instances may re-enter the
//! guard from their completions.
//!
//! Admission checks the batch state and queues in separate steps, so a batch
//! can close in between. A deferral re-checks afterwards and drains the key
//! itself when the batch has closed and no commit is still resolving.

use crate::action::{Action, ActionOutput, ActionResult, Callback};
use crate::config::GuardConfig;
use crate::events::{EventBus, GuardEvent, GuardEventReceiver};
use crate::instance::{same_instance, InstanceError, InstanceHandle, SharedInstance};
use crate::key::BatchKey;
use crate::latch::CountdownLatch;
use crate::ledger::{Ledger, ReplayPlan};
use crate::registry::Registry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// What `execute_or_delay` did with an action
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    /// Ran immediately; carries the target's return value
    Executed(ActionOutput),
    /// Queued behind another instance's batch
    Deferred { admission_index: usize },
}

impl Dispatch {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Dispatch::Deferred { .. })
    }

    pub fn output(&self) -> Option<&ActionOutput> {
        match self {
            Dispatch::Executed(output) => Some(output),
            Dispatch::Deferred { .. } => None,
        }
    }
}

#[derive(Default)]
struct GuardState {
    registry: Registry,
    ledger: Ledger,
    /// Executed commits per key whose drain has not started yet
    resolving: HashMap<BatchKey, usize>,
}

/// Coordinates batches among instances registered under the same key
///
/// Clones share registry, ledger and subscribers.
#[derive(Clone, Default)]
pub struct BatchGuard {
    state: Arc<Mutex<GuardState>>,
    events: EventBus,
    config: GuardConfig,
}

impl BatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GuardConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live_instances(&self, key: &BatchKey) -> Vec<SharedInstance> {
        self.lock().registry.resolve(key)
    }

    // === Registry ===

    /// Track `instance` under `key` without owning it
    ///
    /// `None` records an absent registration, which never counts as live.
    pub fn register(&self, key: &str, instance: Option<&SharedInstance>) {
        let key = BatchKey::from(key);
        let added = self.lock().registry.insert(&key, InstanceHandle::new(instance));
        tracing::debug!(%key, added, absent = instance.is_none(), "register");
    }

    /// Whether any live instance under `key` has an open batch
    pub fn is_batch_open(&self, key: &str) -> bool {
        self.batch_open(&BatchKey::from(key))
    }

    fn batch_open(&self, key: &BatchKey) -> bool {
        self.live_instances(key)
            .iter()
            .any(|instance| instance.batch_in_progress())
    }

    /// Open a batch on `instance` if it is registered and alive under `key`
    pub fn begin_batch_for(&self, key: &str, instance: &SharedInstance) {
        let key = BatchKey::from(key);
        match self
            .live_instances(&key)
            .into_iter()
            .find(|live| same_instance(live, instance))
        {
            Some(live) => {
                tracing::info!(%key, "begin batch");
                live.begin_batch();
            }
            None => tracing::debug!(%key, "begin batch ignored, instance not registered"),
        }
    }

    // === Admission ===

    /// Run `action` now, or queue it behind another instance's open batch
    pub fn execute_or_delay(&self, key: &str, action: Action) -> Dispatch {
        let key = BatchKey::from(key);

        if !self.batch_open(&key) {
            return Dispatch::Executed(self.execute(&key, action));
        }

        // An instance's own batch never blocks it
        if action.caller().batch_in_progress() {
            tracing::trace!(%key, action = action.name(), "caller owns the open batch");
            return Dispatch::Executed(self.execute(&key, action));
        }

        let name = action.name().to_string();
        let release = action.callback().cloned();
        let admission_index = self.lock().ledger.defer(&key, action);

        tracing::debug!(%key, action = %name, admission_index, "deferred behind open batch");
        self.events.publish(GuardEvent::ActionDeferred {
            key: key.to_string(),
            action: name,
            admission_index,
        });

        if let Some(release) = release {
            release(Ok(Value::Null));
        }

        self.settle_deferral(&key);
        Dispatch::Deferred { admission_index }
    }

    /// Drain `key` if its batch closed while an action was being deferred
    fn settle_deferral(&self, key: &BatchKey) {
        if self.batch_open(key) || self.lock().resolving.contains_key(key) {
            return;
        }

        tracing::debug!(%key, "batch closed during admission, replaying");
        let replay_key = key.clone();
        self.execute_delayed_actions(key.as_str(), move |result| {
            if let Err(error) = result {
                tracing::warn!(key = %replay_key, %error, "replay after late deferral failed");
            }
        });
    }

    fn begin_resolving(&self, key: &BatchKey) {
        *self.lock().resolving.entry(key.clone()).or_default() += 1;
    }

    fn end_resolving(&self, key: &BatchKey) {
        let mut state = self.lock();
        if let Some(count) = state.resolving.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.resolving.remove(key);
            }
        }
    }

    fn execute(&self, key: &BatchKey, mut action: Action) -> ActionOutput {
        let callback = action.take_callback();
        let callback = if action.is_commit() {
            self.begin_resolving(key);
            Some(self.resolve_after_commit(key.clone(), callback))
        } else {
            callback
        };

        tracing::trace!(%key, action = action.name(), "execute");
        let caller = Arc::clone(action.caller());
        action.invoke_with(&caller, callback)
    }

    /// Wrap a commit callback: refresh everyone, replay the next blocked
    /// instance, then report to the original callback
    fn resolve_after_commit(&self, key: BatchKey, original: Option<Callback>) -> Callback {
        let guard = self.clone();

        Arc::new(move |committed: ActionResult| {
            let replay_guard = guard.clone();
            let replay_key = key.clone();
            let original = original.clone();

            guard.notify_batch_committed(key.as_str(), move |notified| {
                if let Err(error) = &notified {
                    tracing::warn!(key = %replay_key, %error, "refresh failed after commit, replaying anyway");
                }

                let key_for_log = replay_key.clone();
                replay_guard.end_resolving(&replay_key);
                replay_guard.execute_delayed_actions(replay_key.as_str(), move |replayed| {
                    if let Err(error) = replayed {
                        tracing::warn!(key = %key_for_log, %error, "replay after commit failed");
                    }
                    if let Some(callback) = original {
                        match notified {
                            Err(error) => callback(Err(error)),
                            Ok(()) => callback(committed),
                        }
                    }
                });
            });
        })
    }

    // === Replay ===

    /// Replay the queue of the longest-waiting blocked instance under `key`
    ///
    /// Queued actions run in enqueue order. A queued commit runs after every
    /// action before it has completed; anything queued after the commit is
    /// discarded. With nothing queued, `done` runs immediately.
    pub fn execute_delayed_actions<F>(&self, key: &str, done: F)
    where
        F: FnOnce(Result<(), InstanceError>) + Send + 'static,
    {
        let key = BatchKey::from(key);
        let entry = self.lock().ledger.pop_front(&key);
        let Some(entry) = entry else {
            tracing::trace!(%key, "nothing to replay");
            return done(Ok(()));
        };

        let ReplayPlan {
            instance,
            actions,
            commit,
            stale,
        } = entry.into_replay();

        if !stale.is_empty() {
            let names: Vec<String> = stale.iter().map(|a| a.name().to_string()).collect();
            tracing::warn!(%key, discarded = ?names, "dropping actions queued after commit");
            self.events.publish(GuardEvent::ReplayDiscarded {
                key: key.to_string(),
                actions: names,
            });
        }

        tracing::info!(
            %key,
            actions = actions.len(),
            commit = commit.is_some(),
            "replaying deferred actions"
        );
        self.events.publish(GuardEvent::ReplayStarted {
            key: key.to_string(),
            actions: actions.len(),
            commit: commit.is_some(),
        });

        let pending = actions.iter().filter(|a| a.has_callback()).count();
        let finish = self.replay_continuation(key, Arc::clone(&instance), commit, done);

        // One extra count held until every action has been dispatched
        let latch = CountdownLatch::new(pending + 1, finish);
        self.arm_timeout(&latch);

        for mut action in actions {
            let callback = action.take_callback().map(|original| {
                let latch = latch.clone();
                Arc::new(move |result: ActionResult| {
                    original(result);
                    latch.count_down();
                }) as Callback
            });
            action.invoke_with(&instance, callback);
        }

        latch.count_down();
    }

    fn replay_continuation<F>(
        &self,
        key: BatchKey,
        instance: SharedInstance,
        commit: Option<Action>,
        done: F,
    ) -> impl FnOnce(Result<(), InstanceError>) + Send + 'static
    where
        F: FnOnce(Result<(), InstanceError>) + Send + 'static,
    {
        let events = self.events.clone();

        move |result| {
            let finish = move |result: Result<(), InstanceError>| {
                events.publish(GuardEvent::ReplayFinished {
                    key: key.to_string(),
                    error: result.as_ref().err().map(ToString::to_string),
                });
                done(result)
            };

            match (result, commit) {
                (Ok(()), Some(commit)) => {
                    let commit_callback = commit.callback().cloned();
                    instance.commit_batch(Box::new(move |committed| {
                        if let Some(callback) = commit_callback {
                            callback(committed.clone().map(|()| Value::Null));
                        }
                        finish(committed)
                    }));
                }
                (result, _) => finish(result),
            }
        }
    }

    // === Resolution ===

    /// Refresh every live instance under `key`, then call `done`
    ///
    /// The first refresh error goes straight to `done`; outcomes of refreshes
    /// still in flight are ignored afterwards.
    pub fn notify_batch_committed<F>(&self, key: &str, done: F)
    where
        F: FnOnce(Result<(), InstanceError>) + Send + 'static,
    {
        let key = BatchKey::from(key);
        let instances = self.live_instances(&key);
        let count = instances.len();
        let events = self.events.clone();
        let event_key = key.to_string();

        let resolved = move |result: Result<(), InstanceError>| {
            events.publish(GuardEvent::BatchResolved {
                key: event_key,
                instances: count,
                error: result.as_ref().err().map(ToString::to_string),
            });
            done(result)
        };

        if instances.is_empty() {
            tracing::debug!(%key, "no live instances to refresh");
            return resolved(Ok(()));
        }

        tracing::info!(%key, instances = count, "refreshing instances");
        let latch = CountdownLatch::new(count, resolved);
        self.arm_timeout(&latch);

        for instance in instances {
            let latch = latch.clone();
            let key = key.clone();
            instance.refresh(Box::new(move |result| match result {
                Ok(()) => latch.count_down(),
                Err(error) => {
                    tracing::error!(%key, %error, "refresh failed");
                    latch.fail(error)
                }
            }));
        }
    }

    /// Cancellation is resolved exactly like a commit
    pub fn notify_batch_cancelled<F>(&self, key: &str, done: F)
    where
        F: FnOnce(Result<(), InstanceError>) + Send + 'static,
    {
        self.notify_batch_committed(key, done)
    }

    /// Fail `latch` after the configured timeout, if any
    fn arm_timeout(&self, latch: &CountdownLatch) {
        let Some(after) = self.config.resolution_timeout else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(?after, "no tokio runtime, resolution timeout not armed");
            return;
        };

        let latch = latch.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = latch.finished() => {}
                _ = tokio::time::sleep(after) => {
                    if !latch.is_done() {
                        tracing::warn!(?after, remaining = latch.remaining(), "resolution timed out");
                        latch.fail(InstanceError::TimedOut { after });
                    }
                }
            }
        });
    }

    // === Introspection ===

    /// Names of actions queued for `instance` under `key`, in replay order
    pub fn pending_actions(&self, key: &str, instance: &SharedInstance) -> Vec<String> {
        self.lock()
            .ledger
            .pending_actions(&BatchKey::from(key), instance)
    }

    pub fn admission_index(&self, key: &str, instance: &SharedInstance) -> Option<usize> {
        self.lock()
            .ledger
            .admission_index(&BatchKey::from(key), instance)
    }

    /// Number of instances owed a replay under `key`
    pub fn queued_instances(&self, key: &str) -> usize {
        self.lock().ledger.queued_instances(&BatchKey::from(key))
    }

    /// Registrations under `key`, absent markers and not-yet-pruned
    /// collected handles included
    pub fn registered_count(&self, key: &str) -> usize {
        self.lock().registry.len(&BatchKey::from(key))
    }

    pub fn subscribe(&self) -> GuardEventReceiver {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
