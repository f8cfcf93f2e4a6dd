// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-crate instance used by unit tests

use crate::action::{Action, ActionResult};
use crate::instance::{BatchInstance, Completion, InstanceError, SharedInstance};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Ordered record of calls across every instance sharing it
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct TestState {
    in_batch: bool,
    refresh_error: Option<InstanceError>,
    held_refreshes: Option<Vec<Completion>>,
}

pub struct TestInstance {
    name: String,
    journal: Journal,
    state: Mutex<TestState>,
}

impl TestInstance {
    pub fn new(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            state: Mutex::new(TestState::default()),
        })
    }

    pub fn shared(this: &Arc<Self>) -> SharedInstance {
        Arc::clone(this) as SharedInstance
    }

    pub fn fail_refresh(&self, error: InstanceError) {
        self.state.lock().unwrap().refresh_error = Some(error);
    }

    /// Keep refresh completions until `release_refreshes`
    pub fn hold_refreshes(&self) {
        self.state.lock().unwrap().held_refreshes = Some(Vec::new());
    }

    pub fn release_refreshes(&self) {
        let held = self.state.lock().unwrap().held_refreshes.take();
        for done in held.unwrap_or_default() {
            done(Ok(()));
        }
    }

    /// A named action that journals `name:action` and completes synchronously
    pub fn action(this: &Arc<Self>, action: &str) -> Action {
        let target = Arc::clone(this);
        let label = format!("{}:{}", this.name, action);
        Action::new(action, &Self::shared(this), move |_, callback| {
            target.journal.push(label);
            if let Some(callback) = callback {
                callback(Ok(Value::Null));
            }
            Value::Null
        })
    }

    /// Same as `action`, with a callback journaling `name:action:cb`
    pub fn action_cb(this: &Arc<Self>, action: &str) -> Action {
        let journal = this.journal.clone();
        let label = format!("{}:{}:cb", this.name, action);
        Self::action(this, action).with_callback(move |result: ActionResult| {
            let suffix = match result {
                Ok(_) => "ok",
                Err(_) => "err",
            };
            journal.push(format!("{label}:{suffix}"));
        })
    }
}

impl BatchInstance for TestInstance {
    fn begin_batch(&self) {
        self.journal.push(format!("{}:begin", self.name));
        self.state.lock().unwrap().in_batch = true;
    }

    fn batch_in_progress(&self) -> bool {
        self.state.lock().unwrap().in_batch
    }

    fn commit_batch(&self, done: Completion) {
        self.journal.push(format!("{}:commit", self.name));
        self.state.lock().unwrap().in_batch = false;
        done(Ok(()))
    }

    fn refresh(&self, done: Completion) {
        self.journal.push(format!("{}:refresh", self.name));
        let mut state = self.state.lock().unwrap();
        if let Some(held) = state.held_refreshes.as_mut() {
            held.push(done);
            return;
        }
        let result = match state.refresh_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        };
        drop(state);
        done(result)
    }
}
