// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action descriptors
//!
//! An action is one invocation against an instance, captured as a closure so
//! it can run now or be replayed later.

use crate::instance::{InstanceError, SharedInstance};
use serde_json::Value;
use std::sync::Arc;

/// Synchronous return value of an action (`Null` for none)
pub type ActionOutput = Value;

/// Outcome passed to an action's trailing callback
pub type ActionResult = Result<ActionOutput, InstanceError>;

/// Trailing completion callback of an action
///
/// Deferred actions call it twice: once with `Ok(Null)` to release the caller
/// and once with the real result when replayed.
pub type Callback = Arc<dyn Fn(ActionResult) + Send + Sync>;

type Target = Box<dyn FnOnce(&SharedInstance, Option<Callback>) -> ActionOutput + Send>;

/// Name used for commit actions in logs and events
pub const COMMIT_BATCH: &str = "commit_batch";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Resolves the caller's batch; always replayed last
    Commit,
    Other,
}

/// A deferrable invocation against the caller instance
pub struct Action {
    name: String,
    kind: ActionKind,
    caller: SharedInstance,
    target: Target,
    callback: Option<Callback>,
}

impl Action {
    /// Build an action from a closure receiving the instance and its callback
    pub fn new<F>(name: impl Into<String>, caller: &SharedInstance, target: F) -> Self
    where
        F: FnOnce(&SharedInstance, Option<Callback>) -> ActionOutput + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: ActionKind::Other,
            caller: Arc::clone(caller),
            target: Box::new(target),
            callback: None,
        }
    }

    /// Commit the caller's batch
    pub fn commit(caller: &SharedInstance) -> Self {
        Self {
            name: COMMIT_BATCH.to_string(),
            kind: ActionKind::Commit,
            caller: Arc::clone(caller),
            target: Box::new(|instance, callback| {
                instance.commit_batch(Box::new(move |result| {
                    if let Some(callback) = callback {
                        callback(result.map(|()| Value::Null));
                    }
                }));
                Value::Null
            }),
            callback: None,
        }
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ActionResult) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn with_shared_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn is_commit(&self) -> bool {
        self.kind == ActionKind::Commit
    }

    pub fn caller(&self) -> &SharedInstance {
        &self.caller
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    /// Run against `instance`, handing the target `callback` in place of the
    /// one stored on the action
    pub(crate) fn invoke_with(
        self,
        instance: &SharedInstance,
        callback: Option<Callback>,
    ) -> ActionOutput {
        (self.target)(instance, callback)
    }

    /// Split off the callback so the caller can wrap it
    pub(crate) fn take_callback(&mut self) -> Option<Callback> {
        self.callback.take()
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
