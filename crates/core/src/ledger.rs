// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-action ledger and admission queue
//!
//! Per key, a FIFO of blocked instances, each owning the ordered list of
//! actions deferred on its behalf. An instance's admission index is its
//! position in that FIFO.

use crate::action::Action;
use crate::instance::{same_instance, SharedInstance};
use crate::key::BatchKey;
use std::collections::{HashMap, VecDeque};

/// One blocked instance and the actions it is owed
pub struct PendingEntry {
    pub instance: SharedInstance,
    pub actions: Vec<Action>,
}

impl PendingEntry {
    /// Split the queue into the actions to replay and an optional commit
    ///
    /// Actions after the first commit are returned separately as stale.
    pub fn into_replay(self) -> ReplayPlan {
        let PendingEntry {
            instance,
            mut actions,
        } = self;

        match actions.iter().position(Action::is_commit) {
            Some(at) => {
                let stale = actions.split_off(at + 1);
                let commit = actions.pop();
                ReplayPlan {
                    instance,
                    actions,
                    commit,
                    stale,
                }
            }
            None => ReplayPlan {
                instance,
                actions,
                commit: None,
                stale: Vec::new(),
            },
        }
    }
}

/// Ordered replay of one admission entry
pub struct ReplayPlan {
    pub instance: SharedInstance,
    /// Non-commit actions, in enqueue order
    pub actions: Vec<Action>,
    pub commit: Option<Action>,
    /// Queued after the commit; never replayed
    pub stale: Vec<Action>,
}

#[derive(Default)]
pub struct Ledger {
    queues: HashMap<BatchKey, VecDeque<PendingEntry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `action` to its caller's queue, admitting the caller if needed
    ///
    /// Returns the caller's admission index.
    pub fn defer(&mut self, key: &BatchKey, action: Action) -> usize {
        let queue = self.queues.entry(key.clone()).or_default();

        if let Some(index) = queue
            .iter()
            .position(|entry| same_instance(&entry.instance, action.caller()))
        {
            queue[index].actions.push(action);
            return index;
        }

        queue.push_back(PendingEntry {
            instance: action.caller().clone(),
            actions: vec![action],
        });
        queue.len() - 1
    }

    /// Remove the longest-waiting instance under `key`
    pub fn pop_front(&mut self, key: &BatchKey) -> Option<PendingEntry> {
        let queue = self.queues.get_mut(key)?;
        let entry = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(key);
        }
        entry
    }

    pub fn admission_index(&self, key: &BatchKey, instance: &SharedInstance) -> Option<usize> {
        self.queues
            .get(key)?
            .iter()
            .position(|entry| same_instance(&entry.instance, instance))
    }

    /// Names of the actions queued for `instance`, in replay order
    pub fn pending_actions(&self, key: &BatchKey, instance: &SharedInstance) -> Vec<String> {
        self.queues
            .get(key)
            .and_then(|queue| {
                queue
                    .iter()
                    .find(|entry| same_instance(&entry.instance, instance))
            })
            .map(|entry| entry.actions.iter().map(|a| a.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Number of instances owed a replay under `key`
    pub fn queued_instances(&self, key: &BatchKey) -> usize {
        self.queues.get(key).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
