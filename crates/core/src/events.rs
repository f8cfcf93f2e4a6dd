// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guard events and their delivery to subscribers

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Sender for event delivery
pub type GuardEventSender = mpsc::UnboundedSender<GuardEvent>;
/// Receiver for event delivery
pub type GuardEventReceiver = mpsc::UnboundedReceiver<GuardEvent>;

/// Observable steps of batch coordination
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GuardEvent {
    ActionDeferred {
        key: String,
        action: String,
        admission_index: usize,
    },
    ReplayStarted {
        key: String,
        actions: usize,
        commit: bool,
    },
    /// Actions queued after a commit, dropped without running
    ReplayDiscarded {
        key: String,
        actions: Vec<String>,
    },
    ReplayFinished {
        key: String,
        error: Option<String>,
    },
    BatchResolved {
        key: String,
        instances: usize,
        error: Option<String>,
    },
}

impl GuardEvent {
    pub fn name(&self) -> String {
        match self {
            GuardEvent::ActionDeferred { .. } => "action:deferred".to_string(),
            GuardEvent::ReplayStarted { .. } => "replay:started".to_string(),
            GuardEvent::ReplayDiscarded { .. } => "replay:discarded".to_string(),
            GuardEvent::ReplayFinished { .. } => "replay:finished".to_string(),
            GuardEvent::BatchResolved { .. } => "batch:resolved".to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            GuardEvent::ActionDeferred { key, .. }
            | GuardEvent::ReplayStarted { key, .. }
            | GuardEvent::ReplayDiscarded { key, .. }
            | GuardEvent::ReplayFinished { key, .. }
            | GuardEvent::BatchResolved { key, .. } => key,
        }
    }
}

/// Fan-out of guard events to every live subscriber
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<GuardEventSender>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> GuardEventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Deliver to all subscribers, forgetting those whose receiver is gone
    pub fn publish(&self, event: GuardEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
