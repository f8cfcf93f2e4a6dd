// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Countdown latch over callback completions
//!
//! Joins a dynamic number of asynchronous completions into one continuation.
//! Callers increment before dispatching work and count down as each piece
//! completes; the continuation runs once, either when the count reaches zero
//! or on the first failure.

use crate::instance::InstanceError;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Continuation fired when the latch opens
pub type LatchContinuation = Box<dyn FnOnce(Result<(), InstanceError>) + Send>;

struct LatchState {
    remaining: usize,
    on_done: Option<LatchContinuation>,
}

/// Shared countdown latch; clones refer to the same counter
#[derive(Clone)]
pub struct CountdownLatch {
    state: Arc<Mutex<LatchState>>,
    finished: Arc<Notify>,
}

impl CountdownLatch {
    /// Create a latch expecting `count` completions
    ///
    /// A latch created with zero never fires on its own; hold one extra count
    /// while dispatching and release it with `count_down` afterwards.
    pub fn new<F>(count: usize, on_done: F) -> Self
    where
        F: FnOnce(Result<(), InstanceError>) + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(LatchState {
                remaining: count,
                on_done: Some(Box::new(on_done)),
            })),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Expect `n` more completions
    pub fn increment(&self, n: usize) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.remaining += n;
    }

    /// Record one completion; fires the continuation when the count hits zero
    pub fn count_down(&self) {
        let fire = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.remaining = state.remaining.saturating_sub(1);
            if state.remaining == 0 {
                state.on_done.take()
            } else {
                None
            }
        };

        if let Some(on_done) = fire {
            self.finished.notify_one();
            on_done(Ok(()));
        }
    }

    /// Fire the continuation with `error` unless it already ran
    ///
    /// Later completions still count down but no longer reach anyone.
    pub fn fail(&self, error: InstanceError) {
        let fire = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .on_done
            .take();

        match fire {
            Some(on_done) => {
                self.finished.notify_one();
                on_done(Err(error))
            }
            None => tracing::trace!(%error, "latch already resolved, dropping error"),
        }
    }

    /// Resolves once the continuation has been taken
    ///
    /// Single waiter: the signal is stored if the latch fires first.
    pub async fn finished(&self) {
        self.finished.notified().await
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).remaining
    }

    /// Whether the continuation has already run
    pub fn is_done(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .on_done
            .is_none()
    }
}

impl std::fmt::Debug for CountdownLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownLatch")
            .field("remaining", &self.remaining())
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
#[path = "latch_tests.rs"]
mod tests;
