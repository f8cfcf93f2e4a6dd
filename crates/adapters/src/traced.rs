// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced instance wrapper for consistent observability

use batchguard_core::{BatchInstance, Completion};
use std::time::Instant;

/// Wrapper that adds tracing to any BatchInstance
#[derive(Clone)]
pub struct TracedInstance<I> {
    name: String,
    inner: I,
}

impl<I> TracedInstance<I> {
    pub fn new(name: impl Into<String>, inner: I) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

/// Log the outcome of `done`'s operation once it completes
fn timed(op: &'static str, name: &str, done: Completion) -> Completion {
    let name = name.to_string();
    let start = Instant::now();
    Box::new(move |result| {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::info!(instance = %name, elapsed_ms, "{op} complete"),
            Err(e) => tracing::error!(instance = %name, elapsed_ms, error = %e, "{op} failed"),
        }
        done(result)
    })
}

impl<I: BatchInstance> BatchInstance for TracedInstance<I> {
    fn begin_batch(&self) {
        let span = tracing::info_span!("instance.begin_batch", instance = %self.name);
        let _guard = span.enter();

        if self.inner.batch_in_progress() {
            tracing::warn!("batch already open");
        }
        self.inner.begin_batch();
        tracing::info!("batch opened");
    }

    fn batch_in_progress(&self) -> bool {
        let open = self.inner.batch_in_progress();
        tracing::trace!(instance = %self.name, open, "checked");
        open
    }

    fn commit_batch(&self, done: Completion) {
        let span = tracing::info_span!("instance.commit", instance = %self.name);
        let _guard = span.enter();

        tracing::info!("committing");
        self.inner.commit_batch(timed("commit", &self.name, done));
    }

    fn refresh(&self, done: Completion) {
        let span = tracing::info_span!("instance.refresh", instance = %self.name);
        let _guard = span.enter();

        tracing::debug!("refreshing");
        self.inner.refresh(timed("refresh", &self.name, done));
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
