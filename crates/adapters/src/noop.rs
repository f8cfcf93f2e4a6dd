// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op instance for keys that need a placeholder participant.

use batchguard_core::{BatchInstance, Completion};

/// Instance that never opens a batch.
///
/// Commits and refreshes complete immediately. Useful to keep a key's
/// registry populated without affecting admission.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpInstance;

impl NoOpInstance {
    pub fn new() -> Self {
        Self
    }
}

impl BatchInstance for NoOpInstance {
    fn begin_batch(&self) {}

    fn batch_in_progress(&self) -> bool {
        false
    }

    fn commit_batch(&self, done: Completion) {
        done(Ok(()))
    }

    fn refresh(&self, done: Completion) {
        done(Ok(()))
    }
}
