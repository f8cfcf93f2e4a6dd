// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of instances per key
//!
//! Holds non-owning handles only. Collected handles are pruned when a key is
//! resolved; there is no explicit removal.

use crate::instance::{InstanceHandle, SharedInstance};
use crate::key::BatchKey;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Registry {
    handles: HashMap<BatchKey, Vec<InstanceHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle under `key`; returns false if it was already present
    pub fn insert(&mut self, key: &BatchKey, handle: InstanceHandle) -> bool {
        let handles = self.handles.entry(key.clone()).or_default();
        if handles.iter().any(|h| *h == handle) {
            return false;
        }
        handles.push(handle);
        true
    }

    /// Upgrade every live handle under `key`, dropping collected ones
    pub fn resolve(&mut self, key: &BatchKey) -> Vec<SharedInstance> {
        let Some(handles) = self.handles.get_mut(key) else {
            return Vec::new();
        };

        let before = handles.len();
        handles.retain(|h| !h.is_collected());
        let pruned = before - handles.len();
        if pruned > 0 {
            tracing::debug!(%key, pruned, "pruned collected instances");
        }

        handles.iter().filter_map(InstanceHandle::resolve).collect()
    }

    /// Number of handles under `key`, absent markers included
    pub fn len(&self, key: &BatchKey) -> usize {
        self.handles.get(key).map_or(0, Vec::len)
    }

    #[cfg(test)]
    pub(crate) fn keys(&self) -> Vec<BatchKey> {
        self.handles.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
