// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract implemented by every instance that participates in batch coordination

use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by instances through their completion callbacks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("refresh failed: {0}")]
    RefreshFailed(String),
    #[error("commit failed: {0}")]
    CommitFailed(String),
    #[error("action {action} failed: {message}")]
    ActionFailed { action: String, message: String },
    #[error("timed out after {after:?} waiting for completions")]
    TimedOut { after: Duration },
}

/// Single-shot completion for `commit_batch` and `refresh`
pub type Completion = Box<dyn FnOnce(Result<(), InstanceError>) + Send>;

/// An object whose mutations must not interleave with another instance's open batch
pub trait BatchInstance: Send + Sync {
    /// Open a batch scoped to this instance
    fn begin_batch(&self);

    /// Whether this instance currently owns an open batch
    fn batch_in_progress(&self) -> bool;

    /// Resolve the open batch, then call `done`
    fn commit_batch(&self, done: Completion);

    /// Reload externally visible state, then call `done`
    fn refresh(&self, done: Completion);
}

impl<T: BatchInstance + ?Sized> BatchInstance for Arc<T> {
    fn begin_batch(&self) {
        (**self).begin_batch()
    }

    fn batch_in_progress(&self) -> bool {
        (**self).batch_in_progress()
    }

    fn commit_batch(&self, done: Completion) {
        (**self).commit_batch(done)
    }

    fn refresh(&self, done: Completion) {
        (**self).refresh(done)
    }
}

/// Shared, owning reference to an instance
pub type SharedInstance = Arc<dyn BatchInstance>;

/// Identity comparison; ignores vtable metadata
pub fn same_instance(a: &SharedInstance, b: &SharedInstance) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Non-owning handle stored in the registry
///
/// `Absent` records a registration made without an instance. A `Weak` whose
/// instance has been dropped also resolves to nothing.
#[derive(Clone)]
pub enum InstanceHandle {
    Weak(Weak<dyn BatchInstance>),
    Absent,
}

impl InstanceHandle {
    pub fn new(instance: Option<&SharedInstance>) -> Self {
        match instance {
            Some(instance) => InstanceHandle::Weak(Arc::downgrade(instance)),
            None => InstanceHandle::Absent,
        }
    }

    /// Upgrade to a strong reference if the instance is still alive
    pub fn resolve(&self) -> Option<SharedInstance> {
        match self {
            InstanceHandle::Weak(weak) => weak.upgrade(),
            InstanceHandle::Absent => None,
        }
    }

    /// True once the referenced instance has been dropped
    pub fn is_collected(&self) -> bool {
        match self {
            InstanceHandle::Weak(weak) => weak.strong_count() == 0,
            InstanceHandle::Absent => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn refers_to(&self, instance: &SharedInstance) -> bool {
        match self {
            InstanceHandle::Weak(weak) => std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(instance)),
            InstanceHandle::Absent => false,
        }
    }

    fn same_handle(&self, other: &InstanceHandle) -> bool {
        match (self, other) {
            (InstanceHandle::Weak(a), InstanceHandle::Weak(b)) => {
                std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
            }
            (InstanceHandle::Absent, InstanceHandle::Absent) => true,
            _ => false,
        }
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_handle(other)
    }
}

impl std::fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceHandle::Weak(weak) if weak.strong_count() > 0 => write!(f, "Weak(live)"),
            InstanceHandle::Weak(_) => write!(f, "Weak(collected)"),
            InstanceHandle::Absent => write!(f, "Absent"),
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
