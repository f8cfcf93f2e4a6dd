// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! batchguard-core: batch coordination among instances sharing a key
//!
//! This crate provides:
//! - `BatchGuard` - defers other instances' actions while a batch is open,
//!   replays them in admission order once the batch resolves
//! - `CountdownLatch` - joins a dynamic number of callback completions
//! - The `BatchInstance` contract that coordinated instances implement

pub mod action;
pub mod config;
pub mod events;
pub mod guard;
pub mod instance;
pub mod key;
pub mod latch;
pub mod ledger;
pub mod registry;

#[cfg(test)]
mod testing;

// Re-exports
pub use action::{Action, ActionKind, ActionOutput, ActionResult, Callback, COMMIT_BATCH};
pub use config::{ConfigError, GuardConfig};
pub use events::{EventBus, GuardEvent, GuardEventReceiver};
pub use guard::{BatchGuard, Dispatch};
pub use instance::{
    same_instance, BatchInstance, Completion, InstanceError, InstanceHandle, SharedInstance,
};
pub use key::BatchKey;
pub use latch::CountdownLatch;
