// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guard configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid guard config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for a `BatchGuard`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// How long a refresh broadcast or replay pass may wait on completions
    /// before failing with a timeout. `None` waits forever.
    #[serde(with = "humantime_serde")]
    pub resolution_timeout: Option<Duration>,
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = Some(timeout);
        self
    }

    /// Parse from TOML, e.g. `resolution_timeout = "30s"`
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
