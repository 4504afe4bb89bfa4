// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! A typed TOML file; every recognized key is a struct field and anything
//! else is a load error. A missing file yields pure defaults so a dev
//! instance starts with no setup.

use cnapi_engine::RuntimeTuning;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Datacenter name stamped onto servers created on first contact.
    pub datacenter: String,
    /// Optional log file; stderr when unset.
    pub log_path: Option<String>,
    pub heartbeat: HeartbeatConfig,
    pub waitlist: WaitlistConfig,
    pub tasks: TasksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datacenter: "default-dc".to_string(),
            log_path: None,
            heartbeat: HeartbeatConfig::default(),
            waitlist: WaitlistConfig::default(),
            tasks: TasksConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HeartbeatConfig {
    pub reconcile_period_secs: u64,
    pub lifetime_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { reconcile_period_secs: 5, lifetime_secs: 11 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WaitlistConfig {
    pub director_period_ms: u64,
    pub cleanup_period_secs: u64,
    pub retention_days: u64,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self { director_period_ms: 500, cleanup_period_secs: 3_600, retention_days: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TasksConfig {
    /// How long the agent may hold a task request open.
    pub agent_timeout_secs: u64,
    pub result_cache_ttl_secs: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self { agent_timeout_secs: 3_600, result_cache_ttl_secs: 3_600 }
    }
}

impl Config {
    /// Load from a TOML file; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Unreadable {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        let mut config: Config = toml::from_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides, applied after the file.
    fn apply_env(&mut self) {
        if let Ok(dc) = std::env::var("CNAPI_DATACENTER") {
            if !dc.is_empty() {
                self.datacenter = dc;
            }
        }
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.tasks.agent_timeout_secs)
    }

    /// The control-loop knobs in the engine's terms.
    pub fn tuning(&self) -> RuntimeTuning {
        RuntimeTuning {
            reconcile_period: Duration::from_secs(self.heartbeat.reconcile_period_secs),
            heartbeat_lifetime: Duration::from_secs(self.heartbeat.lifetime_secs),
            director_period: Duration::from_millis(self.waitlist.director_period_ms),
            ticket_cleanup_period: Duration::from_secs(self.waitlist.cleanup_period_secs),
            ticket_retention: Duration::from_secs(self.waitlist.retention_days * 24 * 3_600),
            task_result_cache_ttl: Duration::from_secs(self.tasks.result_cache_ttl_secs),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
