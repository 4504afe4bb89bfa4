// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local map of recently heartbeating servers.
//!
//! The heartbeat handler is the only writer of `last_heartbeat_ms`; the
//! reconciler is the only writer of `last_status_update_ms` and the only
//! deleter. Everything durable lives in the status bucket, not here.

use cnapi_core::{HeartbeatMetrics, ServerUuid};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatEntry {
    pub last_heartbeat_ms: u64,
    /// Unset until this replica's reconciler first claims the server.
    pub last_status_update_ms: Option<u64>,
}

pub struct HeartbeatRegistry {
    entries: Mutex<HashMap<ServerUuid, HeartbeatEntry>>,
    metrics: Arc<HeartbeatMetrics>,
}

impl HeartbeatRegistry {
    pub fn new(metrics: Arc<HeartbeatMetrics>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), metrics }
    }

    /// Record a heartbeat. Returns true when the server is new to this
    /// replica.
    pub fn touch(&self, uuid: &ServerUuid, now_ms: u64) -> bool {
        let mut entries = self.entries.lock();
        let first_seen = match entries.get_mut(uuid) {
            Some(entry) => {
                entry.last_heartbeat_ms = now_ms;
                false
            }
            None => {
                entries.insert(
                    uuid.clone(),
                    HeartbeatEntry { last_heartbeat_ms: now_ms, last_status_update_ms: None },
                );
                true
            }
        };
        self.metrics.set_registry_size(entries.len());
        first_seen
    }

    /// Record a successful StatusRow write. No-op if the entry is gone
    /// (a racing heartbeat may re-create it later).
    pub fn mark_status_update(&self, uuid: &ServerUuid, now_ms: u64) {
        if let Some(entry) = self.entries.lock().get_mut(uuid) {
            entry.last_status_update_ms = Some(now_ms);
        }
    }

    pub fn remove(&self, uuid: &ServerUuid) {
        let mut entries = self.entries.lock();
        entries.remove(uuid);
        self.metrics.set_registry_size(entries.len());
    }

    pub fn get(&self, uuid: &ServerUuid) -> Option<HeartbeatEntry> {
        self.entries.lock().get(uuid).copied()
    }

    /// Stable-ordered copy for the reconciler's serial sweep.
    pub fn snapshot(&self) -> Vec<(ServerUuid, HeartbeatEntry)> {
        let mut entries: Vec<_> =
            self.entries.lock().iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
