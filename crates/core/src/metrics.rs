// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler counters and per-call store statistics.
//!
//! `HeartbeatMetrics` is shared process-wide and read by the daemon's
//! health surface; `UpsertStats` travels with each server-model call so
//! callers can see what the write path actually did.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide heartbeat reconciler counters.
#[derive(Debug, Default)]
pub struct HeartbeatMetrics {
    /// Servers seen by this replica for the first time.
    pub new_heartbeaters: AtomicU64,
    /// Selected because their heartbeat went stale.
    pub stale_heartbeaters: AtomicU64,
    /// Dropped because another replica took the server over.
    pub usurped_heartbeaters: AtomicU64,
    pub status_put_attempts: AtomicU64,
    pub status_put_errors: AtomicU64,
    pub status_put_etag_conflicts: AtomicU64,
    /// Current heartbeat registry cardinality.
    pub registry_size: AtomicU64,
}

impl HeartbeatMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_registry_size(&self, size: usize) {
        self.registry_size.store(size as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            new_heartbeaters_total: self.new_heartbeaters.load(Ordering::Relaxed),
            stale_heartbeaters_total: self.stale_heartbeaters.load(Ordering::Relaxed),
            usurped_heartbeaters_total: self.usurped_heartbeaters.load(Ordering::Relaxed),
            status_put_attempts_total: self.status_put_attempts.load(Ordering::Relaxed),
            status_put_errors_total: self.status_put_errors.load(Ordering::Relaxed),
            status_put_etag_conflicts_total: self.status_put_etag_conflicts.load(Ordering::Relaxed),
            registry_size: self.registry_size.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the reconciler counters, shared with the health
/// surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub new_heartbeaters_total: u64,
    pub stale_heartbeaters_total: u64,
    pub usurped_heartbeaters_total: u64,
    pub status_put_attempts_total: u64,
    pub status_put_errors_total: u64,
    pub status_put_etag_conflicts_total: u64,
    pub registry_size: u64,
}

/// Counters describing one server-model call against the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    pub get_object_attempts: u64,
    pub get_object_errors: u64,
    pub get_object_not_found: u64,
    pub put_object_attempts: u64,
    pub put_object_errors: u64,
    pub put_object_etag_errors: u64,
}

impl UpsertStats {
    pub fn merge(&mut self, other: UpsertStats) {
        self.get_object_attempts += other.get_object_attempts;
        self.get_object_errors += other.get_object_errors;
        self.get_object_not_found += other.get_object_not_found;
        self.put_object_attempts += other.put_object_attempts;
        self.put_object_errors += other.put_object_errors;
        self.put_object_etag_errors += other.put_object_etag_errors;
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
