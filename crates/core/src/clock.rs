// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source for the control plane.
//!
//! Heartbeat staleness, ticket expiry, and task timestamps are all judged
//! against epoch milliseconds, so that is the whole interface: a clock
//! hands out `epoch_ms` and the UTC view for stored records derives from
//! it. Loops and models take a `Clock` parameter so tests steer time
//! instead of sleeping through it.

use crate::time_fmt::utc_from_epoch_ms;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// The same instant as a UTC timestamp, for stored records.
    fn now_utc(&self) -> DateTime<Utc> {
        utc_from_epoch_ms(self.epoch_ms())
    }
}

/// Wall-clock time.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Hand-driven clock for tests. Clones share one underlying instant, so
/// advancing any handle advances them all.
#[derive(Clone)]
pub struct ManualClock {
    epoch_ms: Arc<Mutex<u64>>,
}

impl ManualClock {
    /// Starts at a fixed recent instant so rendered timestamps in
    /// assertions stay stable across runs.
    pub fn new() -> Self {
        Self::at_epoch_ms(1_700_000_000_000)
    }

    pub fn at_epoch_ms(ms: u64) -> Self {
        Self { epoch_ms: Arc::new(Mutex::new(ms)) }
    }

    pub fn advance(&self, duration: Duration) {
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }

    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
