// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epoch-millisecond to UTC timestamp conversions.
//!
//! The clock hands out `u64` epoch milliseconds; stored records carry
//! `chrono::DateTime<Utc>` serialized as RFC 3339. These helpers are the
//! single crossing point between the two.

use chrono::{DateTime, TimeZone, Utc};

/// Convert clock epoch milliseconds to a UTC timestamp.
///
/// Out-of-range values (far future beyond chrono's representable span)
/// clamp to the epoch; the clock never produces them in practice.
pub fn utc_from_epoch_ms(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Convert a UTC timestamp back to epoch milliseconds, clamping at zero.
pub fn epoch_ms_from_utc(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_millis().max(0) as u64
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
