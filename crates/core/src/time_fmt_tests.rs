// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn epoch_ms_round_trips() {
    let ms = 1_700_000_123_456;
    assert_eq!(epoch_ms_from_utc(utc_from_epoch_ms(ms)), ms);
}

#[test]
fn renders_rfc3339() {
    let dt = utc_from_epoch_ms(0);
    assert_eq!(dt.to_rfc3339(), "1970-01-01T00:00:00+00:00");
}

#[test]
fn negative_timestamps_clamp_to_zero() {
    let dt = utc_from_epoch_ms(0) - chrono::Duration::days(1);
    assert_eq!(epoch_ms_from_utc(dt), 0);
}
