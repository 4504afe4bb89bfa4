// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_tracks_wall_time() {
    let clock = SystemClock;
    let first = clock.epoch_ms();
    assert!(first > 0);
    std::thread::sleep(Duration::from_millis(2));
    assert!(clock.epoch_ms() > first);
}

#[test]
fn manual_clock_advances_by_duration() {
    let clock = ManualClock::at_epoch_ms(10_000);
    clock.advance(Duration::from_secs(60));
    assert_eq!(clock.epoch_ms(), 70_000);
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::new();
    let other = clock.clone();
    let before = clock.epoch_ms();
    other.advance(Duration::from_secs(30));
    assert_eq!(clock.epoch_ms(), before + 30_000);
}

#[test]
fn manual_clock_set_overrides_the_instant() {
    let clock = ManualClock::new();
    clock.set_epoch_ms(42_000);
    assert_eq!(clock.epoch_ms(), 42_000);
}

#[test]
fn now_utc_is_the_epoch_ms_instant() {
    let clock = ManualClock::at_epoch_ms(0);
    assert_eq!(clock.now_utc().to_rfc3339(), "1970-01-01T00:00:00+00:00");

    clock.advance(Duration::from_millis(1_500));
    assert_eq!(crate::time_fmt::epoch_ms_from_utc(clock.now_utc()), 1_500);
}
