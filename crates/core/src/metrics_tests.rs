// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn snapshot_reflects_increments() {
    let metrics = HeartbeatMetrics::default();
    HeartbeatMetrics::incr(&metrics.new_heartbeaters);
    HeartbeatMetrics::incr(&metrics.new_heartbeaters);
    HeartbeatMetrics::incr(&metrics.usurped_heartbeaters);
    metrics.set_registry_size(7);

    let snap = metrics.snapshot();
    assert_eq!(snap.new_heartbeaters_total, 2);
    assert_eq!(snap.usurped_heartbeaters_total, 1);
    assert_eq!(snap.stale_heartbeaters_total, 0);
    assert_eq!(snap.registry_size, 7);
}

#[test]
fn upsert_stats_merge_adds_fields() {
    let mut a = UpsertStats { get_object_attempts: 1, put_object_attempts: 1, ..Default::default() };
    let b = UpsertStats {
        get_object_attempts: 2,
        put_object_etag_errors: 1,
        ..Default::default()
    };
    a.merge(b);
    assert_eq!(a.get_object_attempts, 3);
    assert_eq!(a.put_object_attempts, 1);
    assert_eq!(a.put_object_etag_errors, 1);
}
