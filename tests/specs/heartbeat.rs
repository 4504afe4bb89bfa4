// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::Harness;
use cnapi_core::{ServerStatus, ServerUuid};
use std::time::Duration;

const S1: &str = "11111111-0000-4000-8000-000000000001";

#[tokio::test]
async fn new_server_is_promoted_to_running() {
    let harness = Harness::new();
    let replica = harness.replica();
    let uuid = ServerUuid::new(S1);

    replica.runtime.heartbeat(&uuid).await.unwrap();
    replica.runtime.reconcile_once().await;

    let record = replica.runtime.servers.get(&uuid).await.unwrap();
    assert_eq!(record.status, ServerStatus::Running);

    let entry = replica.runtime.registry.get(&uuid).unwrap();
    assert!(entry.last_status_update_ms.is_some());
    assert_eq!(replica.runtime.metrics_snapshot().new_heartbeaters_total, 1);
}

#[tokio::test]
async fn silent_server_goes_unknown_and_leaves_the_registry() {
    let harness = Harness::new();
    let replica = harness.replica();
    let uuid = ServerUuid::new(S1);

    replica.runtime.heartbeat(&uuid).await.unwrap();
    replica.runtime.reconcile_once().await;

    // Heartbeats stop; pass the lifetime plus a reconcile period.
    harness.clock.advance(Duration::from_secs(16));
    replica.runtime.reconcile_once().await;

    let record = replica.runtime.servers.get(&uuid).await.unwrap();
    assert_eq!(record.status, ServerStatus::Unknown);
    assert!(replica.runtime.registry.get(&uuid).is_none());

    // The next heartbeat brings it straight back.
    replica.runtime.heartbeat(&uuid).await.unwrap();
    replica.runtime.reconcile_once().await;
    let record = replica.runtime.servers.get(&uuid).await.unwrap();
    assert_eq!(record.status, ServerStatus::Running);
}

#[tokio::test]
async fn replica_losing_a_server_stops_writing_its_row() {
    let harness = Harness::new();
    let a = harness.replica();
    let b = harness.replica();
    let uuid = ServerUuid::new(S1);

    // Replica A owns the server first.
    a.runtime.heartbeat(&uuid).await.unwrap();
    a.runtime.reconcile_once().await;

    // The agent moves to replica B and keeps heartbeating there.
    harness.clock.advance(Duration::from_secs(12));
    b.runtime.heartbeat(&uuid).await.unwrap();
    b.runtime.reconcile_once().await;
    let running = b.runtime.servers.get(&uuid).await.unwrap();
    assert_eq!(running.status, ServerStatus::Running);

    // A's view is now stale; its next sweep must notice the takeover,
    // drop the server, and leave B's row untouched.
    a.runtime.reconcile_once().await;
    assert!(a.runtime.registry.get(&uuid).is_none());
    assert_eq!(a.runtime.metrics_snapshot().usurped_heartbeaters_total, 1);

    let record = b.runtime.servers.get(&uuid).await.unwrap();
    assert_eq!(record.status, ServerStatus::Running);
}

#[tokio::test]
async fn status_flaps_only_with_heartbeats_not_writes() {
    let harness = Harness::new();
    let replica = harness.replica();
    let uuid = ServerUuid::new(S1);

    replica.runtime.heartbeat(&uuid).await.unwrap();
    replica.runtime.reconcile_once().await;
    let first_puts = replica.runtime.metrics_snapshot().status_put_attempts_total;

    // Steady heartbeats inside the lifetime produce no further writes.
    for _ in 0..3 {
        harness.clock.advance(Duration::from_secs(5));
        replica.runtime.heartbeat(&uuid).await.unwrap();
        replica.runtime.reconcile_once().await;
    }
    assert_eq!(replica.runtime.metrics_snapshot().status_put_attempts_total, first_puts);
}
