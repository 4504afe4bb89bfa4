// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::Harness;
use cnapi_core::{utc_from_epoch_ms, Clock, ServerUuid, TicketStatus};
use cnapi_engine::{CreateTicketParams, TicketWaitError};
use std::time::Duration;

const S1: &str = "22222222-0000-4000-8000-000000000001";

fn params(harness: &Harness, scope: &str, id: &str, expires_in: Duration) -> CreateTicketParams {
    CreateTicketParams {
        server_uuid: ServerUuid::new(S1),
        scope: scope.to_string(),
        id: id.to_string(),
        expires_at: utc_from_epoch_ms(harness.clock.epoch_ms() + expires_in.as_millis() as u64),
        action: None,
        reqid: None,
        extra: serde_json::Value::Null,
    }
}

#[tokio::test]
async fn second_ticket_queues_and_activates_on_release() {
    let harness = Harness::new();
    let replica = harness.replica();
    let waitlist = &replica.runtime.waitlist;

    let (first, queue) =
        waitlist.create_ticket(params(&harness, "vm", "V1", Duration::from_secs(60))).await.unwrap();
    assert_eq!(queue[0].status, TicketStatus::Active);

    harness.clock.advance(Duration::from_millis(20));
    let (second, queue) =
        waitlist.create_ticket(params(&harness, "vm", "V1", Duration::from_secs(60))).await.unwrap();
    let mine = queue.iter().find(|t| t.uuid == second).unwrap();
    assert_eq!(mine.status, TicketStatus::Queued);

    waitlist.release_ticket(&first).await.unwrap();

    // One director tick surfaces the activation to waiters.
    let rx = replica.runtime.director.wait_for_ticket(&second).await.unwrap();
    replica.runtime.director.check_once().await.unwrap();
    assert_eq!(rx.await.unwrap(), Ok(()));
    assert_eq!(waitlist.get_ticket(&second).await.unwrap().status, TicketStatus::Active);
}

#[tokio::test]
async fn expiry_fires_every_waiter_exactly_once() {
    let harness = Harness::new();
    let replica = harness.replica();
    let waitlist = &replica.runtime.waitlist;
    let director = &replica.runtime.director;

    let (_holder, _) =
        waitlist.create_ticket(params(&harness, "vm", "V1", Duration::from_secs(600))).await.unwrap();
    harness.clock.advance(Duration::from_millis(20));
    let (queued, _) =
        waitlist.create_ticket(params(&harness, "vm", "V1", Duration::from_secs(1))).await.unwrap();

    let rx1 = director.wait_for_ticket(&queued).await.unwrap();
    let rx2 = director.wait_for_ticket(&queued).await.unwrap();

    harness.clock.advance(Duration::from_secs(2));
    director.check_once().await.unwrap();

    assert_eq!(rx1.await.unwrap(), Err(TicketWaitError::Expired));
    assert_eq!(rx2.await.unwrap(), Err(TicketWaitError::Expired));
    assert_eq!(director.waiter_count(), 0);
    assert_eq!(waitlist.get_ticket(&queued).await.unwrap().status, TicketStatus::Expired);
}

#[tokio::test]
async fn activation_follows_creation_order() {
    let harness = Harness::new();
    let replica = harness.replica();
    let waitlist = &replica.runtime.waitlist;

    let mut uuids = Vec::new();
    for _ in 0..4 {
        harness.clock.advance(Duration::from_millis(20));
        let (uuid, _) = waitlist
            .create_ticket(params(&harness, "vm", "V1", Duration::from_secs(600)))
            .await
            .unwrap();
        uuids.push(uuid);
    }

    // Release each active holder in turn; activation must walk the queue
    // in creation order with never more than one active ticket.
    for i in 0..uuids.len() {
        let pending = waitlist.pending_tickets(&ServerUuid::new(S1), "vm", "V1").await.unwrap();
        let active: Vec<_> =
            pending.iter().filter(|t| t.status == TicketStatus::Active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].uuid, uuids[i]);
        waitlist.release_ticket(&uuids[i]).await.unwrap();
    }

    let pending = waitlist.pending_tickets(&ServerUuid::new(S1), "vm", "V1").await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn locks_are_independent_per_scope_and_id() {
    let harness = Harness::new();
    let replica = harness.replica();
    let waitlist = &replica.runtime.waitlist;

    let (a, _) =
        waitlist.create_ticket(params(&harness, "vm", "V1", Duration::from_secs(60))).await.unwrap();
    harness.clock.advance(Duration::from_millis(20));
    let (b, _) =
        waitlist.create_ticket(params(&harness, "vm", "V2", Duration::from_secs(60))).await.unwrap();
    harness.clock.advance(Duration::from_millis(20));
    let (c, _) = waitlist
        .create_ticket(params(&harness, "dataset", "V1", Duration::from_secs(60)))
        .await
        .unwrap();

    for uuid in [&a, &b, &c] {
        assert_eq!(waitlist.get_ticket(uuid).await.unwrap().status, TicketStatus::Active);
    }
}

#[tokio::test]
async fn created_ticket_round_trips() {
    let harness = Harness::new();
    let replica = harness.replica();
    let mut p = params(&harness, "vm", "V1", Duration::from_secs(60));
    p.action = Some("provision".to_string());
    p.extra = serde_json::json!({ "owner": "operator" });

    let (uuid, _) = replica.runtime.waitlist.create_ticket(p.clone()).await.unwrap();
    let ticket = replica.runtime.waitlist.get_ticket(&uuid).await.unwrap();

    assert_eq!(ticket.server_uuid, p.server_uuid);
    assert_eq!(ticket.scope, p.scope);
    assert_eq!(ticket.id, p.id);
    assert_eq!(ticket.expires_at, p.expires_at);
    assert_eq!(ticket.action, p.action);
    assert_eq!(ticket.extra, p.extra);
    assert_eq!(ticket.status, TicketStatus::Active);
}
