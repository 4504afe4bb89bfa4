// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle_until, Harness};
use cnapi_core::test_support::ServerBuilder;
use cnapi_core::{ServerUuid, TaskState};
use cnapi_engine::{DispatchRequest, TaskWaitError};
use cnapi_storage::Store;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const S1: &str = "33333333-0000-4000-8000-000000000001";
const AGENT_IP: &str = "10.9.9.1";

async fn seed_server(harness: &Harness) {
    let record = ServerBuilder::new(S1).setup().agent_ip(AGENT_IP).build();
    harness
        .store
        .put_object(
            cnapi_storage::SERVERS_BUCKET.name,
            S1,
            serde_json::to_value(&record).unwrap(),
            None,
        )
        .await
        .unwrap();
}

fn request() -> DispatchRequest {
    DispatchRequest {
        task: "machine_create".to_string(),
        params: json!({ "ram": 512 }),
        server_uuid: ServerUuid::new(S1),
        req_id: None,
        persist: true,
    }
}

#[tokio::test(start_paused = true)]
async fn result_is_cached_for_late_waiters_then_evicted() {
    let harness = Harness::new();
    let replica = harness.replica();
    seed_server(&harness).await;
    harness.agents.respond_ok(AGENT_IP, json!({ "vm_uuid": "v-1" }));

    let dispatched = replica.runtime.tasks.dispatch(request()).await.unwrap();
    let task_id = dispatched.status.id.clone();
    dispatched.completion.await.unwrap().unwrap();

    // Completion happened with nobody waiting: a later wait is served
    // immediately from the cache.
    let status =
        replica.runtime.tasks.wait_for_task(&task_id, Duration::from_secs(30)).await.unwrap();
    assert_eq!(status.status, TaskState::Complete);

    // After the cleanup window the cache entry is gone.
    tokio::time::sleep(Duration::from_secs(3601)).await;
    assert!(!replica.runtime.tasks.has_cached_result(&task_id));
}

#[tokio::test(start_paused = true)]
async fn wait_times_out_and_completion_is_cached_afterwards() {
    let harness = Harness::new();
    let replica = harness.replica();
    seed_server(&harness).await;
    harness.agents.stall(AGENT_IP, json!({ "late": true }));

    let dispatched = replica.runtime.tasks.dispatch(request()).await.unwrap();
    let task_id = dispatched.status.id.clone();

    let result = replica.runtime.tasks.wait_for_task(&task_id, Duration::from_secs(2)).await;
    assert!(matches!(result, Err(TaskWaitError::Timeout)));
    assert_eq!(replica.runtime.tasks.waiter_count(), 0);

    // The task finally finishes with no registrations left: cached.
    harness.agents.release_stalled();
    dispatched.completion.await.unwrap().unwrap();
    assert!(replica.runtime.tasks.has_cached_result(&task_id));
}

#[tokio::test(start_paused = true)]
async fn many_waiters_one_result() {
    let harness = Harness::new();
    let replica = harness.replica();
    seed_server(&harness).await;
    harness.agents.stall(AGENT_IP, json!({ "done": true }));

    let dispatched = replica.runtime.tasks.dispatch(request()).await.unwrap();
    assert_eq!(dispatched.status.status, TaskState::Active);
    let task_id = dispatched.status.id.clone();

    let mut waits = Vec::new();
    for _ in 0..5 {
        let tasks = Arc::clone(&replica.runtime.tasks);
        let id = task_id.clone();
        waits.push(tokio::spawn(async move {
            tasks.wait_for_task(&id, Duration::from_secs(3600)).await
        }));
    }
    {
        let tasks = Arc::clone(&replica.runtime.tasks);
        settle_until(move || tasks.waiter_count() == 5).await;
    }

    harness.agents.release_stalled();

    for wait in waits {
        let status = wait.await.unwrap().unwrap();
        assert_eq!(status.status, TaskState::Complete);
    }

    // The durable record reflects the terminal state with its history.
    let stored = replica.runtime.tasks.get_task(&task_id).await.unwrap();
    assert_eq!(stored.status, TaskState::Complete);
    assert_eq!(stored.history.len(), 1);
    assert_eq!(stored.history[0].name, "finish");
}

#[tokio::test]
async fn agent_failure_reaches_waiters_as_failure_status() {
    let harness = Harness::new();
    let replica = harness.replica();
    seed_server(&harness).await;
    harness.agents.respond_unreachable(AGENT_IP, "no route to host");

    let dispatched = replica.runtime.tasks.dispatch(request()).await.unwrap();
    let task_id = dispatched.status.id.clone();

    let err = dispatched.completion.await.unwrap().unwrap_err();
    assert!(err.contains("no route to host"));

    let status =
        replica.runtime.tasks.wait_for_task(&task_id, Duration::from_secs(30)).await.unwrap();
    assert_eq!(status.status, TaskState::Failure);
}
