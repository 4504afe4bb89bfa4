// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatcher.
//!
//! `dispatch` hands the task to the node's agent in the background and
//! returns the initial record immediately. Any number of callers can then
//! block on the task id; completion resolves them all exactly once, and a
//! completion with nobody waiting parks the result in a cache so a late
//! waiter inside the cleanup window still sees it.

use crate::context::Context;
use crate::error::ModelError;
use crate::server_model::ServerModel;
use cnapi_core::{Clock, ServerUuid, TaskId, TaskStatus};
use cnapi_storage::TASKS_BUCKET;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// How long callers wait on a task by default.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// How long a completed task's result stays cached for late waiters.
pub const DEFAULT_RESULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("server {0} has no agent endpoint in sysinfo")]
    NoAgentEndpoint(ServerUuid),
}

/// Why a `wait_for_task` call resolved without a result.
#[derive(Debug, Error)]
pub enum TaskWaitError {
    #[error("timed out waiting for task")]
    Timeout,
    /// The dispatcher went away mid-wait (shutdown).
    #[error("task wait abandoned")]
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub task: String,
    pub params: serde_json::Value,
    pub server_uuid: ServerUuid,
    pub req_id: Option<String>,
    /// Record the task's lifecycle in the store.
    pub persist: bool,
}

/// What `dispatch` hands back: the initial record plus a channel that
/// resolves with the agent's raw response (or error detail) once the HTTP
/// call finishes. Dropping the channel is fine.
#[derive(Debug)]
pub struct DispatchedTask {
    pub status: TaskStatus,
    pub completion: oneshot::Receiver<Result<serde_json::Value, String>>,
}

struct Registration {
    id: uuid::Uuid,
    tx: oneshot::Sender<TaskStatus>,
}

pub struct TaskDispatcher<C: Clock> {
    ctx: Context<C>,
    servers: ServerModel<C>,
    waiters: Arc<Mutex<HashMap<TaskId, Vec<Registration>>>>,
    cache: Arc<Mutex<HashMap<TaskId, TaskStatus>>>,
    cache_ttl: Duration,
}

impl<C: Clock> TaskDispatcher<C> {
    pub fn new(ctx: Context<C>, cache_ttl: Duration) -> Self {
        let servers = ServerModel::new(ctx.clone());
        Self {
            ctx,
            servers,
            waiters: Arc::new(Mutex::new(HashMap::new())),
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl,
        }
    }

    /// Issue a task to the server's agent.
    ///
    /// The initial record (status `active`) returns immediately; the HTTP
    /// call, the terminal rewrite, and waiter alerting all happen in a
    /// background task.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchedTask, DispatchError> {
        let task_id = TaskId::generate();
        let mut status = TaskStatus::new(
            task_id.clone(),
            &request.task,
            request.server_uuid.clone(),
            request.req_id.clone(),
            self.ctx.now_utc(),
        );

        let server = self.servers.get(&request.server_uuid).await?;
        let endpoint = server
            .agent_endpoint()
            .ok_or_else(|| DispatchError::NoAgentEndpoint(request.server_uuid.clone()))?;

        if request.persist {
            self.persist(&status).await?;
        }

        tracing::info!(
            task = %task_id,
            server = %request.server_uuid,
            kind = %request.task,
            endpoint = %endpoint.tasks_url(),
            "dispatching task"
        );

        let (sync_tx, sync_rx) = oneshot::channel();
        let worker = TaskWorker {
            ctx: self.ctx.clone(),
            waiters: Arc::clone(&self.waiters),
            cache: Arc::clone(&self.cache),
            cache_ttl: self.cache_ttl,
            persist: request.persist,
        };
        let initial = status.clone();
        let params = request.params;
        let task_kind = request.task;
        tokio::spawn(async move {
            let outcome = worker.ctx.agents.post_task(&endpoint, &task_kind, params).await;
            let now = worker.ctx.now_utc();
            let sync_result = match outcome {
                Ok(body) => {
                    status.finish(now, body.clone());
                    Ok(body)
                }
                Err(e) => {
                    tracing::warn!(task = %status.id, error = %e, "task failed");
                    status.fail(now, serde_json::Value::String(e.to_string()));
                    Err(e.to_string())
                }
            };
            worker.settle(status, sync_result, sync_tx).await;
        });

        Ok(DispatchedTask { status: initial, completion: sync_rx })
    }

    /// Block until the task completes, up to `timeout`.
    ///
    /// A cached result resolves immediately. On timeout only this call's
    /// registration is removed; other waiters keep waiting.
    pub async fn wait_for_task(
        &self,
        task_id: &TaskId,
        timeout: Duration,
    ) -> Result<TaskStatus, TaskWaitError> {
        if let Some(cached) = self.cache.lock().get(task_id) {
            return Ok(cached.clone());
        }

        let registration_id = uuid::Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .entry(task_id.clone())
            .or_default()
            .push(Registration { id: registration_id, tx });

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(TaskWaitError::Abandoned),
            Err(_) => {
                let mut waiters = self.waiters.lock();
                if let Some(list) = waiters.get_mut(task_id) {
                    list.retain(|r| r.id != registration_id);
                    if list.is_empty() {
                        waiters.remove(task_id);
                    }
                }
                Err(TaskWaitError::Timeout)
            }
        }
    }

    /// Resolve every registered waiter with the final record, or cache it
    /// when nobody is waiting yet.
    pub fn alert_waiting_tasks(&self, status: TaskStatus) {
        alert(&self.waiters, &self.cache, self.cache_ttl, status);
    }

    /// Read back a persisted task record.
    pub async fn get_task(&self, task_id: &TaskId) -> Result<TaskStatus, ModelError> {
        let (value, _) = self.ctx.store.get_object(TASKS_BUCKET.name, task_id.as_str()).await?;
        serde_json::from_value(value).map_err(|e| ModelError::Corrupt(e.to_string()))
    }

    /// Number of parked wait registrations, for tests.
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().values().map(Vec::len).sum()
    }

    /// Whether a completed result is currently cached, for tests.
    pub fn has_cached_result(&self, task_id: &TaskId) -> bool {
        self.cache.lock().contains_key(task_id)
    }

    async fn persist(&self, status: &TaskStatus) -> Result<(), ModelError> {
        let value =
            serde_json::to_value(status).map_err(|e| ModelError::Corrupt(e.to_string()))?;
        self.ctx.store.put_object(TASKS_BUCKET.name, status.id.as_str(), value, None).await?;
        Ok(())
    }
}

/// State the background task carries past `dispatch`'s return.
struct TaskWorker<C: Clock> {
    ctx: Context<C>,
    waiters: Arc<Mutex<HashMap<TaskId, Vec<Registration>>>>,
    cache: Arc<Mutex<HashMap<TaskId, TaskStatus>>>,
    cache_ttl: Duration,
    persist: bool,
}

impl<C: Clock> TaskWorker<C> {
    async fn settle(
        &self,
        status: TaskStatus,
        sync_result: Result<serde_json::Value, String>,
        sync_tx: oneshot::Sender<Result<serde_json::Value, String>>,
    ) {
        if self.persist {
            match serde_json::to_value(&status) {
                Ok(value) => {
                    if let Err(e) = self
                        .ctx
                        .store
                        .put_object(TASKS_BUCKET.name, status.id.as_str(), value, None)
                        .await
                    {
                        tracing::warn!(task = %status.id, error = %e, "task record rewrite failed");
                    }
                }
                Err(e) => {
                    tracing::error!(task = %status.id, error = %e, "task record serialization failed");
                }
            }
        }

        alert(&self.waiters, &self.cache, self.cache_ttl, status);
        let _ = sync_tx.send(sync_result);
    }
}

fn alert(
    waiters: &Arc<Mutex<HashMap<TaskId, Vec<Registration>>>>,
    cache: &Arc<Mutex<HashMap<TaskId, TaskStatus>>>,
    cache_ttl: Duration,
    status: TaskStatus,
) {
    let registrations = waiters.lock().remove(&status.id);
    match registrations {
        Some(list) if !list.is_empty() => {
            for registration in list {
                let _ = registration.tx.send(status.clone());
            }
        }
        _ => {
            // Nobody is waiting yet: park the result so a waiter arriving
            // within the cleanup window still sees it.
            let task_id = status.id.clone();
            cache.lock().insert(task_id.clone(), status);
            let cache = Arc::clone(cache);
            tokio::spawn(async move {
                tokio::time::sleep(cache_ttl).await;
                cache.lock().remove(&task_id);
            });
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
