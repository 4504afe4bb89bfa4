// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable agent client for tests.

use super::{AgentClient, AgentClientError};
use async_trait::async_trait;
use cnapi_core::SysinfoEndpoint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// One recorded `post_task` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTaskPost {
    pub endpoint: SysinfoEndpoint,
    pub task: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone)]
enum Scripted {
    Ok(serde_json::Value),
    Refuse(String),
    /// Block until `release_stalled` fires, then answer with the value.
    Stall(serde_json::Value),
}

/// Fake agent client: responses are scripted per agent IP, every call is
/// recorded, and stalled calls can be released from the test body.
#[derive(Default)]
pub struct FakeAgentClient {
    scripted: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<RecordedTaskPost>>,
    release: Arc<Notify>,
}

impl FakeAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agents not scripted otherwise answer `{}`.
    pub fn respond_ok(&self, ip: &str, body: serde_json::Value) {
        self.scripted.lock().insert(ip.to_string(), Scripted::Ok(body));
    }

    pub fn respond_unreachable(&self, ip: &str, detail: &str) {
        self.scripted.lock().insert(ip.to_string(), Scripted::Refuse(detail.to_string()));
    }

    /// Make the agent hold the request open until released.
    pub fn stall(&self, ip: &str, body_when_released: serde_json::Value) {
        self.scripted.lock().insert(ip.to_string(), Scripted::Stall(body_when_released));
    }

    /// Release every stalled request.
    pub fn release_stalled(&self) {
        self.release.notify_waiters();
    }

    pub fn calls(&self) -> Vec<RecordedTaskPost> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn post_task(
        &self,
        endpoint: &SysinfoEndpoint,
        task: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AgentClientError> {
        self.calls.lock().push(RecordedTaskPost {
            endpoint: endpoint.clone(),
            task: task.to_string(),
            params,
        });

        let scripted = self.scripted.lock().get(&endpoint.ip).cloned();
        match scripted {
            None => Ok(serde_json::json!({})),
            Some(Scripted::Ok(body)) => Ok(body),
            Some(Scripted::Refuse(detail)) => Err(AgentClientError::Unreachable {
                endpoint: endpoint.tasks_url(),
                detail,
            }),
            Some(Scripted::Stall(body)) => {
                self.release.notified().await;
                Ok(body)
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
