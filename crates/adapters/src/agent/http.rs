// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production agent client over reqwest.

use super::{AgentClient, AgentClientError};
use async_trait::async_trait;
use cnapi_core::SysinfoEndpoint;
use std::time::Duration;

/// Tasks run arbitrarily long provision/destroy work on the node; the
/// request stays open for the duration.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(3600);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpAgentClient {
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(task_timeout: Duration) -> Result<Self, AgentClientError> {
        let client = reqwest::Client::builder()
            .timeout(task_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AgentClientError::Unreachable {
                endpoint: String::new(),
                detail: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn post_task(
        &self,
        endpoint: &SysinfoEndpoint,
        task: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AgentClientError> {
        let url = endpoint.tasks_url();
        let payload = serde_json::json!({ "task": task, "params": params });

        tracing::debug!(url = %url, task = task, "posting task to agent");

        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            AgentClientError::Unreachable { endpoint: url.clone(), detail: e.to_string() }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentClientError::TaskRejected { status: status.as_u16(), detail });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AgentClientError::BadResponse(e.to_string()))
    }
}
