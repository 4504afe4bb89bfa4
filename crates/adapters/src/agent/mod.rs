// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task agent client.
//!
//! Each compute node runs a long-lived agent exposing `POST /tasks`.
//! The response body is task-type specific and passes through opaque.

mod http;

pub use http::{HttpAgentClient, DEFAULT_TASK_TIMEOUT};

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use cnapi_core::SysinfoEndpoint;
use thiserror::Error;

/// Errors from talking to a node's task agent.
#[derive(Debug, Error)]
pub enum AgentClientError {
    #[error("agent unreachable at {endpoint}: {detail}")]
    Unreachable { endpoint: String, detail: String },
    #[error("agent returned HTTP {status}: {detail}")]
    TaskRejected { status: u16, detail: String },
    #[error("agent response was not JSON: {0}")]
    BadResponse(String),
}

/// HTTP client for per-node task agents.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// POST `{task, params}` to the agent and return the response body.
    ///
    /// This call spans the whole task execution on the node, so it runs
    /// against an hour-scale timeout rather than a request-scale one.
    async fn post_task(
        &self,
        endpoint: &SysinfoEndpoint,
        task: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AgentClientError>;
}
