// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable task lifecycle record for `cnapi_tasks`.

use crate::id::{ServerUuid, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Active,
    Complete,
    Failure,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Active => "active",
            TaskState::Complete => "complete",
            TaskState::Failure => "failure",
        };
        write!(f, "{}", s)
    }
}

/// Append-only history entry. `event` carries the agent response body or
/// error detail; its shape is task-type specific and opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub event: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    /// Task type name understood by the node's agent, e.g. "machine_create".
    pub task: String,
    pub server_uuid: ServerUuid,
    pub status: TaskState,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<TaskHistoryEntry>,
}

impl TaskStatus {
    pub fn new(
        id: TaskId,
        task: &str,
        server_uuid: ServerUuid,
        req_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            req_id,
            task: task.to_string(),
            server_uuid,
            status: TaskState::Active,
            timestamp,
            history: Vec::new(),
        }
    }

    pub fn push_history(&mut self, name: &str, timestamp: DateTime<Utc>, event: serde_json::Value) {
        self.history.push(TaskHistoryEntry { name: name.to_string(), timestamp, event });
    }

    /// Terminal success: status flips to `complete` with a `finish` entry.
    pub fn finish(&mut self, timestamp: DateTime<Utc>, event: serde_json::Value) {
        self.status = TaskState::Complete;
        self.push_history("finish", timestamp, event);
    }

    /// Terminal failure: an `error` entry followed by `finish`.
    pub fn fail(&mut self, timestamp: DateTime<Utc>, error: serde_json::Value) {
        self.status = TaskState::Failure;
        self.push_history("error", timestamp, error);
        self.push_history("finish", timestamp, serde_json::Value::Null);
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
