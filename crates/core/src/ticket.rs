// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waitlist ticket: a queued request to hold a named resource lock on a
//! compute node, serialized within its (server, scope, id) triple.

use crate::id::{ServerUuid, TicketUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Queued,
    Active,
    Expired,
    Finished,
}

impl TicketStatus {
    /// Queued and active tickets still occupy the queue.
    pub fn is_pending(self) -> bool {
        matches!(self, TicketStatus::Queued | TicketStatus::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Expired | TicketStatus::Finished)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TicketStatus::Queued => "queued",
            TicketStatus::Active => "active",
            TicketStatus::Expired => "expired",
            TicketStatus::Finished => "finished",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub uuid: TicketUuid,
    pub server_uuid: ServerUuid,
    /// Namespace for `id`, e.g. "vm".
    pub scope: String,
    /// Resource identifier, unique within its scope.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reqid: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl Ticket {
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the two tickets contend for the same lock.
    pub fn same_queue(&self, other: &Ticket) -> bool {
        self.server_uuid == other.server_uuid && self.scope == other.scope && self.id == other.id
    }
}

/// Fields the serializer may change on an existing ticket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub extra: Option<serde_json::Value>,
}

impl TicketUpdate {
    pub fn status(status: TicketStatus) -> Self {
        Self { status: Some(status), extra: None }
    }

    pub fn apply(&self, ticket: &mut Ticket) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(extra) = &self.extra {
            ticket.extra = extra.clone();
        }
    }
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
