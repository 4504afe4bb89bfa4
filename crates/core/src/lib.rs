// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cnapi-core: domain types for the compute node control plane

pub mod clock;
pub mod id;
pub mod metrics;
pub mod server;
pub mod status_row;
pub mod task;
pub mod ticket;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use id::{CnapiInstanceId, ServerUuid, TaskId, TicketUuid};
pub use metrics::{HeartbeatMetrics, MetricsSnapshot, UpsertStats};
pub use server::{
    AgentEntry, ServerRecord, ServerStatus, ServerUpdate, SysinfoEndpoint, TransitionalStatus,
    VmEntry, DEFAULT_AGENT_PORT, DEFAULT_RESERVATION_RATIO,
};
pub use status_row::StatusRow;
pub use task::{TaskHistoryEntry, TaskState, TaskStatus};
pub use ticket::{Ticket, TicketStatus, TicketUpdate};
pub use time_fmt::{epoch_ms_from_utc, utc_from_epoch_ms};
