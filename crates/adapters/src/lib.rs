// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cnapi-adapters: clients for the processes CNAPI talks to.
//!
//! Today that is one thing: the task agent running on every compute node.

pub mod agent;

pub use agent::{AgentClient, AgentClientError, HttpAgentClient};

#[cfg(any(test, feature = "test-support"))]
pub use agent::fake::{FakeAgentClient, RecordedTaskPost};
