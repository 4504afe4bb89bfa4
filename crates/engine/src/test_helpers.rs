// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::context::Context;
use cnapi_adapters::FakeAgentClient;
use cnapi_core::ManualClock;
use cnapi_storage::MemoryStore;
use std::sync::Arc;

pub struct TestCtx {
    pub ctx: Context<ManualClock>,
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    pub agents: Arc<FakeAgentClient>,
}

pub fn test_ctx() -> TestCtx {
    let clock = ManualClock::new();
    let store = Arc::new(MemoryStore::new());
    let agents = Arc::new(FakeAgentClient::new());
    let ctx = Context::new(
        clock.clone(),
        Arc::clone(&store) as Arc<dyn cnapi_storage::Store>,
        Arc::clone(&agents) as Arc<dyn cnapi_adapters::AgentClient>,
        "test-dc",
    );
    TestCtx { ctx, clock, store, agents }
}
