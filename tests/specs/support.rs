// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: one or more CNAPI replicas over a single store.

use cnapi_adapters::FakeAgentClient;
use cnapi_core::ManualClock;
use cnapi_engine::{Context, Runtime, RuntimeTuning};
use cnapi_storage::MemoryStore;
use std::sync::Arc;

pub struct Replica {
    pub runtime: Runtime<ManualClock>,
}

pub struct Harness {
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    pub agents: Arc<FakeAgentClient>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(),
            store: Arc::new(MemoryStore::new()),
            agents: Arc::new(FakeAgentClient::new()),
        }
    }

    /// Spin up one replica sharing this harness's clock and store.
    pub fn replica(&self) -> Replica {
        let ctx = Context::new(
            self.clock.clone(),
            Arc::clone(&self.store) as Arc<dyn cnapi_storage::Store>,
            Arc::clone(&self.agents) as Arc<dyn cnapi_adapters::AgentClient>,
            "spec-dc",
        );
        Replica { runtime: Runtime::new(ctx, RuntimeTuning::default()) }
    }
}

/// Yield the runtime until the predicate holds; paused-time friendly.
pub async fn settle_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if predicate() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never settled");
}
