// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared dependencies handed to every engine component.

use cnapi_adapters::AgentClient;
use cnapi_core::{Clock, CnapiInstanceId, HeartbeatMetrics};
use cnapi_storage::Store;
use std::sync::Arc;

/// One context per process. Components hold a clone; there is no global
/// state beyond what lives in here.
pub struct Context<C: Clock> {
    pub clock: C,
    pub store: Arc<dyn Store>,
    pub agents: Arc<dyn AgentClient>,
    pub metrics: Arc<HeartbeatMetrics>,
    /// This replica's identity, written into claimed StatusRows.
    pub instance_id: CnapiInstanceId,
    /// Datacenter name stamped onto servers synthesized on first contact.
    pub datacenter: String,
}

impl<C: Clock> Clone for Context<C> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            store: Arc::clone(&self.store),
            agents: Arc::clone(&self.agents),
            metrics: Arc::clone(&self.metrics),
            instance_id: self.instance_id.clone(),
            datacenter: self.datacenter.clone(),
        }
    }
}

impl<C: Clock> Context<C> {
    pub fn new(
        clock: C,
        store: Arc<dyn Store>,
        agents: Arc<dyn AgentClient>,
        datacenter: &str,
    ) -> Self {
        Self {
            clock,
            store,
            agents,
            metrics: Arc::new(HeartbeatMetrics::default()),
            instance_id: CnapiInstanceId::generate(),
            datacenter: datacenter.to_string(),
        }
    }

    /// Current wall-clock time as a UTC timestamp.
    pub fn now_utc(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now_utc()
    }
}
