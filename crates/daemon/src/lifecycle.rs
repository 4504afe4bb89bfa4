// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: assemble the engine and run its loops.

use crate::config::Config;
use cnapi_adapters::{AgentClientError, HttpAgentClient};
use cnapi_core::SystemClock;
use cnapi_engine::{Context, ModelError, Runtime};
use cnapi_storage::MemoryStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("agent client setup failed: {0}")]
    AgentClient(#[from] AgentClientError),
    #[error("startup storage error: {0}")]
    Storage(#[from] ModelError),
}

/// A running daemon: the runtime handle the request layer calls into,
/// plus the background loop tasks.
pub struct Daemon {
    pub runtime: Arc<Runtime<SystemClock>>,
    pub loops: Vec<tokio::task::JoinHandle<()>>,
}

impl Daemon {
    /// Stop the background loops. In-flight task dispatches keep running
    /// on the runtime until the process exits.
    pub fn shutdown(&self) {
        for handle in &self.loops {
            handle.abort();
        }
    }
}

/// Build the runtime and start the control loops.
///
/// The standalone deployment runs over the in-memory store; a clustered
/// deployment substitutes a backend for the shared indexed KV service
/// behind the same `Store` interface.
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let store = Arc::new(MemoryStore::new());
    let agents = Arc::new(HttpAgentClient::new(config.agent_timeout())?);
    let ctx = Context::new(
        SystemClock,
        store as Arc<dyn cnapi_storage::Store>,
        agents as Arc<dyn cnapi_adapters::AgentClient>,
        &config.datacenter,
    );

    info!(
        instance = %ctx.instance_id,
        datacenter = %config.datacenter,
        "starting cnapi"
    );

    let runtime = Runtime::new(ctx, config.tuning());
    runtime.servers.ensure_default().await?;

    let loops = runtime.spawn_loops();
    info!(loops = loops.len(), "control loops running");

    Ok(Daemon { runtime: Arc::new(runtime), loops })
}
