// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The assembled engine: one value owning every subsystem.
//!
//! The HTTP layer (out of scope here) calls straight into these methods;
//! heartbeat ingestion is a function call, not an event stream.

use crate::context::Context;
use crate::error::ModelError;
use crate::heartbeat::{HeartbeatReconciler, HeartbeatRegistry};
use crate::server_model::ServerModel;
use crate::task::TaskDispatcher;
use crate::waitlist::{WaitlistDirector, WaitlistModel};
use cnapi_core::{Clock, MetricsSnapshot, ServerUpdate, ServerUuid};
use std::sync::Arc;
use std::time::Duration;

/// Periods and lifetimes for the control loops.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeTuning {
    pub reconcile_period: Duration,
    pub heartbeat_lifetime: Duration,
    pub director_period: Duration,
    pub ticket_cleanup_period: Duration,
    pub ticket_retention: Duration,
    pub task_result_cache_ttl: Duration,
}

impl Default for RuntimeTuning {
    fn default() -> Self {
        Self {
            reconcile_period: crate::heartbeat::DEFAULT_RECONCILE_PERIOD,
            heartbeat_lifetime: crate::heartbeat::DEFAULT_HEARTBEAT_LIFETIME,
            director_period: crate::waitlist::DEFAULT_DIRECTOR_PERIOD,
            ticket_cleanup_period: crate::waitlist::DEFAULT_CLEANUP_PERIOD,
            ticket_retention: crate::waitlist::DEFAULT_TICKET_RETENTION,
            task_result_cache_ttl: crate::task::DEFAULT_RESULT_CACHE_TTL,
        }
    }
}

pub struct Runtime<C: Clock> {
    ctx: Context<C>,
    tuning: RuntimeTuning,
    pub registry: Arc<HeartbeatRegistry>,
    pub servers: ServerModel<C>,
    pub waitlist: WaitlistModel<C>,
    pub director: Arc<WaitlistDirector<C>>,
    pub tasks: Arc<TaskDispatcher<C>>,
    reconciler: Arc<HeartbeatReconciler<C>>,
}

impl<C: Clock> Runtime<C> {
    pub fn new(ctx: Context<C>, tuning: RuntimeTuning) -> Self {
        let registry = Arc::new(HeartbeatRegistry::new(Arc::clone(&ctx.metrics)));
        let servers = ServerModel::new(ctx.clone());
        let waitlist = WaitlistModel::new(ctx.clone());
        let director =
            Arc::new(WaitlistDirector::new(ctx.clone(), tuning.ticket_retention));
        let tasks = Arc::new(TaskDispatcher::new(ctx.clone(), tuning.task_result_cache_ttl));
        let reconciler = Arc::new(HeartbeatReconciler::new(
            ctx.clone(),
            Arc::clone(&registry),
            tuning.heartbeat_lifetime,
        ));
        Self { ctx, tuning, registry, servers, waitlist, director, tasks, reconciler }
    }

    /// Spawn the reconciler, director, and cleanup loops.
    pub fn spawn_loops(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles =
            vec![Arc::clone(&self.reconciler).spawn(self.tuning.reconcile_period)];
        handles.extend(
            self.director
                .spawn(self.tuning.director_period, self.tuning.ticket_cleanup_period),
        );
        handles
    }

    /// Ingest one heartbeat.
    ///
    /// Touches the registry always; on first contact with a server this
    /// replica has never seen, makes sure a record exists so the
    /// reconciler's status write has something to land on.
    pub async fn heartbeat(&self, server_uuid: &ServerUuid) -> Result<(), ModelError> {
        let first_seen = self.registry.touch(server_uuid, self.ctx.clock.epoch_ms());
        if first_seen {
            tracing::debug!(server = %server_uuid, "first heartbeat from server");
            self.servers
                .upsert(
                    server_uuid,
                    &ServerUpdate::default(),
                    &crate::server_model::UpsertOpts::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Run one reconciler sweep; the daemon's loops call this on a timer,
    /// tests call it directly.
    pub async fn reconcile_once(&self) {
        self.reconciler.reconcile_once().await;
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn context(&self) -> &Context<C> {
        &self.ctx
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
