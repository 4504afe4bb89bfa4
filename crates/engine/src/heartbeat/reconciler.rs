// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat reconciler: turns registry entries into durable status.
//!
//! Each tick sweeps the registry and, for servers that are new to this
//! replica or whose heartbeat went stale, re-reads the shared StatusRow,
//! resolves replica takeovers, writes the row under its ETag, and
//! transitions the server's `status`. Servers are processed strictly
//! serially; nothing in here is fatal and the loop re-arms regardless.

use super::registry::{HeartbeatEntry, HeartbeatRegistry};
use crate::context::Context;
use crate::server_model::ServerModel;
use cnapi_core::{
    epoch_ms_from_utc, utc_from_epoch_ms, Clock, HeartbeatMetrics, ServerStatus, ServerUuid,
    StatusRow,
};
use cnapi_storage::{Etag, EtagGuard, STATUS_BUCKET};
use std::sync::Arc;
use std::time::Duration;

/// How often the reconciler sweeps the registry.
pub const DEFAULT_RECONCILE_PERIOD: Duration = Duration::from_secs(5);

/// A heartbeat older than this is stale; the server is presumed gone.
pub const DEFAULT_HEARTBEAT_LIFETIME: Duration = Duration::from_secs(11);

pub struct HeartbeatReconciler<C: Clock> {
    ctx: Context<C>,
    registry: Arc<HeartbeatRegistry>,
    servers: ServerModel<C>,
    lifetime_ms: u64,
}

impl<C: Clock> HeartbeatReconciler<C> {
    pub fn new(
        ctx: Context<C>,
        registry: Arc<HeartbeatRegistry>,
        lifetime: Duration,
    ) -> Self {
        let servers = ServerModel::new(ctx.clone());
        Self { ctx, registry, servers, lifetime_ms: lifetime.as_millis() as u64 }
    }

    /// Spawn the periodic sweep as a background task.
    pub fn spawn(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.reconcile_once().await;
            }
        })
    }

    /// One sweep over the registry.
    pub async fn reconcile_once(&self) {
        let entries = self.registry.snapshot();
        self.ctx.metrics.set_registry_size(entries.len());
        let now_ms = self.ctx.clock.epoch_ms();

        for (uuid, entry) in entries {
            let is_new = entry.last_status_update_ms.is_none();
            let is_stale = entry.last_heartbeat_ms < now_ms.saturating_sub(self.lifetime_ms);
            if !is_new && !is_stale {
                continue;
            }
            if is_new {
                HeartbeatMetrics::incr(&self.ctx.metrics.new_heartbeaters);
            } else {
                HeartbeatMetrics::incr(&self.ctx.metrics.stale_heartbeaters);
            }
            self.reconcile_server(&uuid, entry, now_ms).await;
        }
    }

    /// Per-server pipeline. Every early return leaves the next tick to
    /// retry; only takeover and status-upsert failure drop the entry.
    async fn reconcile_server(&self, uuid: &ServerUuid, entry: HeartbeatEntry, now_ms: u64) {
        let (row, etag) = match self.read_status_row(uuid).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(server = %uuid, error = %e, "status row read failed");
                return;
            }
        };

        let observed_ms = entry.last_heartbeat_ms;
        if let Some(row) = &row {
            let persisted_ms = epoch_ms_from_utc(row.last_heartbeat);
            if persisted_ms > observed_ms {
                if row.cnapi_instance == self.ctx.instance_id {
                    // Our own row is ahead of our own observation: a
                    // heartbeat from the future means a clock or ingest
                    // malfunction, not a takeover.
                    tracing::error!(
                        server = %uuid,
                        persisted_ms,
                        observed_ms,
                        "status row is ahead of observed heartbeat"
                    );
                } else {
                    tracing::info!(
                        server = %uuid,
                        other = %row.cnapi_instance,
                        "server usurped by another replica"
                    );
                    self.registry.remove(uuid);
                    HeartbeatMetrics::incr(&self.ctx.metrics.usurped_heartbeaters);
                }
                return;
            }
        }

        let next_row = StatusRow {
            server_uuid: uuid.clone(),
            cnapi_instance: self.ctx.instance_id.clone(),
            last_heartbeat: utc_from_epoch_ms(observed_ms),
        };
        if !self.write_status_row(uuid, &next_row, etag).await {
            return;
        }

        self.registry.mark_status_update(uuid, now_ms);
        let is_stale = observed_ms < now_ms.saturating_sub(self.lifetime_ms);
        let new_status = if is_stale {
            self.registry.remove(uuid);
            ServerStatus::Unknown
        } else {
            ServerStatus::Running
        };

        if let Err(e) = self.servers.write_status(uuid, new_status).await {
            // NotFound, ETag conflict, backend trouble: all mean the next
            // heartbeat should start this server's pipeline from scratch.
            tracing::warn!(server = %uuid, status = %new_status, error = %e, "status upsert failed");
            self.registry.remove(uuid);
        }
    }

    async fn read_status_row(
        &self,
        uuid: &ServerUuid,
    ) -> Result<(Option<StatusRow>, Option<Etag>), cnapi_storage::StoreError> {
        match self.ctx.store.get_object(STATUS_BUCKET.name, uuid.as_str()).await {
            Ok((value, etag)) => {
                let row = serde_json::from_value(value).map_err(|e| {
                    cnapi_storage::StoreError::Backend(format!("corrupt status row: {}", e))
                })?;
                Ok((Some(row), Some(etag)))
            }
            Err(e) if e.is_not_found() => Ok((None, None)),
            Err(e) => Err(e),
        }
    }

    async fn write_status_row(&self, uuid: &ServerUuid, row: &StatusRow, etag: Option<Etag>) -> bool {
        HeartbeatMetrics::incr(&self.ctx.metrics.status_put_attempts);
        let guard = match etag {
            Some(etag) => EtagGuard::Match(etag),
            None => EtagGuard::Absent,
        };
        let value = match serde_json::to_value(row) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(server = %uuid, error = %e, "status row serialization failed");
                HeartbeatMetrics::incr(&self.ctx.metrics.status_put_errors);
                return false;
            }
        };
        match self.ctx.store.put_object(STATUS_BUCKET.name, uuid.as_str(), value, Some(guard)).await
        {
            Ok(_) => true,
            Err(e) if e.is_conflict() => {
                // Another replica wrote between our read and write; its
                // row wins this tick.
                HeartbeatMetrics::incr(&self.ctx.metrics.status_put_etag_conflicts);
                false
            }
            Err(e) => {
                tracing::warn!(server = %uuid, error = %e, "status row write failed");
                HeartbeatMetrics::incr(&self.ctx.metrics.status_put_errors);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
