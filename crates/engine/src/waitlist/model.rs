// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ticket model: creation, transitions, and the atomic activate-next
//! primitive.
//!
//! Every transition out of a ticket goes through one ETag-guarded batch
//! that also activates the next queued ticket, so no observer ever sees
//! two active tickets for one (server, scope, id).

use crate::context::Context;
use crate::error::ModelError;
use chrono::{DateTime, Utc};
use cnapi_core::{
    Clock, ServerUuid, Ticket, TicketStatus, TicketUpdate, TicketUuid,
};
use cnapi_storage::{
    BatchOp, Etag, EtagGuard, Filter, FindOpts, SortOrder, TICKETS_BUCKET,
};
use serde_json::Value;

/// Parameters for `create_ticket`.
#[derive(Debug, Clone)]
pub struct CreateTicketParams {
    pub server_uuid: ServerUuid,
    pub scope: String,
    pub id: String,
    pub expires_at: DateTime<Utc>,
    pub action: Option<String>,
    pub reqid: Option<String>,
    pub extra: Value,
}

/// What `modify_ticket_activate_next` does to the target ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketOp {
    Update(TicketUpdate),
    Delete,
}

pub struct WaitlistModel<C: Clock> {
    ctx: Context<C>,
}

impl<C: Clock> Clone for WaitlistModel<C> {
    fn clone(&self) -> Self {
        Self { ctx: self.ctx.clone() }
    }
}

impl<C: Clock> WaitlistModel<C> {
    pub fn new(ctx: Context<C>) -> Self {
        Self { ctx }
    }

    /// Create a ticket: active when its queue is empty, queued otherwise.
    /// Returns the new uuid and a snapshot of the pending queue.
    pub async fn create_ticket(
        &self,
        params: CreateTicketParams,
    ) -> Result<(TicketUuid, Vec<Ticket>), ModelError> {
        let pending = self
            .pending_tickets(&params.server_uuid, &params.scope, &params.id)
            .await?;
        let status =
            if pending.is_empty() { TicketStatus::Active } else { TicketStatus::Queued };

        let now = self.ctx.now_utc();
        let ticket = Ticket {
            uuid: TicketUuid::generate(),
            server_uuid: params.server_uuid.clone(),
            scope: params.scope.clone(),
            id: params.id.clone(),
            action: params.action,
            expires_at: params.expires_at,
            created_at: now,
            updated_at: now,
            status,
            reqid: params.reqid,
            extra: params.extra,
        };

        self.ctx
            .store
            .put_object(
                TICKETS_BUCKET.name,
                ticket.uuid.as_str(),
                encode(&ticket)?,
                Some(EtagGuard::Absent),
            )
            .await?;

        tracing::info!(
            ticket = %ticket.uuid,
            server = %params.server_uuid,
            scope = %params.scope,
            id = %params.id,
            status = %ticket.status,
            "ticket created"
        );

        let queue =
            self.pending_tickets(&params.server_uuid, &params.scope, &params.id).await?;
        Ok((ticket.uuid, queue))
    }

    pub async fn get_ticket(&self, uuid: &TicketUuid) -> Result<Ticket, ModelError> {
        match self.ctx.store.get_object(TICKETS_BUCKET.name, uuid.as_str()).await {
            Ok((value, _)) => decode(value),
            Err(e) if e.is_not_found() => Err(ModelError::TicketNotFound(uuid.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// All tickets for a server, oldest first.
    pub async fn list_tickets(&self, server_uuid: &ServerUuid) -> Result<Vec<Ticket>, ModelError> {
        let found = self
            .ctx
            .store
            .find_objects(
                TICKETS_BUCKET.name,
                &Filter::eq("server_uuid", server_uuid.as_str()),
                &FindOpts::sorted_by("created_at", SortOrder::Ascending),
            )
            .await?;
        found.into_iter().map(|o| decode(o.value)).collect()
    }

    /// The single atomic primitive behind release, expire, and delete.
    ///
    /// Reads the target under its ETag, composes the target mutation plus
    /// the activation of the next queued ticket, and submits both as one
    /// batch. A conflict means another actor advanced the queue; restart
    /// from the read. Retrying is unbounded because it always converges on
    /// the queue's terminal state.
    pub async fn modify_ticket_activate_next(
        &self,
        uuid: &TicketUuid,
        op: TicketOp,
    ) -> Result<(), ModelError> {
        loop {
            let (target, etag) = self.get_ticket_with_etag(uuid).await?;
            let now = self.ctx.now_utc();

            let mut ops = Vec::with_capacity(2);
            match &op {
                TicketOp::Delete => {
                    ops.push(BatchOp::delete(
                        TICKETS_BUCKET.name,
                        uuid.as_str(),
                        Some(EtagGuard::Match(etag)),
                    ));
                }
                TicketOp::Update(update) => {
                    let mut next = target.clone();
                    update.apply(&mut next);
                    next.updated_at = now;
                    ops.push(BatchOp::put(
                        TICKETS_BUCKET.name,
                        uuid.as_str(),
                        encode(&next)?,
                        Some(EtagGuard::Match(etag)),
                    ));
                }
            }

            if let Some((mut next, next_etag)) = self.find_next_to_activate(&target).await? {
                next.status = TicketStatus::Active;
                next.updated_at = now;
                ops.push(BatchOp::put(
                    TICKETS_BUCKET.name,
                    next.uuid.as_str(),
                    encode(&next)?,
                    Some(EtagGuard::Match(next_etag)),
                ));
            }

            match self.ctx.store.batch(ops).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(ticket = %uuid, "ticket batch raced, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn release_ticket(&self, uuid: &TicketUuid) -> Result<(), ModelError> {
        self.modify_ticket_activate_next(
            uuid,
            TicketOp::Update(TicketUpdate::status(TicketStatus::Finished)),
        )
        .await
    }

    pub async fn expire_ticket(&self, uuid: &TicketUuid) -> Result<(), ModelError> {
        self.modify_ticket_activate_next(
            uuid,
            TicketOp::Update(TicketUpdate::status(TicketStatus::Expired)),
        )
        .await
    }

    pub async fn delete_ticket(&self, uuid: &TicketUuid) -> Result<(), ModelError> {
        self.modify_ticket_activate_next(uuid, TicketOp::Delete).await
    }

    /// Tickets the director should look at: non-terminal, and either
    /// updated since the watermark or overdue against it. No watermark
    /// means every non-terminal ticket.
    pub async fn tickets_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, ModelError> {
        let non_terminal = [
            Filter::ne("status", "finished"),
            Filter::ne("status", "expired"),
        ];
        let filter = match since {
            Some(ts) => {
                let ts = ts.to_rfc3339();
                Filter::and(non_terminal.into_iter().chain([Filter::or([
                    Filter::ge("updated_at", ts.as_str()),
                    Filter::not(Filter::ge("expires_at", ts.as_str())),
                ])]))
            }
            None => Filter::and(non_terminal),
        };

        let found = self
            .ctx
            .store
            .find_objects(
                TICKETS_BUCKET.name,
                &filter,
                &FindOpts::sorted_by("created_at", SortOrder::Ascending),
            )
            .await?;
        found.into_iter().map(|o| decode(o.value)).collect()
    }

    /// Terminal tickets whose last transition is older than the cutoff.
    pub async fn delete_finished_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ModelError> {
        let filter = Filter::and([
            Filter::any_of("status", ["finished", "expired"]),
            Filter::not(Filter::ge("updated_at", cutoff.to_rfc3339().as_str())),
        ]);
        Ok(self.ctx.store.delete_many(TICKETS_BUCKET.name, &filter).await?)
    }

    /// Remove every ticket for a server. Loops delete-then-count until the
    /// count reaches zero, so tickets created mid-delete are caught.
    pub async fn delete_all_tickets(&self, server_uuid: &ServerUuid) -> Result<(), ModelError> {
        let filter = Filter::eq("server_uuid", server_uuid.as_str());
        loop {
            self.ctx.store.delete_many(TICKETS_BUCKET.name, &filter).await?;
            let remaining = self.ctx.store.count_objects(TICKETS_BUCKET.name, &filter).await?;
            if remaining == 0 {
                return Ok(());
            }
        }
    }

    pub async fn count_tickets(&self, server_uuid: &ServerUuid) -> Result<u64, ModelError> {
        let filter = Filter::eq("server_uuid", server_uuid.as_str());
        Ok(self.ctx.store.count_objects(TICKETS_BUCKET.name, &filter).await?)
    }

    /// Pending tickets for one lock, creation order.
    pub async fn pending_tickets(
        &self,
        server_uuid: &ServerUuid,
        scope: &str,
        id: &str,
    ) -> Result<Vec<Ticket>, ModelError> {
        let filter = Filter::and([
            Filter::eq("server_uuid", server_uuid.as_str()),
            Filter::eq("scope", scope),
            Filter::eq("id", id),
            Filter::any_of("status", ["queued", "active"]),
        ]);
        let found = self
            .ctx
            .store
            .find_objects(
                TICKETS_BUCKET.name,
                &filter,
                &FindOpts::sorted_by("created_at", SortOrder::Ascending),
            )
            .await?;
        found.into_iter().map(|o| decode(o.value)).collect()
    }

    async fn get_ticket_with_etag(
        &self,
        uuid: &TicketUuid,
    ) -> Result<(Ticket, Etag), ModelError> {
        match self.ctx.store.get_object(TICKETS_BUCKET.name, uuid.as_str()).await {
            Ok((value, etag)) => Ok((decode(value)?, etag)),
            Err(e) if e.is_not_found() => Err(ModelError::TicketNotFound(uuid.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// The oldest queued ticket for the target's lock, provided nothing
    /// else holds it. If another ticket is already active the queue is
    /// not advanced; activating a second holder would break the
    /// exclusion guarantee.
    async fn find_next_to_activate(
        &self,
        target: &Ticket,
    ) -> Result<Option<(Ticket, Etag)>, ModelError> {
        let filter = Filter::and([
            Filter::eq("server_uuid", target.server_uuid.as_str()),
            Filter::eq("scope", target.scope.as_str()),
            Filter::eq("id", target.id.as_str()),
            Filter::any_of("status", ["queued", "active"]),
            Filter::ne("uuid", target.uuid.as_str()),
        ]);
        let found = self
            .ctx
            .store
            .find_objects(
                TICKETS_BUCKET.name,
                &filter,
                &FindOpts::sorted_by("created_at", SortOrder::Ascending),
            )
            .await?;

        let mut oldest_queued: Option<(Ticket, Etag)> = None;
        for object in found {
            let etag = object.etag.clone();
            let ticket = decode(object.value)?;
            match ticket.status {
                // The lock is still held by someone other than the target.
                TicketStatus::Active => return Ok(None),
                TicketStatus::Queued if oldest_queued.is_none() => {
                    oldest_queued = Some((ticket, etag));
                }
                _ => {}
            }
        }
        Ok(oldest_queued)
    }
}

fn decode(value: Value) -> Result<Ticket, ModelError> {
    serde_json::from_value(value).map_err(|e| ModelError::Corrupt(e.to_string()))
}

fn encode(ticket: &Ticket) -> Result<Value, ModelError> {
    serde_json::to_value(ticket).map_err(|e| ModelError::Corrupt(e.to_string()))
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
