// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waitlist director: watches ticket updates and fires waiters.
//!
//! A per-process poll loop over `tickets_updated_since`. Activation fires
//! waiters with success, overdue tickets are expired and their waiters
//! fired with an error. Waiters are one-shot channels, so a racing
//! activation and expiry cannot fire the same waiter twice.

use super::model::WaitlistModel;
use crate::context::Context;
use cnapi_core::{utc_from_epoch_ms, Clock, TicketStatus, TicketUuid};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// How often the director polls for ticket updates.
pub const DEFAULT_DIRECTOR_PERIOD: Duration = Duration::from_millis(500);

/// How often terminal tickets are swept out.
pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(3600);

/// How long terminal tickets are kept before the sweep removes them.
pub const DEFAULT_TICKET_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

/// Overlap subtracted from the watermark so updates landing while a poll
/// runs are seen by the next poll.
const WATERMARK_SLACK_MS: u64 = 1_000;

/// Why a ticket wait resolved without the lock being held.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketWaitError {
    #[error("ticket has expired")]
    Expired,
    /// The director dropped the waiter without resolving it (shutdown).
    #[error("ticket wait abandoned")]
    Abandoned,
}

type Waiter = oneshot::Sender<Result<(), TicketWaitError>>;

pub struct WaitlistDirector<C: Clock> {
    ctx: Context<C>,
    model: WaitlistModel<C>,
    waiters: Mutex<HashMap<TicketUuid, Vec<Waiter>>>,
    last_check_ms: Mutex<Option<u64>>,
    retention: Duration,
}

impl<C: Clock> WaitlistDirector<C> {
    pub fn new(ctx: Context<C>, retention: Duration) -> Self {
        let model = WaitlistModel::new(ctx.clone());
        Self {
            ctx,
            model,
            waiters: Mutex::new(HashMap::new()),
            last_check_ms: Mutex::new(None),
            retention,
        }
    }

    /// Spawn the poll loop and the terminal-ticket sweep.
    pub fn spawn(
        self: &Arc<Self>,
        period: Duration,
        cleanup_period: Duration,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let director = Arc::clone(self);
        let poll = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = director.check_once().await {
                    tracing::warn!(error = %e, "waitlist check failed");
                }
            }
        });

        let director = Arc::clone(self);
        let cleanup = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_period);
            loop {
                interval.tick().await;
                if let Err(e) = director.cleanup_once().await {
                    tracing::warn!(error = %e, "ticket cleanup failed");
                }
            }
        });

        vec![poll, cleanup]
    }

    /// Wait for a ticket to become active.
    ///
    /// Already-active tickets resolve immediately, already-expired ones
    /// resolve immediately with an error; anything else parks a one-shot
    /// waiter for the poll loop to fire.
    pub async fn wait_for_ticket(
        &self,
        uuid: &TicketUuid,
    ) -> Result<oneshot::Receiver<Result<(), TicketWaitError>>, crate::error::ModelError> {
        let ticket = self.model.get_ticket(uuid).await?;
        let (tx, rx) = oneshot::channel();
        match ticket.status {
            TicketStatus::Active => {
                let _ = tx.send(Ok(()));
            }
            TicketStatus::Expired => {
                let _ = tx.send(Err(TicketWaitError::Expired));
            }
            _ => {
                self.waiters.lock().entry(uuid.clone()).or_default().push(tx);
            }
        }
        Ok(rx)
    }

    /// One poll: fetch updated tickets, expire the overdue, fire waiters.
    pub async fn check_once(&self) -> Result<(), crate::error::ModelError> {
        let now_ms = self.ctx.clock.epoch_ms();
        let since = (*self.last_check_ms.lock())
            .map(|ms| utc_from_epoch_ms(ms.saturating_sub(WATERMARK_SLACK_MS)));

        let tickets = self.model.tickets_updated_since(since).await?;
        *self.last_check_ms.lock() = Some(now_ms);

        let now = utc_from_epoch_ms(now_ms);
        for ticket in tickets {
            if !ticket.is_terminal() && now > ticket.expires_at {
                match self.model.expire_ticket(&ticket.uuid).await {
                    Ok(()) => {
                        tracing::info!(ticket = %ticket.uuid, "ticket expired");
                        self.fire(&ticket.uuid, Err(TicketWaitError::Expired));
                    }
                    Err(e) => {
                        tracing::warn!(ticket = %ticket.uuid, error = %e, "expire failed");
                    }
                }
            } else if ticket.status == TicketStatus::Active {
                self.fire(&ticket.uuid, Ok(()));
            }
        }
        Ok(())
    }

    /// Sweep terminal tickets older than the retention window.
    pub async fn cleanup_once(&self) -> Result<(), crate::error::ModelError> {
        let retention_ms = self.retention.as_millis() as u64;
        let cutoff = utc_from_epoch_ms(self.ctx.clock.epoch_ms().saturating_sub(retention_ms));
        let removed = self.model.delete_finished_before(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "swept terminal tickets");
        }
        Ok(())
    }

    /// Number of parked waiters, for tests and the health surface.
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().values().map(Vec::len).sum()
    }

    fn fire(&self, uuid: &TicketUuid, outcome: Result<(), TicketWaitError>) {
        if let Some(waiters) = self.waiters.lock().remove(uuid) {
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "director_tests.rs"]
mod tests;
