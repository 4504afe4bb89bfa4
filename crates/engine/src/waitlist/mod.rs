// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waitlist: per-(server, scope, id) FIFO lock serialization.

mod director;
mod model;

pub use director::{
    TicketWaitError, WaitlistDirector, DEFAULT_CLEANUP_PERIOD, DEFAULT_DIRECTOR_PERIOD,
    DEFAULT_TICKET_RETENTION,
};
pub use model::{CreateTicketParams, TicketOp, WaitlistModel};
