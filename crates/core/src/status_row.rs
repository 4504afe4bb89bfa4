// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared per-server last-heartbeat row.
//!
//! One row per server in `cnapi_status`, shared by every CNAPI replica.
//! The replica named in `cnapi_instance` currently owns the server's
//! heartbeats; a row carrying a newer `last_heartbeat` than a replica has
//! observed means another replica took over.

use crate::id::{CnapiInstanceId, ServerUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRow {
    pub server_uuid: ServerUuid,
    pub cnapi_instance: CnapiInstanceId,
    pub last_heartbeat: DateTime<Utc>,
}
