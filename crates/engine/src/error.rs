// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level error type shared by the models.

use cnapi_core::{ServerUuid, TicketUuid};
use cnapi_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("server not found: {0}")]
    ServerNotFound(ServerUuid),
    #[error("ticket not found: {0}")]
    TicketNotFound(TicketUuid),
    /// Distinct from generic store failure: the write raced with another
    /// actor more times than the caller allowed.
    #[error("etag retries exhausted for server {0}")]
    EtagRetriesExhausted(ServerUuid),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ModelError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ModelError::ServerNotFound(_)
                | ModelError::TicketNotFound(_)
                | ModelError::Store(StoreError::NotFound { .. })
        )
    }
}
