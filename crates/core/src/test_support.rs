// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders for other crates' tests. Compiled only for tests or the
//! `test-support` feature.

use crate::id::ServerUuid;
use crate::server::{ServerRecord, ServerStatus};
use crate::time_fmt::utc_from_epoch_ms;

/// Build a server record with sysinfo pointing at a reachable agent.
pub struct ServerBuilder {
    record: ServerRecord,
}

impl ServerBuilder {
    pub fn new(uuid: &str) -> Self {
        let mut record =
            ServerRecord::new(ServerUuid::new(uuid), "test-dc", utc_from_epoch_ms(1_700_000_000_000));
        record.hostname = format!("cn-{}", &uuid[..uuid.len().min(8)]);
        Self { record }
    }

    pub fn status(mut self, status: ServerStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn setup(mut self) -> Self {
        self.record.setup = true;
        self
    }

    pub fn agent_ip(mut self, ip: &str) -> Self {
        self.record.sysinfo = serde_json::json!({ "CN Agent IP": ip });
        self
    }

    pub fn build(self) -> ServerRecord {
        self.record
    }
}
