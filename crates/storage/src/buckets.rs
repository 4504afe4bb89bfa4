// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bucket declarations for every object family CNAPI persists.

/// Schema of one bucket: which fields are indexed (usable in filters and
/// sorts) and which carry a unique constraint beyond the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    pub name: &'static str,
    pub indexed: &'static [&'static str],
    pub unique: &'static [&'static str],
}

/// Server records, keyed by server uuid (plus the `default` sentinel).
pub const SERVERS_BUCKET: BucketConfig = BucketConfig {
    name: "cnapi_servers",
    indexed: &["uuid", "hostname", "datacenter", "setup", "headnode", "reserved", "reservoir"],
    unique: &[],
};

/// Task lifecycle records, keyed by task id.
pub const TASKS_BUCKET: BucketConfig = BucketConfig {
    name: "cnapi_tasks",
    indexed: &["id", "req_id", "server_uuid", "status", "timestamp"],
    unique: &[],
};

/// Waitlist tickets, keyed by ticket uuid.
pub const TICKETS_BUCKET: BucketConfig = BucketConfig {
    name: "cnapi_waitlist_tickets",
    indexed: &[
        "uuid",
        "server_uuid",
        "scope",
        "id",
        "status",
        "created_at",
        "updated_at",
        "expires_at",
    ],
    unique: &["uuid"],
};

/// Shared last-heartbeat rows, keyed by server uuid.
pub const STATUS_BUCKET: BucketConfig = BucketConfig {
    name: "cnapi_status",
    indexed: &["server_uuid", "last_heartbeat"],
    unique: &["server_uuid"],
};

/// All buckets a backend must provision.
pub static ALL_BUCKETS: [BucketConfig; 4] =
    [SERVERS_BUCKET, TASKS_BUCKET, TICKETS_BUCKET, STATUS_BUCKET];

/// Look up a bucket's schema by name.
pub fn config_for(name: &str) -> Option<&'static BucketConfig> {
    ALL_BUCKETS.iter().find(|b| b.name == name)
}
