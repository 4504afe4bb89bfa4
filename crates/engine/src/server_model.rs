// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server model: every read and write of `cnapi_servers` goes through
//! here.
//!
//! The write path is a read-modify-write under the object's ETag. Identity
//! fields are guarded, derived fields recomputed, and an update whose
//! effective diff is empty never reaches the store.

use crate::context::Context;
use crate::error::ModelError;
use cnapi_core::{
    Clock, ServerRecord, ServerStatus, ServerUpdate, ServerUuid, UpsertStats,
};
use cnapi_storage::{EtagGuard, Filter, FindOpts, SortOrder, StoreError, SERVERS_BUCKET};
use serde_json::Value;

/// Key of the sentinel record holding fleet-wide boot defaults.
pub const DEFAULT_SERVER_KEY: &str = "default";

/// Typed listing filter; unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerFilter {
    pub datacenter: Option<String>,
    pub hostname: Option<String>,
    pub setup: Option<bool>,
    pub headnode: Option<bool>,
    pub reserved: Option<bool>,
    pub reservoir: Option<bool>,
    /// Union over explicit uuids.
    pub uuids: Option<Vec<ServerUuid>>,
}

impl ServerFilter {
    fn to_query(&self) -> Filter {
        // The sentinel never appears in listings.
        let mut terms = vec![Filter::ne("uuid", DEFAULT_SERVER_KEY)];
        if let Some(dc) = &self.datacenter {
            terms.push(Filter::eq("datacenter", dc.as_str()));
        }
        if let Some(hostname) = &self.hostname {
            terms.push(Filter::eq("hostname", hostname.as_str()));
        }
        if let Some(setup) = self.setup {
            terms.push(Filter::eq("setup", setup));
        }
        if let Some(headnode) = self.headnode {
            terms.push(Filter::eq("headnode", headnode));
        }
        if let Some(reserved) = self.reserved {
            terms.push(Filter::eq("reserved", reserved));
        }
        if let Some(reservoir) = self.reservoir {
            terms.push(Filter::eq("reservoir", reservoir));
        }
        if let Some(uuids) = &self.uuids {
            terms.push(Filter::any_of("uuid", uuids.iter().map(|u| u.as_str().to_string())));
        }
        Filter::And(terms)
    }
}

/// Agent-reported fields heavy enough to strip from listings by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedExtra {
    Sysinfo,
    Vms,
    Agents,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOpts {
    /// Which reported fields to keep in the response.
    pub extras: Vec<ReportedExtra>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListOpts {
    fn keeps(&self, extra: ReportedExtra) -> bool {
        self.extras.contains(&extra)
    }
}

/// Options controlling one upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOpts {
    /// Synthesize a record when the key is missing.
    pub allow_create: bool,
    /// How many times to restart the read-modify-write after an ETag loss.
    pub etag_retries: u32,
    /// Let identity fields (`uuid`, `hostname`, `created`) change.
    pub override_nonupdatable: bool,
}

impl Default for UpsertOpts {
    fn default() -> Self {
        Self { allow_create: true, etag_retries: 0, override_nonupdatable: false }
    }
}

pub struct ServerModel<C: Clock> {
    ctx: Context<C>,
}

impl<C: Clock> Clone for ServerModel<C> {
    fn clone(&self) -> Self {
        Self { ctx: self.ctx.clone() }
    }
}

impl<C: Clock> ServerModel<C> {
    pub fn new(ctx: Context<C>) -> Self {
        Self { ctx }
    }

    /// List servers matching the filter, hostname order. The `default`
    /// sentinel is always excluded and reported fields are stripped unless
    /// asked for.
    pub async fn list(
        &self,
        filter: &ServerFilter,
        opts: &ListOpts,
    ) -> Result<Vec<ServerRecord>, ModelError> {
        let find_opts = FindOpts {
            sort: Some(("hostname".to_string(), SortOrder::Ascending)),
            limit: opts.limit,
            offset: opts.offset,
        };
        let found = self
            .ctx
            .store
            .find_objects(SERVERS_BUCKET.name, &filter.to_query(), &find_opts)
            .await?;

        let mut servers = Vec::with_capacity(found.len());
        for object in found {
            let mut record = decode(object.value)?;
            if !opts.keeps(ReportedExtra::Sysinfo) {
                record.sysinfo = Value::Null;
            }
            if !opts.keeps(ReportedExtra::Vms) {
                record.vms.clear();
            }
            if !opts.keeps(ReportedExtra::Agents) {
                record.agents.clear();
            }
            servers.push(record.surfaced());
        }
        Ok(servers)
    }

    /// Fetch one server, full record, read-surface status applied.
    pub async fn get(&self, uuid: &ServerUuid) -> Result<ServerRecord, ModelError> {
        let (value, _etag) = self
            .ctx
            .store
            .get_object(SERVERS_BUCKET.name, uuid.as_str())
            .await
            .map_err(|e| not_found_as_server(e, uuid))?;
        Ok(decode(value)?.surfaced())
    }

    /// The write path: ETag-guarded read-modify-write with bounded
    /// restarts and per-call counters.
    pub async fn upsert(
        &self,
        uuid: &ServerUuid,
        update: &ServerUpdate,
        opts: &UpsertOpts,
    ) -> Result<(ServerRecord, UpsertStats), ModelError> {
        let mut stats = UpsertStats::default();
        let mut attempt: u32 = 0;

        loop {
            stats.get_object_attempts += 1;
            let fetched = match self
                .ctx
                .store
                .get_object(SERVERS_BUCKET.name, uuid.as_str())
                .await
            {
                Ok((value, etag)) => Some((decode(value)?, etag)),
                Err(e) if e.is_not_found() => {
                    stats.get_object_not_found += 1;
                    if !opts.allow_create {
                        return Err(ModelError::ServerNotFound(uuid.clone()));
                    }
                    None
                }
                Err(e) => {
                    stats.get_object_errors += 1;
                    return Err(e.into());
                }
            };

            let (base, guard) = match &fetched {
                Some((record, etag)) => (record.clone(), EtagGuard::Match(etag.clone())),
                None => (
                    ServerRecord::new(uuid.clone(), &self.ctx.datacenter, self.ctx.now_utc()),
                    EtagGuard::Absent,
                ),
            };

            let mut props = update.clone();
            if fetched.is_some() && !opts.override_nonupdatable {
                props.guard_nonupdatable(&base);
            }

            let mut next = base.clone();
            props.apply(&mut next);
            next.recompute_derived();
            next.clear_transitional_status(&base);

            // Empty effective diff on an existing record: nothing to write.
            if fetched.is_some() && next == base {
                return Ok((next, stats));
            }

            stats.put_object_attempts += 1;
            let value = encode(&next)?;
            match self
                .ctx
                .store
                .put_object(SERVERS_BUCKET.name, uuid.as_str(), value, Some(guard))
                .await
            {
                Ok(_) => return Ok((next, stats)),
                Err(e) if e.is_etag_conflict() => {
                    stats.put_object_etag_errors += 1;
                    if attempt >= opts.etag_retries {
                        return Err(ModelError::EtagRetriesExhausted(uuid.clone()));
                    }
                    attempt += 1;
                }
                Err(e) => {
                    stats.put_object_errors += 1;
                    return Err(e.into());
                }
            }
        }
    }

    pub async fn delete(&self, uuid: &ServerUuid) -> Result<(), ModelError> {
        self.ctx
            .store
            .delete_object(SERVERS_BUCKET.name, uuid.as_str(), None)
            .await
            .map_err(|e| not_found_as_server(e, uuid))
    }

    /// Read the boot-defaults sentinel.
    pub async fn default_record(&self) -> Result<ServerRecord, ModelError> {
        let (value, _etag) =
            self.ctx.store.get_object(SERVERS_BUCKET.name, DEFAULT_SERVER_KEY).await?;
        decode(value)
    }

    /// Write boot defaults onto the sentinel. Operator-only surface.
    pub async fn put_default(
        &self,
        update: &ServerUpdate,
    ) -> Result<(ServerRecord, UpsertStats), ModelError> {
        self.upsert(&ServerUuid::new(DEFAULT_SERVER_KEY), update, &UpsertOpts::default()).await
    }

    /// Create the sentinel if this is a fresh deployment.
    pub async fn ensure_default(&self) -> Result<(), ModelError> {
        match self.ctx.store.get_object(SERVERS_BUCKET.name, DEFAULT_SERVER_KEY).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                let sentinel = ServerRecord::default_sentinel(self.ctx.now_utc());
                match self
                    .ctx
                    .store
                    .put_object(
                        SERVERS_BUCKET.name,
                        DEFAULT_SERVER_KEY,
                        encode(&sentinel)?,
                        Some(EtagGuard::Absent),
                    )
                    .await
                {
                    Ok(_) => Ok(()),
                    // Another replica created it first.
                    Err(e) if e.is_conflict() => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Status-only write used by the reconciler: never creates, never
    /// retries, so a conflict or missing record surfaces immediately.
    pub async fn write_status(
        &self,
        uuid: &ServerUuid,
        status: ServerStatus,
    ) -> Result<UpsertStats, ModelError> {
        let opts = UpsertOpts { allow_create: false, etag_retries: 0, ..UpsertOpts::default() };
        let (_, stats) = self.upsert(uuid, &ServerUpdate::status(status), &opts).await?;
        Ok(stats)
    }
}

fn decode(value: Value) -> Result<ServerRecord, ModelError> {
    serde_json::from_value(value).map_err(|e| ModelError::Corrupt(e.to_string()))
}

fn encode(record: &ServerRecord) -> Result<Value, ModelError> {
    serde_json::to_value(record).map_err(|e| ModelError::Corrupt(e.to_string()))
}

fn not_found_as_server(e: StoreError, uuid: &ServerUuid) -> ModelError {
    if e.is_not_found() {
        ModelError::ServerNotFound(uuid.clone())
    } else {
        e.into()
    }
}

#[cfg(test)]
#[path = "server_model_tests.rs"]
mod tests;
