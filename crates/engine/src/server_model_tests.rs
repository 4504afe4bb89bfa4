// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::test_ctx;
use async_trait::async_trait;
use cnapi_core::test_support::ServerBuilder;
use cnapi_core::{ServerUpdate, TransitionalStatus};
use cnapi_storage::{BatchOp, FoundObject, MemoryStore, Store};
use serde_json::json;
use std::sync::Arc;

const S1: &str = "00000000-0000-4000-8000-000000000001";
const S2: &str = "00000000-0000-4000-8000-000000000002";

fn model() -> (ServerModel<cnapi_core::ManualClock>, crate::test_helpers::TestCtx) {
    let fixture = test_ctx();
    (ServerModel::new(fixture.ctx.clone()), fixture)
}

async fn seed(fixture: &crate::test_helpers::TestCtx, record: &cnapi_core::ServerRecord) {
    fixture
        .store
        .put_object(
            SERVERS_BUCKET.name,
            record.uuid.as_str(),
            serde_json::to_value(record).unwrap(),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn upsert_synthesizes_missing_record() {
    let (model, _fixture) = model();
    let update = ServerUpdate { hostname: Some("cn1".to_string()), ..ServerUpdate::default() };

    let (record, stats) =
        model.upsert(&ServerUuid::new(S1), &update, &UpsertOpts::default()).await.unwrap();

    assert_eq!(record.hostname, "cn1");
    assert_eq!(record.datacenter, "test-dc");
    assert_eq!(record.status, cnapi_core::ServerStatus::Unknown);
    assert_eq!(stats.get_object_not_found, 1);
    assert_eq!(stats.put_object_attempts, 1);
}

#[tokio::test]
async fn upsert_without_allow_create_surfaces_not_found() {
    let (model, _fixture) = model();
    let opts = UpsertOpts { allow_create: false, ..UpsertOpts::default() };

    let err = model
        .upsert(&ServerUuid::new(S1), &ServerUpdate::default(), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::ServerNotFound(_)));
}

#[tokio::test]
async fn upsert_with_empty_diff_skips_the_write() {
    let (model, fixture) = model();
    seed(&fixture, &ServerBuilder::new(S1).build()).await;

    let update = ServerUpdate::default();
    let (_, stats) =
        model.upsert(&ServerUuid::new(S1), &update, &UpsertOpts::default()).await.unwrap();

    assert_eq!(stats.get_object_attempts, 1);
    assert_eq!(stats.put_object_attempts, 0);
}

#[tokio::test]
async fn upsert_guards_identity_fields() {
    let (model, fixture) = model();
    let seeded = ServerBuilder::new(S1).build();
    seed(&fixture, &seeded).await;

    let update = ServerUpdate {
        hostname: Some("impostor".to_string()),
        reserved: Some(true),
        ..ServerUpdate::default()
    };
    let (record, _) =
        model.upsert(&ServerUuid::new(S1), &update, &UpsertOpts::default()).await.unwrap();
    assert_eq!(record.hostname, seeded.hostname);
    assert!(record.reserved);

    let opts = UpsertOpts { override_nonupdatable: true, ..UpsertOpts::default() };
    let (record, _) = model.upsert(&ServerUuid::new(S1), &update, &opts).await.unwrap();
    assert_eq!(record.hostname, "impostor");
}

#[tokio::test]
async fn upsert_recomputes_provisionable_memory() {
    let (model, fixture) = model();
    seed(&fixture, &ServerBuilder::new(S1).build()).await;

    let update = ServerUpdate {
        memory_total_bytes: Some(1_000_000),
        reservation_ratio: Some(0.10),
        ..ServerUpdate::default()
    };
    let (record, _) =
        model.upsert(&ServerUuid::new(S1), &update, &UpsertOpts::default()).await.unwrap();
    assert_eq!(record.memory_provisionable_bytes, 900_000);
}

#[tokio::test]
async fn upsert_to_running_clears_reboot_transition() {
    let (model, fixture) = model();
    let mut seeded = ServerBuilder::new(S1).build();
    seeded.transitional_status = Some(TransitionalStatus::Rebooting);
    seed(&fixture, &seeded).await;

    let (record, _) = model
        .upsert(
            &ServerUuid::new(S1),
            &ServerUpdate::status(cnapi_core::ServerStatus::Running),
            &UpsertOpts::default(),
        )
        .await
        .unwrap();
    assert_eq!(record.status, cnapi_core::ServerStatus::Running);
    assert_eq!(record.transitional_status, None);
}

#[tokio::test]
async fn get_surfaces_rebooting_status() {
    let (model, fixture) = model();
    let mut seeded = ServerBuilder::new(S1).build();
    seeded.transitional_status = Some(TransitionalStatus::Rebooting);
    seed(&fixture, &seeded).await;

    let record = model.get(&ServerUuid::new(S1)).await.unwrap();
    assert_eq!(record.status, cnapi_core::ServerStatus::Rebooting);
}

#[tokio::test]
async fn get_missing_is_server_not_found() {
    let (model, _fixture) = model();
    let err = model.get(&ServerUuid::new(S1)).await.unwrap_err();
    assert!(matches!(err, ModelError::ServerNotFound(_)));
}

#[tokio::test]
async fn list_excludes_sentinel_and_strips_reported_fields() {
    let (model, fixture) = model();
    model.ensure_default().await.unwrap();
    let seeded = ServerBuilder::new(S1).agent_ip("10.0.0.1").setup().build();
    seed(&fixture, &seeded).await;

    let servers = model.list(&ServerFilter::default(), &ListOpts::default()).await.unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].uuid, seeded.uuid);
    assert!(servers[0].sysinfo.is_null());

    let opts = ListOpts { extras: vec![ReportedExtra::Sysinfo], ..ListOpts::default() };
    let servers = model.list(&ServerFilter::default(), &opts).await.unwrap();
    assert_eq!(servers[0].sysinfo["CN Agent IP"], "10.0.0.1");
}

#[tokio::test]
async fn list_filters_by_setup_and_uuid_union() {
    let (model, fixture) = model();
    seed(&fixture, &ServerBuilder::new(S1).setup().build()).await;
    seed(&fixture, &ServerBuilder::new(S2).build()).await;

    let filter = ServerFilter { setup: Some(true), ..ServerFilter::default() };
    let servers = model.list(&filter, &ListOpts::default()).await.unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].uuid, S1);

    let filter = ServerFilter {
        uuids: Some(vec![ServerUuid::new(S1), ServerUuid::new(S2)]),
        ..ServerFilter::default()
    };
    let servers = model.list(&filter, &ListOpts::default()).await.unwrap();
    assert_eq!(servers.len(), 2);
}

#[tokio::test]
async fn delete_removes_the_record() {
    let (model, fixture) = model();
    seed(&fixture, &ServerBuilder::new(S1).build()).await;

    model.delete(&ServerUuid::new(S1)).await.unwrap();
    let err = model.get(&ServerUuid::new(S1)).await.unwrap_err();
    assert!(matches!(err, ModelError::ServerNotFound(_)));
}

#[tokio::test]
async fn ensure_default_is_idempotent() {
    let (model, _fixture) = model();
    model.ensure_default().await.unwrap();
    model.ensure_default().await.unwrap();
    let sentinel = model.default_record().await.unwrap();
    assert!(sentinel.is_default_sentinel());
}

#[tokio::test]
async fn default_sentinel_takes_boot_param_writes() {
    let (model, _fixture) = model();
    model.ensure_default().await.unwrap();

    let mut boot_params = std::collections::BTreeMap::new();
    boot_params.insert("rabbitmq".to_string(), json!("guest:guest:10.0.0.20:5672"));
    let update = ServerUpdate { boot_params: Some(boot_params), ..ServerUpdate::default() };
    model.put_default(&update).await.unwrap();

    let sentinel = model.default_record().await.unwrap();
    assert_eq!(sentinel.boot_params["rabbitmq"], "guest:guest:10.0.0.20:5672");
}

// Store wrapper that fails every put with an ETag conflict, for the
// retry-exhaustion path.
struct AlwaysConflicts {
    inner: MemoryStore,
}

#[async_trait]
impl Store for AlwaysConflicts {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<(serde_json::Value, cnapi_storage::Etag), cnapi_storage::StoreError> {
        self.inner.get_object(bucket, key).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        _value: serde_json::Value,
        _guard: Option<cnapi_storage::EtagGuard>,
    ) -> Result<cnapi_storage::Etag, cnapi_storage::StoreError> {
        Err(cnapi_storage::StoreError::EtagConflict {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        guard: Option<cnapi_storage::EtagGuard>,
    ) -> Result<(), cnapi_storage::StoreError> {
        self.inner.delete_object(bucket, key, guard).await
    }

    async fn delete_many(
        &self,
        bucket: &str,
        filter: &cnapi_storage::Filter,
    ) -> Result<u64, cnapi_storage::StoreError> {
        self.inner.delete_many(bucket, filter).await
    }

    async fn find_objects(
        &self,
        bucket: &str,
        filter: &cnapi_storage::Filter,
        opts: &cnapi_storage::FindOpts,
    ) -> Result<Vec<FoundObject>, cnapi_storage::StoreError> {
        self.inner.find_objects(bucket, filter, opts).await
    }

    async fn count_objects(
        &self,
        bucket: &str,
        filter: &cnapi_storage::Filter,
    ) -> Result<u64, cnapi_storage::StoreError> {
        self.inner.count_objects(bucket, filter).await
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), cnapi_storage::StoreError> {
        self.inner.batch(ops).await
    }
}

#[tokio::test]
async fn upsert_reports_exhausted_retries_distinctly() {
    let inner = MemoryStore::new();
    let seeded = ServerBuilder::new(S1).build();
    inner
        .put_object(SERVERS_BUCKET.name, S1, serde_json::to_value(&seeded).unwrap(), None)
        .await
        .unwrap();

    let clock = cnapi_core::ManualClock::new();
    let agents = Arc::new(cnapi_adapters::FakeAgentClient::new());
    let ctx = Context::new(
        clock,
        Arc::new(AlwaysConflicts { inner }) as Arc<dyn Store>,
        agents as Arc<dyn cnapi_adapters::AgentClient>,
        "test-dc",
    );
    let model = ServerModel::new(ctx);

    let update = ServerUpdate { reserved: Some(true), ..ServerUpdate::default() };
    let opts = UpsertOpts { etag_retries: 2, ..UpsertOpts::default() };
    let err = model.upsert(&ServerUuid::new(S1), &update, &opts).await.unwrap_err();
    assert!(matches!(err, ModelError::EtagRetriesExhausted(_)));
}
