// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store interface every backend implements.

use crate::filter::{Filter, SortOrder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Server-assigned opaque concurrency token. A new one is minted on every
/// successful write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Etag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtagGuard {
    /// The stored object's ETag must match.
    Match(Etag),
    /// No object may exist under the key (create-only).
    Absent,
}

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("etag conflict on {bucket}/{key}")]
    EtagConflict { bucket: String, key: String },
    #[error("unique constraint violated: {bucket}.{field}")]
    UniqueConflict { bucket: String, field: String },
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_etag_conflict(&self) -> bool {
        matches!(self, StoreError::EtagConflict { .. })
    }

    /// ETag or unique conflicts both mean another actor won the write race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::EtagConflict { .. } | StoreError::UniqueConflict { .. })
    }
}

/// One object returned by `find_objects`.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundObject {
    pub key: String,
    pub value: Value,
    pub etag: Etag,
}

/// Options for `find_objects`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOpts {
    /// Field to sort by; unsorted (backend order) when absent.
    pub sort: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl FindOpts {
    pub fn sorted_by(field: &str, order: SortOrder) -> Self {
        Self { sort: Some((field.to_string(), order)), ..Self::default() }
    }
}

/// One operation in an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Put { bucket: String, key: String, value: Value, guard: Option<EtagGuard> },
    Delete { bucket: String, key: String, guard: Option<EtagGuard> },
}

impl BatchOp {
    pub fn put(bucket: &str, key: &str, value: Value, guard: Option<EtagGuard>) -> Self {
        BatchOp::Put { bucket: bucket.to_string(), key: key.to_string(), value, guard }
    }

    pub fn delete(bucket: &str, key: &str, guard: Option<EtagGuard>) -> Self {
        BatchOp::Delete { bucket: bucket.to_string(), key: key.to_string(), guard }
    }
}

/// Indexed key/value store with per-object ETags and atomic multi-key
/// batches. All mutations either apply fully or not at all.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<(Value, Etag), StoreError>;

    /// Write an object, returning its new ETag. `guard` enforces the
    /// optimistic-concurrency precondition.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        value: Value,
        guard: Option<EtagGuard>,
    ) -> Result<Etag, StoreError>;

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        guard: Option<EtagGuard>,
    ) -> Result<(), StoreError>;

    /// Delete every object matching the filter; returns how many went.
    async fn delete_many(&self, bucket: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn find_objects(
        &self,
        bucket: &str,
        filter: &Filter,
        opts: &FindOpts,
    ) -> Result<Vec<FoundObject>, StoreError>;

    /// Aggregate count without materializing objects.
    async fn count_objects(&self, bucket: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Apply all operations atomically. Any guard or unique-constraint
    /// failure aborts the whole batch.
    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError>;
}
