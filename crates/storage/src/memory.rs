// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store backend.
//!
//! Backs every test and the daemon's standalone mode. One mutex guards all
//! buckets, which is what makes `batch` atomic: guards and unique
//! constraints are validated for the entire batch before the first write
//! lands.

use crate::buckets;
use crate::filter::{compare_json, Filter, SortOrder};
use crate::store::{BatchOp, Etag, EtagGuard, FindOpts, FoundObject, Store, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Stored {
    value: Value,
    etag: Etag,
}

#[derive(Default)]
pub struct MemoryStore {
    // BTreeMap keeps iteration deterministic for unsorted finds.
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Stored>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw snapshot of a bucket's values, for test assertions.
    pub fn dump(&self, bucket: &str) -> Vec<(String, Value)> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|objects| {
                objects.iter().map(|(k, s)| (k.clone(), s.value.clone())).collect()
            })
            .unwrap_or_default()
    }
}

fn check_guard(
    bucket: &str,
    key: &str,
    existing: Option<&Stored>,
    guard: &Option<EtagGuard>,
) -> Result<(), StoreError> {
    match (guard, existing) {
        (None, _) => Ok(()),
        (Some(EtagGuard::Absent), None) => Ok(()),
        (Some(EtagGuard::Absent), Some(_)) => {
            Err(StoreError::EtagConflict { bucket: bucket.to_string(), key: key.to_string() })
        }
        (Some(EtagGuard::Match(want)), Some(stored)) if stored.etag == *want => Ok(()),
        (Some(EtagGuard::Match(_)), _) => {
            Err(StoreError::EtagConflict { bucket: bucket.to_string(), key: key.to_string() })
        }
    }
}

/// Reject a put that would duplicate a unique-indexed field value held by
/// a different key.
fn check_unique(
    bucket_name: &str,
    objects: &BTreeMap<String, Stored>,
    key: &str,
    value: &Value,
) -> Result<(), StoreError> {
    let Some(config) = buckets::config_for(bucket_name) else {
        return Ok(());
    };
    for field in config.unique {
        let Some(candidate) = value.get(*field) else { continue };
        if candidate.is_null() {
            continue;
        }
        let taken = objects.iter().any(|(other_key, stored)| {
            other_key != key && stored.value.get(*field) == Some(candidate)
        });
        if taken {
            return Err(StoreError::UniqueConflict {
                bucket: bucket_name.to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

fn sort_objects(results: &mut [FoundObject], field: &str, order: SortOrder) {
    results.sort_by(|a, b| {
        let ord = match (a.value.get(field), b.value.get(field)) {
            (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<(Value, Etag), StoreError> {
        let buckets = self.buckets.lock();
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|stored| (stored.value.clone(), stored.etag.clone()))
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        value: Value,
        guard: Option<EtagGuard>,
    ) -> Result<Etag, StoreError> {
        let mut buckets = self.buckets.lock();
        let objects = buckets.entry(bucket.to_string()).or_default();
        check_guard(bucket, key, objects.get(key), &guard)?;
        check_unique(bucket, objects, key, &value)?;
        let etag = Etag::generate();
        objects.insert(key.to_string(), Stored { value, etag: etag.clone() });
        Ok(etag)
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        guard: Option<EtagGuard>,
    ) -> Result<(), StoreError> {
        let mut buckets = self.buckets.lock();
        let objects = buckets.get_mut(bucket).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        match objects.get(key) {
            Some(stored) => {
                check_guard(bucket, key, Some(stored), &guard)?;
                objects.remove(key);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn delete_many(&self, bucket: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut buckets = self.buckets.lock();
        let Some(objects) = buckets.get_mut(bucket) else { return Ok(0) };
        let before = objects.len();
        objects.retain(|_, stored| !filter.matches(&stored.value));
        Ok((before - objects.len()) as u64)
    }

    async fn find_objects(
        &self,
        bucket: &str,
        filter: &Filter,
        opts: &FindOpts,
    ) -> Result<Vec<FoundObject>, StoreError> {
        let buckets = self.buckets.lock();
        let mut results: Vec<FoundObject> = buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|(_, stored)| filter.matches(&stored.value))
                    .map(|(key, stored)| FoundObject {
                        key: key.clone(),
                        value: stored.value.clone(),
                        etag: stored.etag.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, order)) = &opts.sort {
            sort_objects(&mut results, field, *order);
        }

        let results = results.into_iter().skip(opts.offset);
        Ok(match opts.limit {
            Some(limit) => results.take(limit).collect(),
            None => results.collect(),
        })
    }

    async fn count_objects(&self, bucket: &str, filter: &Filter) -> Result<u64, StoreError> {
        let buckets = self.buckets.lock();
        Ok(buckets
            .get(bucket)
            .map(|objects| objects.values().filter(|s| filter.matches(&s.value)).count() as u64)
            .unwrap_or(0))
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut buckets = self.buckets.lock();

        // Validate every op against a staged copy so a late conflict
        // cannot leave earlier writes behind.
        let mut staged = buckets.clone();
        for op in &ops {
            match op {
                BatchOp::Put { bucket, key, value, guard } => {
                    let objects = staged.entry(bucket.clone()).or_default();
                    check_guard(bucket, key, objects.get(key), guard)?;
                    check_unique(bucket, objects, key, value)?;
                    objects.insert(
                        key.clone(),
                        Stored { value: value.clone(), etag: Etag::generate() },
                    );
                }
                BatchOp::Delete { bucket, key, guard } => {
                    let objects = staged.entry(bucket.clone()).or_default();
                    match objects.get(key) {
                        Some(stored) => {
                            check_guard(bucket, key, Some(stored), guard)?;
                            objects.remove(key);
                        }
                        None => {
                            return Err(StoreError::NotFound {
                                bucket: bucket.clone(),
                                key: key.clone(),
                            })
                        }
                    }
                }
            }
        }

        *buckets = staged;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
