// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed query predicates over stored JSON objects.
//!
//! The external store speaks LDAP-style filter strings; inside the process
//! every query is built from this tree so field names and value types are
//! checked at the call site. Backends translate the tree into their native
//! filter syntax; the memory backend evaluates it directly.

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every object.
    All,
    Eq(String, Value),
    /// Matches when the field is absent or differs.
    Ne(String, Value),
    Ge(String, Value),
    Le(String, Value),
    /// Field exists and is non-null.
    Present(String),
    /// Field equals any of the listed values.
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(field.to_string(), value.into())
    }

    pub fn ge(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ge(field.to_string(), value.into())
    }

    pub fn le(field: &str, value: impl Into<Value>) -> Self {
        Filter::Le(field.to_string(), value.into())
    }

    pub fn present(field: &str) -> Self {
        Filter::Present(field.to_string())
    }

    pub fn any_of(field: &str, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Evaluate against a stored object. Objects are JSON maps; a non-map
    /// value matches nothing but `All`.
    pub fn matches(&self, object: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, want) => {
                field_value(object, field).is_some_and(|have| json_eq(have, want))
            }
            Filter::Ne(field, want) => {
                !field_value(object, field).is_some_and(|have| json_eq(have, want))
            }
            Filter::Ge(field, want) => field_value(object, field)
                .and_then(|have| compare_json(have, want))
                .is_some_and(|ord| ord != Ordering::Less),
            Filter::Le(field, want) => field_value(object, field)
                .and_then(|have| compare_json(have, want))
                .is_some_and(|ord| ord != Ordering::Greater),
            Filter::Present(field) => {
                field_value(object, field).is_some_and(|v| !v.is_null())
            }
            Filter::In(field, values) => field_value(object, field)
                .is_some_and(|have| values.iter().any(|want| json_eq(have, want))),
            Filter::And(filters) => filters.iter().all(|f| f.matches(object)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(object)),
            Filter::Not(inner) => !inner.matches(object),
        }
    }
}

/// Sort direction for `find_objects`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

fn field_value<'a>(object: &'a Value, field: &str) -> Option<&'a Value> {
    object.as_object().and_then(|map| map.get(field))
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match compare_json(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}

/// Ordering across stored values: numbers numerically, timestamp strings
/// chronologically, other strings lexicographically, booleans false < true.
/// Mixed types do not compare.
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().and_then(|x| y.as_f64().and_then(|y| x.partial_cmp(&y)))
        }
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// RFC 3339 timestamps sort by instant, not by their rendered precision.
fn parse_timestamp(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
