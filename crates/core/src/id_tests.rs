// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_are_unique() {
    let a = TicketUuid::generate();
    let b = TicketUuid::generate();
    assert_ne!(a, b);
}

#[test]
fn generated_ids_are_valid_uuids() {
    let id = TaskId::generate();
    assert_eq!(id.as_str().len(), 36);
    assert_eq!(id.as_str().matches('-').count(), 4);
}

#[test]
fn id_round_trips_through_serde() {
    let id = ServerUuid::new("564d4d2c-1234-4f00-aaaa-000000000001");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"564d4d2c-1234-4f00-aaaa-000000000001\"");
    let back: ServerUuid = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn id_compares_with_str() {
    let id = ServerUuid::new("abc");
    assert_eq!(id, "abc");
    assert_eq!(id, *"abc");
}

#[test]
fn id_display_matches_inner() {
    let id = TicketUuid::new("t-1");
    assert_eq!(format!("{}", id), "t-1");
}
