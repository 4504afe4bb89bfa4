// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers for servers, tickets, and tasks.
//!
//! Server uuids come from the compute node itself (sysinfo); ticket and
//! task ids are generated here as v4 UUIDs.

/// Define a newtype ID wrapper around a UUID string.
///
/// Generates `generate()` for random v4 IDs, `new()` for parsing from any
/// string-ish value, `as_str()`, `Display`, `From`, and `PartialEq<str>`
/// implementations. IDs are stored as plain strings so records round-trip
/// through the store without canonicalization surprises.
macro_rules! define_uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id.
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_uuid_id! {
    /// UUID of a compute node, assigned by the node's own sysinfo.
    ServerUuid
}

define_uuid_id! {
    /// UUID of a waitlist ticket.
    TicketUuid
}

define_uuid_id! {
    /// Identifier of a dispatched agent task.
    TaskId
}

define_uuid_id! {
    /// Identity of one CNAPI replica, generated at process start.
    ///
    /// Written into every StatusRow this replica claims; other replicas use
    /// it to detect takeovers.
    CnapiInstanceId
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
