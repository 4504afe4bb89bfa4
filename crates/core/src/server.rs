// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compute node server record: the typed shape of `cnapi_servers` objects.
//!
//! The record is partitioned into identity fields (immutable once set),
//! state fields, agent-reported fields, resource telemetry, and boot
//! configuration. `ServerUpdate` enumerates every field a write may touch;
//! anything outside it cannot reach the store, which is how unexpected
//! keys get stripped.

use crate::id::ServerUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of total memory withheld from provisioning when the operator has
/// not set a ratio on the server.
pub const DEFAULT_RESERVATION_RATIO: f64 = 0.15;

/// Default TCP port of the per-node task agent.
pub const DEFAULT_AGENT_PORT: u16 = 5309;

/// Server liveness as persisted by the heartbeat reconciler.
///
/// `Rebooting` never lands in the store on its own; it is surfaced at read
/// time when `transitional_status` says the node is mid-reboot and the
/// underlying status is `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Unknown,
    Rebooting,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Running => "running",
            ServerStatus::Unknown => "unknown",
            ServerStatus::Rebooting => "rebooting",
        };
        write!(f, "{}", s)
    }
}

/// In-flight operator transition. The only recognized value is a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionalStatus {
    Rebooting,
}

/// One VM as reported by the node's agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VmEntry {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub max_physical_memory: u64,
    #[serde(default)]
    pub quota: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One installed agent as reported in sysinfo's "SDC Agents" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Where to reach the node's task agent, derived from sysinfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysinfoEndpoint {
    pub ip: String,
    pub port: u16,
}

impl SysinfoEndpoint {
    /// Render the task endpoint URL the dispatcher POSTs to.
    pub fn tasks_url(&self) -> String {
        format!("http://{}:{}/tasks", self.ip, self.port)
    }
}

/// The full stored server record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    // Identity: never changes after the initial write unless the caller
    // asserts the override flag.
    pub uuid: ServerUuid,
    pub hostname: String,
    pub datacenter: String,
    pub created: DateTime<Utc>,

    // State
    pub status: ServerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitional_status: Option<TransitionalStatus>,
    pub setup: bool,
    #[serde(default)]
    pub setting_up: bool,
    #[serde(default)]
    pub headnode: bool,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub reservoir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_boot: Option<DateTime<Utc>>,

    // Reported by the node's agent
    #[serde(default)]
    pub sysinfo: serde_json::Value,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
    #[serde(default)]
    pub vms: BTreeMap<String, VmEntry>,

    // Resource telemetry
    #[serde(default)]
    pub reservation_ratio: f64,
    #[serde(default)]
    pub disk_cores_quota_bytes: u64,
    #[serde(default)]
    pub disk_cores_quota_used_bytes: u64,
    #[serde(default)]
    pub disk_installed_images_used_bytes: u64,
    #[serde(default)]
    pub disk_kvm_quota_bytes: u64,
    #[serde(default)]
    pub disk_kvm_quota_used_bytes: u64,
    #[serde(default)]
    pub disk_kvm_zvol_used_bytes: u64,
    #[serde(default)]
    pub disk_kvm_zvol_volsize_bytes: u64,
    #[serde(default)]
    pub disk_pool_alloc_bytes: u64,
    #[serde(default)]
    pub disk_pool_size_bytes: u64,
    #[serde(default)]
    pub disk_system_used_bytes: u64,
    #[serde(default)]
    pub disk_zone_quota_bytes: u64,
    #[serde(default)]
    pub disk_zone_quota_used_bytes: u64,
    #[serde(default)]
    pub memory_available_bytes: u64,
    #[serde(default)]
    pub memory_arc_bytes: u64,
    #[serde(default)]
    pub memory_total_bytes: u64,
    /// Derived: floor(total × (1 − reservation_ratio) − Σ vm memory).
    /// Recomputed on every write that touches its inputs; can go negative
    /// on an overcommitted node.
    #[serde(default)]
    pub memory_provisionable_bytes: i64,

    // Boot configuration
    #[serde(default)]
    pub boot_params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub kernel_flags: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub boot_modules: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_platform: Option<String>,
    #[serde(default)]
    pub default_console: String,
    #[serde(default)]
    pub serial: String,
}

impl ServerRecord {
    /// Synthesize a record for a server seen for the first time.
    ///
    /// Status starts `unknown`; the reconciler promotes it to `running`
    /// once a heartbeat lands in the status table.
    pub fn new(uuid: ServerUuid, datacenter: &str, created: DateTime<Utc>) -> Self {
        Self {
            uuid,
            hostname: String::new(),
            datacenter: datacenter.to_string(),
            created,
            status: ServerStatus::Unknown,
            transitional_status: None,
            setup: false,
            setting_up: false,
            headnode: false,
            reserved: false,
            reservoir: false,
            last_boot: None,
            sysinfo: serde_json::Value::Null,
            agents: Vec::new(),
            vms: BTreeMap::new(),
            reservation_ratio: DEFAULT_RESERVATION_RATIO,
            disk_cores_quota_bytes: 0,
            disk_cores_quota_used_bytes: 0,
            disk_installed_images_used_bytes: 0,
            disk_kvm_quota_bytes: 0,
            disk_kvm_quota_used_bytes: 0,
            disk_kvm_zvol_used_bytes: 0,
            disk_kvm_zvol_volsize_bytes: 0,
            disk_pool_alloc_bytes: 0,
            disk_pool_size_bytes: 0,
            disk_system_used_bytes: 0,
            disk_zone_quota_bytes: 0,
            disk_zone_quota_used_bytes: 0,
            memory_available_bytes: 0,
            memory_arc_bytes: 0,
            memory_total_bytes: 0,
            memory_provisionable_bytes: 0,
            boot_params: BTreeMap::new(),
            kernel_flags: BTreeMap::new(),
            boot_modules: Vec::new(),
            boot_platform: None,
            default_console: "serial".to_string(),
            serial: "ttyb".to_string(),
        }
    }

    /// The sentinel record holding fleet-wide boot defaults.
    ///
    /// Lives under the literal key `default` in the servers bucket and is
    /// excluded from every listing.
    pub fn default_sentinel(created: DateTime<Utc>) -> Self {
        let mut record = Self::new(ServerUuid::new("default"), "", created);
        record.hostname = "default".to_string();
        record
    }

    pub fn is_default_sentinel(&self) -> bool {
        self.uuid == "default"
    }

    /// Recompute every derived field after an update has been applied.
    ///
    /// - `memory_provisionable_bytes` follows its formula.
    /// - `agents` backfills from sysinfo's "SDC Agents" list, but only when
    ///   no agent has reported the richer list yet.
    pub fn recompute_derived(&mut self) {
        let reserved = self.memory_total_bytes as f64 * (1.0 - self.reservation_ratio);
        let vm_sum: u64 = self.vms.values().map(|vm| vm.max_physical_memory).sum();
        self.memory_provisionable_bytes = reserved.floor() as i64 - vm_sum as i64;

        if self.agents.is_empty() {
            if let Some(list) = self.sysinfo.get("SDC Agents") {
                if let Ok(agents) = serde_json::from_value::<Vec<AgentEntry>>(list.clone()) {
                    self.agents = agents;
                }
            }
        }
    }

    /// Clear `transitional_status` when the write indicates the reboot the
    /// transition was tracking has finished: the server came back
    /// (`unknown → running`) or reported a new boot time while running.
    pub fn clear_transitional_status(&mut self, prior: &ServerRecord) {
        if self.status == ServerStatus::Running
            && (prior.status == ServerStatus::Unknown || self.last_boot != prior.last_boot)
        {
            self.transitional_status = None;
        }
    }

    /// Apply the read-surface status rule: a node mid-reboot whose
    /// heartbeats have gone quiet reads as `rebooting`, not `unknown`.
    pub fn surfaced(mut self) -> Self {
        if self.status == ServerStatus::Unknown
            && self.transitional_status == Some(TransitionalStatus::Rebooting)
        {
            self.status = ServerStatus::Rebooting;
        }
        self
    }

    /// Resolve the node's task agent endpoint from reported sysinfo.
    ///
    /// Prefers the explicit "CN Agent IP", then "Admin IP", then the first
    /// admin-named NIC. Port comes from "CN Agent Port" when present.
    pub fn agent_endpoint(&self) -> Option<SysinfoEndpoint> {
        let ip = sysinfo_str(&self.sysinfo, "CN Agent IP")
            .or_else(|| sysinfo_str(&self.sysinfo, "Admin IP"))
            .or_else(|| admin_nic_ip(&self.sysinfo))?;

        let port = self
            .sysinfo
            .get("CN Agent Port")
            .and_then(value_as_port)
            .unwrap_or(DEFAULT_AGENT_PORT);

        Some(SysinfoEndpoint { ip, port })
    }
}

fn sysinfo_str(sysinfo: &serde_json::Value, key: &str) -> Option<String> {
    sysinfo.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(String::from)
}

fn value_as_port(v: &serde_json::Value) -> Option<u16> {
    match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Scan "Network Interfaces" for a NIC whose "NIC Names" include "admin".
fn admin_nic_ip(sysinfo: &serde_json::Value) -> Option<String> {
    let nics = sysinfo.get("Network Interfaces")?.as_object()?;
    for nic in nics.values() {
        let is_admin = nic
            .get("NIC Names")
            .and_then(|names| names.as_array())
            .is_some_and(|names| names.iter().any(|n| n.as_str() == Some("admin")));
        if is_admin {
            if let Some(ip) = nic.get("ip4addr").and_then(|v| v.as_str()) {
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }
    None
}

/// A partial server write. Every field an upsert may touch appears here;
/// deserializing a payload with any other key is an error, which is what
/// keeps stray keys out of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerUpdate {
    // Identity: dropped by the model unless the caller asserts override.
    pub uuid: Option<ServerUuid>,
    pub hostname: Option<String>,
    pub created: Option<DateTime<Utc>>,

    pub datacenter: Option<String>,
    pub status: Option<ServerStatus>,
    /// `Some(None)` clears an in-flight transition; `None` leaves it alone.
    /// An explicit `null` in a payload means "clear".
    #[serde(
        deserialize_with = "clearable_transition",
        skip_serializing_if = "Option::is_none"
    )]
    pub transitional_status: Option<Option<TransitionalStatus>>,
    pub setup: Option<bool>,
    pub setting_up: Option<bool>,
    pub headnode: Option<bool>,
    pub reserved: Option<bool>,
    pub reservoir: Option<bool>,
    pub last_boot: Option<DateTime<Utc>>,

    pub sysinfo: Option<serde_json::Value>,
    pub agents: Option<Vec<AgentEntry>>,
    pub vms: Option<BTreeMap<String, VmEntry>>,

    pub reservation_ratio: Option<f64>,
    pub disk_cores_quota_bytes: Option<u64>,
    pub disk_cores_quota_used_bytes: Option<u64>,
    pub disk_installed_images_used_bytes: Option<u64>,
    pub disk_kvm_quota_bytes: Option<u64>,
    pub disk_kvm_quota_used_bytes: Option<u64>,
    pub disk_kvm_zvol_used_bytes: Option<u64>,
    pub disk_kvm_zvol_volsize_bytes: Option<u64>,
    pub disk_pool_alloc_bytes: Option<u64>,
    pub disk_pool_size_bytes: Option<u64>,
    pub disk_system_used_bytes: Option<u64>,
    pub disk_zone_quota_bytes: Option<u64>,
    pub disk_zone_quota_used_bytes: Option<u64>,
    pub memory_available_bytes: Option<u64>,
    pub memory_arc_bytes: Option<u64>,
    pub memory_total_bytes: Option<u64>,

    pub boot_params: Option<BTreeMap<String, serde_json::Value>>,
    pub kernel_flags: Option<BTreeMap<String, serde_json::Value>>,
    pub boot_modules: Option<Vec<serde_json::Value>>,
    pub boot_platform: Option<String>,
    pub default_console: Option<String>,
    pub serial: Option<String>,
}

impl ServerUpdate {
    /// Shorthand for the reconciler's status-only write.
    pub fn status(status: ServerStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    /// True when no field is set; such an update never reaches the store.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Drop identity fields that would change existing values. Called by
    /// the model unless the caller passed the override flag.
    pub fn guard_nonupdatable(&mut self, current: &ServerRecord) {
        if self.uuid.as_ref().is_some_and(|u| *u != current.uuid) {
            self.uuid = None;
        }
        if self.hostname.as_ref().is_some_and(|h| *h != current.hostname) {
            self.hostname = None;
        }
        if self.created.is_some_and(|c| c != current.created) {
            self.created = None;
        }
    }

    /// Apply every set field onto the record. Derived fields and the
    /// transitional-status clearing rule are the record's own business and
    /// run afterwards.
    pub fn apply(&self, record: &mut ServerRecord) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = &self.$field {
                    record.$field = v.clone();
                }
            };
        }

        set!(uuid);
        set!(hostname);
        set!(created);
        set!(datacenter);
        set!(status);
        if let Some(transition) = &self.transitional_status {
            record.transitional_status = *transition;
        }
        set!(setup);
        set!(setting_up);
        set!(headnode);
        set!(reserved);
        set!(reservoir);
        if let Some(last_boot) = self.last_boot {
            record.last_boot = Some(last_boot);
        }
        set!(sysinfo);
        set!(agents);
        set!(vms);
        set!(reservation_ratio);
        set!(disk_cores_quota_bytes);
        set!(disk_cores_quota_used_bytes);
        set!(disk_installed_images_used_bytes);
        set!(disk_kvm_quota_bytes);
        set!(disk_kvm_quota_used_bytes);
        set!(disk_kvm_zvol_used_bytes);
        set!(disk_kvm_zvol_volsize_bytes);
        set!(disk_pool_alloc_bytes);
        set!(disk_pool_size_bytes);
        set!(disk_system_used_bytes);
        set!(disk_zone_quota_bytes);
        set!(disk_zone_quota_used_bytes);
        set!(memory_available_bytes);
        set!(memory_arc_bytes);
        set!(memory_total_bytes);
        set!(boot_params);
        set!(kernel_flags);
        set!(boot_modules);
        if let Some(platform) = &self.boot_platform {
            record.boot_platform = Some(platform.clone());
        }
        set!(default_console);
        set!(serial);
    }
}

/// Distinguish an absent `transitional_status` (leave alone) from an
/// explicit `null` (clear). Plain `Option<Option<T>>` folds both to `None`.
fn clearable_transition<'de, D>(
    deserializer: D,
) -> Result<Option<Option<TransitionalStatus>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<TransitionalStatus>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
