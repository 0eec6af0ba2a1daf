//! # Domain Types
//!
//! The service description model delivered by the control plane, and the
//! small value types derived from it.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ServiceDescription (one pool)                      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Pool       │   │   Vip (0..1)    │   │ Member (0..n)   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id  (KEY)      │   │  id             │   │  id             │       │
//! │  │  tenant_id      │   │  address:port   │   │  address:port   │       │
//! │  │  lb_method      │   │  port_id        │   │  weight         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ HealthMonitor   │   │ ResourceStatus  │   │  ServiceRecord  │       │
//! │  │  (0..n)         │   │  ACTIVE, ERROR  │   │  pool_id        │       │
//! │  │  type, delay    │   │  PENDING_*, ... │   │  port_id?       │       │
//! │  └─────────────────┘   └─────────────────┘   │  tenant_id      │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wire spellings follow the control plane: enum values are
//! `SCREAMING_SNAKE_CASE` (`ROUND_ROBIN`, `PENDING_CREATE`), the health
//! monitor kind is serialized under `type`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// Provisioning status of a load-balancer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Active,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Inactive,
    Error,
}

impl Default for ResourceStatus {
    fn default() -> Self {
        ResourceStatus::PendingCreate
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Active => write!(f, "ACTIVE"),
            ResourceStatus::PendingCreate => write!(f, "PENDING_CREATE"),
            ResourceStatus::PendingUpdate => write!(f, "PENDING_UPDATE"),
            ResourceStatus::PendingDelete => write!(f, "PENDING_DELETE"),
            ResourceStatus::Inactive => write!(f, "INACTIVE"),
            ResourceStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Front-end or back-end protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Http
    }
}

/// Load-balancing algorithm of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbMethod {
    RoundRobin,
    LeastConnections,
    SourceIp,
}

impl Default for LbMethod {
    fn default() -> Self {
        LbMethod::RoundRobin
    }
}

/// Kind of probe a health monitor performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorType {
    Ping,
    Tcp,
    Http,
    Https,
}

impl MonitorType {
    /// Returns true if the monitor issues HTTP requests (and so uses
    /// `http_method`, `url_path` and `expected_codes`).
    pub fn is_http(&self) -> bool {
        matches!(self, MonitorType::Http | MonitorType::Https)
    }
}

// =============================================================================
// Sub-resources
// =============================================================================

/// The logical backend group. Its `id` is the reconciliation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,

    pub tenant_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Subnet the members live on.
    #[serde(default)]
    pub subnet_id: Option<String>,

    #[serde(default)]
    pub protocol: Protocol,

    #[serde(default)]
    pub lb_method: LbMethod,

    #[serde(default = "default_true")]
    pub admin_state_up: bool,

    #[serde(default)]
    pub status: ResourceStatus,
}

/// The front-end virtual address of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vip {
    pub id: String,

    pub tenant_id: String,

    #[serde(default)]
    pub name: String,

    pub address: String,

    pub protocol_port: u16,

    #[serde(default)]
    pub protocol: Protocol,

    /// Control-plane port backing the virtual address, once allocated.
    #[serde(default)]
    pub port_id: Option<String>,

    #[serde(default)]
    pub subnet_id: Option<String>,

    /// Maximum concurrent connections; `None` means unlimited.
    #[serde(default, deserialize_with = "deserialize_connection_limit")]
    pub connection_limit: Option<u32>,

    #[serde(default = "default_true")]
    pub admin_state_up: bool,

    #[serde(default)]
    pub status: ResourceStatus,
}

/// One backend server of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,

    pub pool_id: String,

    pub address: String,

    pub protocol_port: u16,

    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(default = "default_true")]
    pub admin_state_up: bool,

    #[serde(default)]
    pub status: ResourceStatus,
}

/// A health probe attached to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMonitor {
    pub id: String,

    pub tenant_id: String,

    #[serde(rename = "type")]
    pub monitor_type: MonitorType,

    /// Seconds between probes.
    pub delay: u32,

    /// Seconds to wait for a probe response.
    pub timeout: u32,

    /// Failed probes before a member is marked down.
    pub max_retries: u32,

    #[serde(default)]
    pub http_method: Option<String>,

    #[serde(default)]
    pub url_path: Option<String>,

    #[serde(default)]
    pub expected_codes: Option<String>,

    #[serde(default = "default_true")]
    pub admin_state_up: bool,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

/// The control plane sends `-1` for no limit.
fn deserialize_connection_limit<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let limit = Option::<i64>::deserialize(deserializer)?;
    Ok(limit.and_then(|value| u32::try_from(value).ok()))
}

// =============================================================================
// Service Description
// =============================================================================

/// The full desired-state bundle for one pool, as delivered by the control
/// plane. Never persisted by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub pool: Pool,

    #[serde(default)]
    pub vip: Option<Vip>,

    #[serde(default)]
    pub members: Vec<Member>,

    #[serde(default)]
    pub health_monitors: Vec<HealthMonitor>,
}

impl ServiceDescription {
    /// Creates a description holding only a pool.
    pub fn new(pool: Pool) -> Self {
        ServiceDescription {
            pool,
            vip: None,
            members: Vec::new(),
            health_monitors: Vec::new(),
        }
    }

    /// Returns the pool ID (the reconciliation key).
    #[inline]
    pub fn pool_id(&self) -> &str {
        &self.pool.id
    }

    /// Returns the owning tenant.
    #[inline]
    pub fn tenant_id(&self) -> &str {
        &self.pool.tenant_id
    }

    /// Returns the VIP port ID, if a VIP with an allocated port exists.
    pub fn port_id(&self) -> Option<&str> {
        self.vip.as_ref().and_then(|vip| vip.port_id.as_deref())
    }

    /// Looks up a member by ID.
    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    /// Looks up a health monitor by ID.
    pub fn health_monitor(&self, monitor_id: &str) -> Option<&HealthMonitor> {
        self.health_monitors.iter().find(|m| m.id == monitor_id)
    }

    /// Returns the identity record used by the service cache.
    pub fn record(&self) -> ServiceRecord {
        ServiceRecord::from(self)
    }
}

// =============================================================================
// Service Record
// =============================================================================

/// Identity of one provisioned logical service.
///
/// Two records are equal iff pool, port and tenant all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub pool_id: String,
    pub port_id: Option<String>,
    pub tenant_id: String,
}

impl ServiceRecord {
    pub fn new(
        pool_id: impl Into<String>,
        port_id: Option<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        ServiceRecord {
            pool_id: pool_id.into(),
            port_id,
            tenant_id: tenant_id.into(),
        }
    }
}

impl From<&ServiceDescription> for ServiceRecord {
    fn from(service: &ServiceDescription) -> Self {
        ServiceRecord {
            pool_id: service.pool.id.clone(),
            port_id: service.port_id().map(str::to_string),
            tenant_id: service.pool.tenant_id.clone(),
        }
    }
}

// =============================================================================
// Status Reporting
// =============================================================================

/// Kind of sub-resource a status report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vip,
    Pool,
    Member,
    HealthMonitor,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Vip => write!(f, "vip"),
            ResourceKind::Pool => write!(f, "pool"),
            ResourceKind::Member => write!(f, "member"),
            ResourceKind::HealthMonitor => write!(f, "health_monitor"),
        }
    }
}

/// Addresses one sub-resource in a status report.
///
/// Health monitors are shared objects, so their status is scoped to the pool
/// they are associated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRef {
    Vip { id: String },
    Pool { id: String },
    Member { id: String },
    HealthMonitor { pool_id: String, monitor_id: String },
}

impl ResourceRef {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Vip { .. } => ResourceKind::Vip,
            ResourceRef::Pool { .. } => ResourceKind::Pool,
            ResourceRef::Member { .. } => ResourceKind::Member,
            ResourceRef::HealthMonitor { .. } => ResourceKind::HealthMonitor,
        }
    }

    /// Returns the ID of the addressed sub-resource.
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Vip { id } | ResourceRef::Pool { id } | ResourceRef::Member { id } => {
                id.as_str()
            }
            ResourceRef::HealthMonitor { monitor_id, .. } => monitor_id.as_str(),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind(), self.id())
    }
}

/// Traffic counters for one pool, as read from the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub active_connections: u64,
    pub total_connections: u64,

    /// Per-member operating status, keyed by member ID.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: BTreeMap<String, ResourceStatus>,
}

impl PoolStats {
    /// True when the device had nothing to report. Empty stats are not
    /// forwarded to the control plane.
    pub fn is_empty(&self) -> bool {
        self.bytes_in == 0
            && self.bytes_out == 0
            && self.active_connections == 0
            && self.total_connections == 0
            && self.members.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
