//! # Inbound Events
//!
//! Requests pushed by the control plane, applied one at a time by the agent
//! task.
//!
//! ## Event Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Inbound Event Categories                           │
//! │                                                                         │
//! │  SUB-RESOURCE CHANGES                                                  │
//! │  ────────────────────                                                  │
//! │  • create/update/delete for vip, pool, member, health_monitor          │
//! │  • Applied to the device immediately                                   │
//! │  • Failure → ERROR status on the sub-resource, no resync               │
//! │                                                                         │
//! │  POOL REQUESTS                                                         │
//! │  ─────────────                                                         │
//! │  • reload_pool: re-apply one pool (only if addressed to this host)     │
//! │  • get_pool_stats: read and report counters now                        │
//! │                                                                         │
//! │  AGENT STATE                                                           │
//! │  ───────────                                                           │
//! │  • agent_updated: admin up/down transition                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use lbaas_core::{HealthMonitor, Member, Pool, ServiceDescription, Vip};
use serde::{Deserialize, Serialize};

/// One inbound request. Every variant that changes a sub-resource carries
/// the full description of the enclosing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AgentEvent {
    CreateVip {
        vip: Vip,
        service: ServiceDescription,
    },
    UpdateVip {
        old_vip: Vip,
        vip: Vip,
        service: ServiceDescription,
    },
    DeleteVip {
        vip: Vip,
        service: ServiceDescription,
    },

    CreatePool {
        pool: Pool,
        service: ServiceDescription,
    },
    UpdatePool {
        old_pool: Pool,
        pool: Pool,
        service: ServiceDescription,
    },
    DeletePool {
        pool: Pool,
        service: ServiceDescription,
    },

    CreateMember {
        member: Member,
        service: ServiceDescription,
    },
    UpdateMember {
        old_member: Member,
        member: Member,
        service: ServiceDescription,
    },
    DeleteMember {
        member: Member,
        service: ServiceDescription,
    },

    CreateHealthMonitor {
        health_monitor: HealthMonitor,
        pool: Pool,
        service: ServiceDescription,
    },
    UpdateHealthMonitor {
        old_health_monitor: HealthMonitor,
        health_monitor: HealthMonitor,
        pool: Pool,
        service: ServiceDescription,
    },
    DeleteHealthMonitor {
        health_monitor: HealthMonitor,
        pool: Pool,
        service: ServiceDescription,
    },

    /// Re-apply one pool. Ignored unless `host` names this agent.
    ReloadPool { pool_id: String, host: String },

    GetPoolStats {
        pool: Pool,
        service: ServiceDescription,
    },

    AgentUpdated { admin_state_up: bool },
}

impl AgentEvent {
    /// Wire name of the event, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            AgentEvent::CreateVip { .. } => "create_vip",
            AgentEvent::UpdateVip { .. } => "update_vip",
            AgentEvent::DeleteVip { .. } => "delete_vip",
            AgentEvent::CreatePool { .. } => "create_pool",
            AgentEvent::UpdatePool { .. } => "update_pool",
            AgentEvent::DeletePool { .. } => "delete_pool",
            AgentEvent::CreateMember { .. } => "create_member",
            AgentEvent::UpdateMember { .. } => "update_member",
            AgentEvent::DeleteMember { .. } => "delete_member",
            AgentEvent::CreateHealthMonitor { .. } => "create_health_monitor",
            AgentEvent::UpdateHealthMonitor { .. } => "update_health_monitor",
            AgentEvent::DeleteHealthMonitor { .. } => "delete_health_monitor",
            AgentEvent::ReloadPool { .. } => "reload_pool",
            AgentEvent::GetPoolStats { .. } => "get_pool_stats",
            AgentEvent::AgentUpdated { .. } => "agent_updated",
        }
    }

    /// Pool the event concerns, if any.
    pub fn pool_id(&self) -> Option<&str> {
        match self {
            AgentEvent::CreateVip { service, .. }
            | AgentEvent::UpdateVip { service, .. }
            | AgentEvent::DeleteVip { service, .. }
            | AgentEvent::CreatePool { service, .. }
            | AgentEvent::UpdatePool { service, .. }
            | AgentEvent::DeletePool { service, .. }
            | AgentEvent::CreateMember { service, .. }
            | AgentEvent::UpdateMember { service, .. }
            | AgentEvent::DeleteMember { service, .. }
            | AgentEvent::CreateHealthMonitor { service, .. }
            | AgentEvent::UpdateHealthMonitor { service, .. }
            | AgentEvent::DeleteHealthMonitor { service, .. }
            | AgentEvent::GetPoolStats { service, .. } => Some(service.pool_id()),
            AgentEvent::ReloadPool { pool_id, .. } => Some(pool_id.as_str()),
            AgentEvent::AgentUpdated { .. } => None,
        }
    }
}
