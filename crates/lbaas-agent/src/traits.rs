//! # Collaborator Traits
//!
//! The two external systems the engine talks to, expressed as capability
//! traits. Concrete drivers and RPC clients live outside this crate.
//!
//! ```text
//! ┌────────────────────┐   desired state    ┌───────────────────────┐
//! │ ControlPlaneClient │ ─────────────────► │  ReconciliationEngine │
//! │                    │ ◄───────────────── │                       │
//! └────────────────────┘   status reports   └───────────┬───────────┘
//!                                                       │ apply
//!                                           ┌───────────▼───────────┐
//!                                           │     DeviceDriver      │
//!                                           └───────────────────────┘
//! ```
//!
//! Both traits are object safe; the engine holds them as `Arc<dyn _>`.

use std::collections::HashSet;

use async_trait::async_trait;
use lbaas_core::{
    HealthMonitor, Member, Pool, PoolStats, ResourceRef, ResourceStatus, ServiceDescription, Vip,
};

use crate::error::{AgentError, AgentResult};

// =============================================================================
// Device Driver
// =============================================================================

/// Applies service descriptions to a load-balancing device.
///
/// Every mutating call must be idempotent: the engine re-applies the same
/// description on every full pass.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Identifier of the managed device cluster, appended to the agent host.
    fn agent_id(&self) -> &str;

    /// Returns true while the driver holds a usable device session.
    fn is_connected(&self) -> bool;

    /// (Re)establishes the device session.
    async fn connect(&self) -> AgentResult<()>;

    /// Creates or updates everything the description names.
    async fn sync(&self, service: &ServiceDescription) -> AgentResult<()>;

    /// Removes every device object belonging to the pool.
    async fn delete_service(&self, pool_id: &str, service: &ServiceDescription)
        -> AgentResult<()>;

    /// Reads traffic counters. `None` means the device has nothing to report.
    async fn get_stats(&self, service: &ServiceDescription) -> AgentResult<Option<PoolStats>>;

    /// Deletes device objects that belong to no pool in `known_pool_ids`.
    async fn remove_orphans(&self, known_pool_ids: &HashSet<String>) -> AgentResult<()> {
        let _ = known_pool_ids;
        Err(AgentError::Unsupported("remove_orphans".into()))
    }

    /// Persists the device's running configuration.
    async fn backup_configuration(&self) -> AgentResult<()> {
        Err(AgentError::Unsupported("backup_configuration".into()))
    }

    // -------------------------------------------------------------------------
    // Sub-resource operations
    // -------------------------------------------------------------------------

    async fn create_vip(&self, vip: &Vip, service: &ServiceDescription) -> AgentResult<()>;

    async fn update_vip(&self, old: &Vip, vip: &Vip, service: &ServiceDescription)
        -> AgentResult<()>;

    async fn delete_vip(&self, vip: &Vip, service: &ServiceDescription) -> AgentResult<()>;

    async fn create_pool(&self, pool: &Pool, service: &ServiceDescription) -> AgentResult<()>;

    async fn update_pool(
        &self,
        old: &Pool,
        pool: &Pool,
        service: &ServiceDescription,
    ) -> AgentResult<()>;

    async fn delete_pool(&self, pool: &Pool, service: &ServiceDescription) -> AgentResult<()>;

    async fn create_member(&self, member: &Member, service: &ServiceDescription)
        -> AgentResult<()>;

    async fn update_member(
        &self,
        old: &Member,
        member: &Member,
        service: &ServiceDescription,
    ) -> AgentResult<()>;

    async fn delete_member(&self, member: &Member, service: &ServiceDescription)
        -> AgentResult<()>;

    async fn create_health_monitor(
        &self,
        monitor: &HealthMonitor,
        pool: &Pool,
        service: &ServiceDescription,
    ) -> AgentResult<()>;

    async fn update_health_monitor(
        &self,
        old: &HealthMonitor,
        monitor: &HealthMonitor,
        pool: &Pool,
        service: &ServiceDescription,
    ) -> AgentResult<()>;

    async fn delete_health_monitor(
        &self,
        monitor: &HealthMonitor,
        pool: &Pool,
        service: &ServiceDescription,
    ) -> AgentResult<()>;
}

// =============================================================================
// Control Plane Client
// =============================================================================

/// Source of desired state and sink for status reports.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Pools this agent should have provisioned (active or pending).
    async fn get_active_pool_ids(&self) -> AgentResult<HashSet<String>>;

    /// Full description of one pool, or `None` if the control plane no longer
    /// knows it.
    async fn get_service_by_pool_id(&self, pool_id: &str)
        -> AgentResult<Option<ServiceDescription>>;

    /// Confirms that every device object of the pool is gone.
    async fn report_pool_destroyed(&self, pool_id: &str) -> AgentResult<()>;

    /// Sets the provisioning status of a sub-resource.
    async fn report_status(
        &self,
        resource: &ResourceRef,
        status: ResourceStatus,
        message: &str,
    ) -> AgentResult<()>;

    async fn report_stats(&self, pool_id: &str, stats: &PoolStats) -> AgentResult<()>;
}
