//! # Reconciliation Engine
//!
//! Converges the device towards the control plane's desired state and keeps
//! the [`ServiceCache`] in step with what is actually provisioned.
//!
//! ## Full Pass (`sync_state`)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Reconciliation Pass                               │
//! │                                                                         │
//! │  known = cache.pool_ids          ready = control_plane.active_pool_ids  │
//! │                    │                              │                     │
//! │                    └──────────────┬───────────────┘                     │
//! │                                   ▼                                     │
//! │  1. destroy  known - ready    (delete_service → report → uncache)       │
//! │  2. refresh  ready            (fetch → validate → sync → cache)         │
//! │  3. orphans  cache.pool_ids   (Unsupported = no-op)                     │
//! │                                                                         │
//! │  A failure anywhere marks needs_resync and the pass moves on.           │
//! │  If `ready` cannot be fetched, steps 1 and 2 are skipped.               │
//! │  While admin state is down, `ready` is empty.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Policy
//! ```text
//!   transient (device, rpc)  → log + needs_resync
//!   not found                → already satisfied
//!   unsupported capability   → no-op
//!   event command failure    → ERROR status on the sub-resource
//! ```
//!
//! Nothing here returns an error to the caller. Every entry point takes
//! `&mut self`, so the owning task serializes all operations.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use lbaas_core::validation::validate_service;
use lbaas_core::{
    HealthMonitor, Member, Pool, ResourceRef, ResourceStatus, ServiceCache, ServiceDescription,
    Vip,
};
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::event::AgentEvent;
use crate::guard::{ConnectionGuard, ReconnectPolicy};
use crate::report::{AgentStatus, EngineState, OrphanOutcome, PassReport, ServiceOutcome};
use crate::traits::{ControlPlaneClient, DeviceDriver};

/// Folds a not-found answer into "nothing there".
fn found<T>(result: AgentResult<Option<T>>) -> AgentResult<Option<T>> {
    match result {
        Err(e) if e.is_not_found() => Ok(None),
        other => other,
    }
}

/// A not-found answer means the work is already done.
fn already_done(result: AgentResult<()>) -> AgentResult<()> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!(error = %e, "Target already gone");
            Ok(())
        }
        other => other,
    }
}

/// What a successful event does to the cache.
enum CacheEffect<'a> {
    Put(&'a ServiceDescription),
    RemovePool(&'a str),
    Keep,
}

pub struct ReconciliationEngine {
    driver: Arc<dyn DeviceDriver>,
    client: Arc<dyn ControlPlaneClient>,
    guard: ConnectionGuard,
    cache: ServiceCache,

    /// `"{host}:{driver agent id}"`.
    agent_host: String,

    needs_resync: bool,
    admin_state_up: bool,
    state: EngineState,
    last_pass: Option<PassReport>,
    last_error: Option<String>,
}

impl ReconciliationEngine {
    pub fn new(
        driver: Arc<dyn DeviceDriver>,
        client: Arc<dyn ControlPlaneClient>,
        host: &str,
        policy: ReconnectPolicy,
    ) -> Self {
        let agent_host = format!("{}:{}", host, driver.agent_id());
        info!(agent_host = %agent_host, "Reconciliation engine created");

        ReconciliationEngine {
            guard: ConnectionGuard::new(driver.clone(), policy),
            driver,
            client,
            cache: ServiceCache::new(),
            agent_host,
            // The first resync tick after startup runs a full pass.
            needs_resync: true,
            admin_state_up: true,
            state: EngineState::Idle,
            last_pass: None,
            last_error: None,
        }
    }

    pub fn from_config(
        driver: Arc<dyn DeviceDriver>,
        client: Arc<dyn ControlPlaneClient>,
        config: &AgentConfig,
    ) -> Self {
        let device = &config.device;
        info!(
            driver = %device.driver,
            device_type = %device.device_type,
            ha_type = %device.ha_type,
            use_namespaces = device.use_namespaces,
            snat_mode = device.snat_mode,
            "Device settings"
        );

        Self::new(
            driver,
            client,
            config.host(),
            ReconnectPolicy::from_settings(&config.device),
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    pub fn agent_host(&self) -> &str {
        &self.agent_host
    }

    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Schedules a full pass on the next resync tick.
    pub fn request_resync(&mut self) {
        self.needs_resync = true;
    }

    pub fn admin_state_up(&self) -> bool {
        self.admin_state_up
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn last_pass(&self) -> Option<&PassReport> {
        self.last_pass.as_ref()
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            agent_host: self.agent_host.clone(),
            state: self.state,
            admin_state_up: self.admin_state_up,
            needs_resync: self.needs_resync,
            service_count: self.cache.len(),
            tenant_count: self.cache.get_all_tenant_ids().len(),
            last_pass: self.last_pass.clone(),
            last_error: self.last_error.clone(),
        }
    }

    // =========================================================================
    // Full Reconciliation
    // =========================================================================

    /// Runs a full pass if one is pending.
    ///
    /// While the agent is disabled the pass only retries destroys that
    /// failed earlier.
    pub async fn periodic_resync(&mut self) -> Option<PassReport> {
        if !self.needs_resync {
            return None;
        }
        Some(self.sync_state().await)
    }

    /// Converges the device on the control plane's active pool set, or on
    /// nothing while the agent is disabled.
    ///
    /// Clears the resync flag up front; any failure during the pass raises
    /// it again.
    pub async fn sync_state(&mut self) -> PassReport {
        self.state = EngineState::Reconciling;
        self.needs_resync = false;
        let mut report = PassReport::start();
        let known = self.cache.get_all_pool_ids();

        let ready = if self.admin_state_up {
            self.client.get_active_pool_ids().await
        } else {
            debug!(pass_id = %report.id, "Agent administratively down, desired state is empty");
            Ok(HashSet::new())
        };

        match ready {
            Ok(ready) => {
                debug!(pass_id = %report.id, known = known.len(), ready = ready.len(), "Reconciling");

                let mut doomed: Vec<String> = known.difference(&ready).cloned().collect();
                doomed.sort();
                for pool_id in doomed {
                    let outcome = self.destroy_service(&pool_id).await;
                    report.record_destroy(&pool_id, outcome);
                }

                let mut wanted: Vec<String> = ready.into_iter().collect();
                wanted.sort();
                for pool_id in wanted {
                    let outcome = self.refresh_service(&pool_id).await;
                    report.record_refresh(&pool_id, outcome);
                }
            }
            Err(e) => {
                error!(pass_id = %report.id, error = %e, "Unable to retrieve ready services");
                report.fetch_failed = true;
                self.record_failure(&e);
            }
        }

        report.orphans = self.remove_orphans().await;
        report.finish();

        if report.is_clean() {
            info!(
                pass_id = %report.id,
                destroyed = report.destroyed.len(),
                refreshed = report.refreshed.len(),
                duration_ms = report.duration_ms().unwrap_or_default(),
                "Reconciliation pass complete"
            );
        } else {
            warn!(
                pass_id = %report.id,
                failed = report.failed.len(),
                fetch_failed = report.fetch_failed,
                "Reconciliation pass finished with failures, resync pending"
            );
        }

        self.state = EngineState::Idle;
        self.last_pass = Some(report.clone());
        report
    }

    // =========================================================================
    // Single Service
    // =========================================================================

    /// Fetches the pool's description and applies it to the device.
    pub async fn refresh_service(&mut self, pool_id: &str) -> ServiceOutcome {
        match self.try_refresh(pool_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(pool_id = %pool_id, error = %e, "Unable to refresh service");
                self.record_failure(&e);
                ServiceOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_refresh(&mut self, pool_id: &str) -> AgentResult<ServiceOutcome> {
        let Some(service) = found(self.client.get_service_by_pool_id(pool_id).await)? else {
            debug!(pool_id = %pool_id, "Pool no longer described, nothing to refresh");
            return Ok(ServiceOutcome::Absent);
        };

        validate_service(&service, Some(pool_id))?;

        self.guard.ensure_connected("sync").await?;
        self.settle(self.driver.sync(&service).await)?;

        self.cache.put(&service);
        debug!(pool_id = %pool_id, "Service refreshed");
        Ok(ServiceOutcome::Applied)
    }

    /// Removes the pool from the device and confirms it to the control plane.
    ///
    /// The cache entry is dropped only once the device delete succeeded.
    pub async fn destroy_service(&mut self, pool_id: &str) -> ServiceOutcome {
        match self.try_destroy(pool_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(pool_id = %pool_id, error = %e, "Unable to destroy service");
                self.record_failure(&e);
                ServiceOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_destroy(&mut self, pool_id: &str) -> AgentResult<ServiceOutcome> {
        let Some(service) = found(self.client.get_service_by_pool_id(pool_id).await)? else {
            if self.cache.remove_by_pool_id(pool_id).is_some() {
                debug!(pool_id = %pool_id, "Pool already gone, dropped cache entry");
            }
            return Ok(ServiceOutcome::Absent);
        };

        self.guard.ensure_connected("delete_service").await?;
        already_done(self.settle(self.driver.delete_service(pool_id, &service).await))?;
        already_done(self.client.report_pool_destroyed(pool_id).await)?;

        // Keyed by pool ID: the description may carry a newer port than the
        // cached record.
        self.cache.remove_by_pool_id(pool_id);
        info!(pool_id = %pool_id, "Service destroyed");
        Ok(ServiceOutcome::Applied)
    }

    /// Re-applies one pool on request. Returns `None` when the request was
    /// addressed to another agent.
    pub async fn reload_pool(&mut self, pool_id: &str, host: &str) -> Option<ServiceOutcome> {
        if host != self.agent_host {
            debug!(pool_id = %pool_id, host = %host, "Reload addressed to another agent");
            return None;
        }
        Some(self.refresh_service(pool_id).await)
    }

    // =========================================================================
    // Periodic Housekeeping
    // =========================================================================

    /// Asks the driver to delete device objects of pools no longer cached.
    pub async fn remove_orphans(&mut self) -> OrphanOutcome {
        let known = self.cache.get_all_pool_ids();

        let result = match self.guard.ensure_connected("remove_orphans").await {
            Ok(()) => self.settle(self.driver.remove_orphans(&known).await),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => OrphanOutcome::Done,
            Err(e) if e.is_unsupported() => {
                debug!("Driver does not remove orphans");
                OrphanOutcome::Unsupported
            }
            Err(e) => {
                warn!(error = %e, "Orphan cleanup failed");
                self.record_failure(&e);
                OrphanOutcome::Failed(e.to_string())
            }
        }
    }

    /// Reads and reports counters for every cached pool. Returns how many
    /// pools had stats to report.
    pub async fn collect_stats(&mut self) -> usize {
        let mut pool_ids: Vec<String> = self.cache.get_all_pool_ids().into_iter().collect();
        pool_ids.sort();
        debug!(pools = pool_ids.len(), "Collecting stats");

        let mut reported = 0;
        for pool_id in pool_ids {
            match self.try_collect_stats(&pool_id).await {
                Ok(true) => reported += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(pool_id = %pool_id, error = %e, "Error updating stats");
                    self.record_failure(&e);
                }
            }
        }
        reported
    }

    async fn try_collect_stats(&self, pool_id: &str) -> AgentResult<bool> {
        let Some(service) = found(self.client.get_service_by_pool_id(pool_id).await)? else {
            debug!(pool_id = %pool_id, "Pool no longer described, skipping stats");
            return Ok(false);
        };
        self.report_stats_for(pool_id, &service).await
    }

    /// Reads stats from the device and reports them if non-empty.
    async fn report_stats_for(&self, pool_id: &str, service: &ServiceDescription) -> AgentResult<bool> {
        self.guard.ensure_connected("get_stats").await?;

        match self.settle(self.driver.get_stats(service).await)? {
            Some(stats) if !stats.is_empty() => {
                self.client.report_stats(pool_id, &stats).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Asks the driver to persist its configuration. Failures are only logged.
    pub async fn backup_configuration(&mut self) {
        let result = match self.guard.ensure_connected("backup_configuration").await {
            Ok(()) => self.settle(self.driver.backup_configuration().await),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!("Device configuration backed up"),
            Err(e) if e.is_unsupported() => debug!("Driver does not back up configuration"),
            Err(e) => warn!(error = %e, "Configuration backup failed"),
        }
    }

    // =========================================================================
    // Admin State
    // =========================================================================

    /// Applies an admin state change.
    ///
    /// Going down destroys every cached service; destroys that fail are
    /// retried by later resync ticks. Coming up schedules a full pass for
    /// the next resync tick.
    pub async fn agent_updated(&mut self, admin_state_up: bool) {
        if admin_state_up == self.admin_state_up {
            debug!(admin_state_up, "Admin state unchanged");
            return;
        }
        self.admin_state_up = admin_state_up;

        if admin_state_up {
            info!("Agent enabled, resync scheduled");
            self.needs_resync = true;
            return;
        }

        info!(services = self.cache.len(), "Agent disabled, destroying all services");
        self.state = EngineState::Reconciling;

        let mut pool_ids: Vec<String> = self.cache.get_all_pool_ids().into_iter().collect();
        pool_ids.sort();
        for pool_id in pool_ids {
            self.destroy_service(&pool_id).await;
        }

        self.state = EngineState::Idle;
    }

    // =========================================================================
    // Event Dispatch
    // =========================================================================

    /// Applies one inbound event.
    pub async fn handle_event(&mut self, event: AgentEvent) {
        debug!(event = event.name(), pool_id = ?event.pool_id(), "Handling event");
        self.state = EngineState::Reconciling;

        match event {
            AgentEvent::CreateVip { vip, service } => self.create_vip(&vip, &service).await,
            AgentEvent::UpdateVip {
                old_vip,
                vip,
                service,
            } => self.update_vip(&old_vip, &vip, &service).await,
            AgentEvent::DeleteVip { vip, service } => self.delete_vip(&vip, &service).await,
            AgentEvent::CreatePool { pool, service } => self.create_pool(&pool, &service).await,
            AgentEvent::UpdatePool {
                old_pool,
                pool,
                service,
            } => self.update_pool(&old_pool, &pool, &service).await,
            AgentEvent::DeletePool { pool, service } => self.delete_pool(&pool, &service).await,
            AgentEvent::CreateMember { member, service } => {
                self.create_member(&member, &service).await
            }
            AgentEvent::UpdateMember {
                old_member,
                member,
                service,
            } => self.update_member(&old_member, &member, &service).await,
            AgentEvent::DeleteMember { member, service } => {
                self.delete_member(&member, &service).await
            }
            AgentEvent::CreateHealthMonitor {
                health_monitor,
                pool,
                service,
            } => {
                self.create_health_monitor(&health_monitor, &pool, &service)
                    .await
            }
            AgentEvent::UpdateHealthMonitor {
                old_health_monitor,
                health_monitor,
                pool,
                service,
            } => {
                self.update_health_monitor(&old_health_monitor, &health_monitor, &pool, &service)
                    .await
            }
            AgentEvent::DeleteHealthMonitor {
                health_monitor,
                pool,
                service,
            } => {
                self.delete_health_monitor(&health_monitor, &pool, &service)
                    .await
            }
            AgentEvent::ReloadPool { pool_id, host } => {
                self.reload_pool(&pool_id, &host).await;
            }
            AgentEvent::GetPoolStats { pool, service } => {
                self.get_pool_stats(&pool, &service).await
            }
            AgentEvent::AgentUpdated { admin_state_up } => {
                self.agent_updated(admin_state_up).await
            }
        }

        self.state = EngineState::Idle;
    }

    // =========================================================================
    // Event Operations
    // =========================================================================

    pub async fn create_vip(&mut self, vip: &Vip, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "create_vip",
            driver.create_vip(vip, service),
            CacheEffect::Put(service),
            ResourceRef::Vip { id: vip.id.clone() },
            "create VIP",
        )
        .await;
    }

    pub async fn update_vip(&mut self, old_vip: &Vip, vip: &Vip, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "update_vip",
            driver.update_vip(old_vip, vip, service),
            CacheEffect::Put(service),
            ResourceRef::Vip {
                id: old_vip.id.clone(),
            },
            "update VIP",
        )
        .await;
    }

    pub async fn delete_vip(&mut self, vip: &Vip, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "delete_vip",
            driver.delete_vip(vip, service),
            CacheEffect::Put(service),
            ResourceRef::Vip { id: vip.id.clone() },
            "delete VIP",
        )
        .await;
    }

    pub async fn create_pool(&mut self, pool: &Pool, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "create_pool",
            driver.create_pool(pool, service),
            CacheEffect::Put(service),
            ResourceRef::Pool {
                id: pool.id.clone(),
            },
            "create pool",
        )
        .await;
    }

    pub async fn update_pool(&mut self, old_pool: &Pool, pool: &Pool, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "update_pool",
            driver.update_pool(old_pool, pool, service),
            CacheEffect::Put(service),
            ResourceRef::Pool {
                id: old_pool.id.clone(),
            },
            "update pool",
        )
        .await;
    }

    pub async fn delete_pool(&mut self, pool: &Pool, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "delete_pool",
            driver.delete_pool(pool, service),
            CacheEffect::RemovePool(&pool.id),
            ResourceRef::Pool {
                id: pool.id.clone(),
            },
            "delete pool",
        )
        .await;
    }

    pub async fn create_member(&mut self, member: &Member, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "create_member",
            driver.create_member(member, service),
            CacheEffect::Put(service),
            ResourceRef::Member {
                id: member.id.clone(),
            },
            "create member",
        )
        .await;
    }

    pub async fn update_member(
        &mut self,
        old_member: &Member,
        member: &Member,
        service: &ServiceDescription,
    ) {
        let driver = self.driver.clone();
        self.apply_event(
            "update_member",
            driver.update_member(old_member, member, service),
            CacheEffect::Put(service),
            ResourceRef::Member {
                id: old_member.id.clone(),
            },
            "update member",
        )
        .await;
    }

    pub async fn delete_member(&mut self, member: &Member, service: &ServiceDescription) {
        let driver = self.driver.clone();
        self.apply_event(
            "delete_member",
            driver.delete_member(member, service),
            CacheEffect::Put(service),
            ResourceRef::Member {
                id: member.id.clone(),
            },
            "delete member",
        )
        .await;
    }

    pub async fn create_health_monitor(
        &mut self,
        monitor: &HealthMonitor,
        pool: &Pool,
        service: &ServiceDescription,
    ) {
        let driver = self.driver.clone();
        self.apply_event(
            "create_health_monitor",
            driver.create_health_monitor(monitor, pool, service),
            CacheEffect::Put(service),
            ResourceRef::HealthMonitor {
                pool_id: pool.id.clone(),
                monitor_id: monitor.id.clone(),
            },
            "create health monitor",
        )
        .await;
    }

    pub async fn update_health_monitor(
        &mut self,
        old_monitor: &HealthMonitor,
        monitor: &HealthMonitor,
        pool: &Pool,
        service: &ServiceDescription,
    ) {
        let driver = self.driver.clone();
        self.apply_event(
            "update_health_monitor",
            driver.update_health_monitor(old_monitor, monitor, pool, service),
            CacheEffect::Put(service),
            ResourceRef::HealthMonitor {
                pool_id: pool.id.clone(),
                monitor_id: old_monitor.id.clone(),
            },
            "update health monitor",
        )
        .await;
    }

    pub async fn delete_health_monitor(
        &mut self,
        monitor: &HealthMonitor,
        pool: &Pool,
        service: &ServiceDescription,
    ) {
        let driver = self.driver.clone();
        self.apply_event(
            "delete_health_monitor",
            driver.delete_health_monitor(monitor, pool, service),
            CacheEffect::Keep,
            ResourceRef::HealthMonitor {
                pool_id: pool.id.clone(),
                monitor_id: monitor.id.clone(),
            },
            "delete health monitor",
        )
        .await;
    }

    /// Reads and reports stats for one pool on request.
    pub async fn get_pool_stats(&mut self, pool: &Pool, service: &ServiceDescription) {
        let result = self.report_stats_for(&pool.id, service).await;
        let resource = ResourceRef::Pool {
            id: pool.id.clone(),
        };
        self.conclude(
            "get_pool_stats",
            result.map(|_| ()),
            CacheEffect::Keep,
            resource,
            "get pool stats",
        )
        .await;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Lets the connection guard see the outcome of a device call.
    fn settle<T>(&self, result: AgentResult<T>) -> AgentResult<T> {
        self.guard.observe(&result);
        result
    }

    /// Raises the resync flag after a reconciliation failure.
    fn record_failure(&mut self, error: &AgentError) {
        self.needs_resync = true;
        self.last_error = Some(error.to_string());
    }

    /// Runs one driver call for an event once the device is connected.
    async fn apply_event<F>(
        &mut self,
        operation: &str,
        call: F,
        effect: CacheEffect<'_>,
        resource: ResourceRef,
        action: &str,
    ) where
        F: Future<Output = AgentResult<()>>,
    {
        let result = match self.guard.ensure_connected(operation).await {
            Ok(()) => self.settle(call.await),
            Err(e) => Err(e),
        };
        self.conclude(operation, result, effect, resource, action)
            .await;
    }

    /// Finishes an event: updates the cache on success or when the target
    /// is already gone, reports the sub-resource as `ERROR` otherwise. The
    /// resync flag is left alone.
    async fn conclude(
        &mut self,
        operation: &str,
        result: AgentResult<()>,
        effect: CacheEffect<'_>,
        resource: ResourceRef,
        action: &str,
    ) {
        match already_done(result) {
            Ok(()) => {
                match effect {
                    CacheEffect::Put(service) => self.cache.put(service),
                    CacheEffect::RemovePool(pool_id) => {
                        self.cache.remove_by_pool_id(pool_id);
                    }
                    CacheEffect::Keep => {}
                }
                debug!(operation = %operation, resource = %resource, "Event applied");
            }
            Err(e) => {
                let message = format!("could not {}: {}", action, e);
                error!(operation = %operation, resource = %resource, error = %e, "Event failed");
                self.last_error = Some(message.clone());

                if let Err(report_err) = self
                    .client
                    .report_status(&resource, ResourceStatus::Error, &message)
                    .await
                {
                    warn!(resource = %resource, error = %report_err, "Failed to report ERROR status");
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
