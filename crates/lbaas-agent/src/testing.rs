//! In-memory collaborators for unit tests.
//!
//! Both fakes record every call as `"operation:id"` and fail on demand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use lbaas_core::{
    HealthMonitor, Member, Pool, PoolStats, ResourceRef, ResourceStatus, ServiceDescription, Vip,
};

use crate::error::{AgentError, AgentResult};
use crate::traits::{ControlPlaneClient, DeviceDriver};

// =============================================================================
// Builders
// =============================================================================

pub fn pool(pool_id: &str, tenant_id: &str) -> Pool {
    Pool {
        id: pool_id.to_string(),
        tenant_id: tenant_id.to_string(),
        name: format!("{}-name", pool_id),
        description: None,
        subnet_id: Some("subnet-1".to_string()),
        protocol: Default::default(),
        lb_method: Default::default(),
        admin_state_up: true,
        status: ResourceStatus::Active,
    }
}

pub fn vip(vip_id: &str, port_id: &str) -> Vip {
    Vip {
        id: vip_id.to_string(),
        tenant_id: "tenant-a".to_string(),
        name: String::new(),
        address: "10.0.0.10".to_string(),
        protocol_port: 80,
        protocol: Default::default(),
        port_id: Some(port_id.to_string()),
        subnet_id: Some("subnet-1".to_string()),
        connection_limit: None,
        admin_state_up: true,
        status: ResourceStatus::Active,
    }
}

pub fn member(member_id: &str, pool_id: &str) -> Member {
    Member {
        id: member_id.to_string(),
        pool_id: pool_id.to_string(),
        address: "10.0.1.5".to_string(),
        protocol_port: 8080,
        weight: 1,
        admin_state_up: true,
        status: ResourceStatus::Active,
    }
}

pub fn monitor(monitor_id: &str) -> HealthMonitor {
    HealthMonitor {
        id: monitor_id.to_string(),
        tenant_id: "tenant-a".to_string(),
        monitor_type: lbaas_core::MonitorType::Tcp,
        delay: 5,
        timeout: 3,
        max_retries: 3,
        http_method: None,
        url_path: None,
        expected_codes: None,
        admin_state_up: true,
    }
}

/// A service for `pool_id` owned by `tenant-a`, fronted by VIP port `port-<pool_id>`.
pub fn service(pool_id: &str) -> ServiceDescription {
    let mut service = ServiceDescription::new(pool(pool_id, "tenant-a"));
    service.vip = Some(vip(&format!("vip-{}", pool_id), &format!("port-{}", pool_id)));
    service.members.push(member(&format!("member-{}", pool_id), pool_id));
    service
}

#[derive(Clone, Copy)]
enum Failure {
    Device,
    Connection,
    NotFound,
}

impl Failure {
    fn error(self, key: &str) -> AgentError {
        match self {
            Failure::Device => AgentError::device(key, "injected failure"),
            Failure::Connection => AgentError::ConnectionFailed(format!("{} lost the session", key)),
            Failure::NotFound => AgentError::NotFound(key.to_string()),
        }
    }
}

// =============================================================================
// Fake Device Driver
// =============================================================================

/// Recording device driver.
///
/// Failures are keyed by `"operation"` (every call) or `"operation:id"`.
pub struct FakeDriver {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Failure>>,
    connected: AtomicBool,
    connect_calls: AtomicU32,
    connect_failures_left: AtomicU32,
    stats: Mutex<HashMap<String, PoolStats>>,
    supports_orphans: AtomicBool,
    supports_backup: AtomicBool,
    orphan_calls: Mutex<Vec<HashSet<String>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        FakeDriver {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            connect_calls: AtomicU32::new(0),
            connect_failures_left: AtomicU32::new(0),
            stats: Mutex::new(HashMap::new()),
            supports_orphans: AtomicBool::new(false),
            supports_backup: AtomicBool::new(false),
            orphan_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string(), Failure::Device);
    }

    pub fn fail_connection(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string(), Failure::Connection);
    }

    /// The device answers as if the object was never there.
    pub fn fail_not_found(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string(), Failure::NotFound);
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next_connects(&self, count: u32) {
        self.connect_failures_left.store(count, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn set_stats(&self, pool_id: &str, stats: PoolStats) {
        self.stats.lock().unwrap().insert(pool_id.to_string(), stats);
    }

    pub fn support_orphans(&self) {
        self.supports_orphans.store(true, Ordering::SeqCst);
    }

    pub fn support_backup(&self) {
        self.supports_backup.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{}:", operation);
        self.calls()
            .into_iter()
            .filter(|call| call == operation || call.starts_with(&prefix))
            .collect()
    }

    pub fn orphan_calls(&self) -> Vec<HashSet<String>> {
        self.orphan_calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, id: &str) -> AgentResult<()> {
        let key = format!("{}:{}", operation, id);
        self.calls.lock().unwrap().push(key.clone());

        let failures = self.failures.lock().unwrap();
        let injected = failures.get(&key).or_else(|| failures.get(operation));
        match injected {
            Some(failure) => Err(failure.error(&key)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceDriver for FakeDriver {
    fn agent_id(&self) -> &str {
        "device-1"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> AgentResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let left = self.connect_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.connect_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(AgentError::ConnectionFailed("device unreachable".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self, service: &ServiceDescription) -> AgentResult<()> {
        self.record("sync", service.pool_id())
    }

    async fn delete_service(
        &self,
        pool_id: &str,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("delete_service", pool_id)
    }

    async fn get_stats(&self, service: &ServiceDescription) -> AgentResult<Option<PoolStats>> {
        self.record("get_stats", service.pool_id())?;
        Ok(self.stats.lock().unwrap().get(service.pool_id()).cloned())
    }

    async fn remove_orphans(&self, known_pool_ids: &HashSet<String>) -> AgentResult<()> {
        if !self.supports_orphans.load(Ordering::SeqCst) {
            return Err(AgentError::Unsupported("remove_orphans".into()));
        }
        self.orphan_calls
            .lock()
            .unwrap()
            .push(known_pool_ids.clone());
        self.record("remove_orphans", "")
    }

    async fn backup_configuration(&self) -> AgentResult<()> {
        if !self.supports_backup.load(Ordering::SeqCst) {
            return Err(AgentError::Unsupported("backup_configuration".into()));
        }
        self.record("backup_configuration", "")
    }

    async fn create_vip(&self, vip: &Vip, _service: &ServiceDescription) -> AgentResult<()> {
        self.record("create_vip", &vip.id)
    }

    async fn update_vip(
        &self,
        _old: &Vip,
        vip: &Vip,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("update_vip", &vip.id)
    }

    async fn delete_vip(&self, vip: &Vip, _service: &ServiceDescription) -> AgentResult<()> {
        self.record("delete_vip", &vip.id)
    }

    async fn create_pool(&self, pool: &Pool, _service: &ServiceDescription) -> AgentResult<()> {
        self.record("create_pool", &pool.id)
    }

    async fn update_pool(
        &self,
        _old: &Pool,
        pool: &Pool,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("update_pool", &pool.id)
    }

    async fn delete_pool(&self, pool: &Pool, _service: &ServiceDescription) -> AgentResult<()> {
        self.record("delete_pool", &pool.id)
    }

    async fn create_member(
        &self,
        member: &Member,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("create_member", &member.id)
    }

    async fn update_member(
        &self,
        _old: &Member,
        member: &Member,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("update_member", &member.id)
    }

    async fn delete_member(
        &self,
        member: &Member,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("delete_member", &member.id)
    }

    async fn create_health_monitor(
        &self,
        monitor: &HealthMonitor,
        _pool: &Pool,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("create_health_monitor", &monitor.id)
    }

    async fn update_health_monitor(
        &self,
        _old: &HealthMonitor,
        monitor: &HealthMonitor,
        _pool: &Pool,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("update_health_monitor", &monitor.id)
    }

    async fn delete_health_monitor(
        &self,
        monitor: &HealthMonitor,
        _pool: &Pool,
        _service: &ServiceDescription,
    ) -> AgentResult<()> {
        self.record("delete_health_monitor", &monitor.id)
    }
}

// =============================================================================
// Fake Control Plane
// =============================================================================

/// Control plane holding descriptions in memory.
///
/// A pool can be described without being active, which is how pools pending
/// deletion look.
#[derive(Default)]
pub struct FakeControlPlane {
    services: Mutex<HashMap<String, ServiceDescription>>,
    active: Mutex<HashSet<String>>,
    fail_active: AtomicBool,
    fail_fetch: Mutex<HashSet<String>>,
    missing: Mutex<HashSet<String>>,
    fail_destroy_report: AtomicBool,
    destroyed: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(ResourceRef, ResourceStatus, String)>>,
    stats: Mutex<Vec<(String, PoolStats)>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describes the pool and marks it active.
    pub fn add(&self, service: ServiceDescription) {
        let pool_id = service.pool_id().to_string();
        self.services.lock().unwrap().insert(pool_id.clone(), service);
        self.active.lock().unwrap().insert(pool_id);
    }

    /// Keeps the description but drops the pool from the active list.
    pub fn deactivate(&self, pool_id: &str) {
        self.active.lock().unwrap().remove(pool_id);
    }

    /// Forgets the pool entirely.
    pub fn forget(&self, pool_id: &str) {
        self.services.lock().unwrap().remove(pool_id);
        self.active.lock().unwrap().remove(pool_id);
    }

    pub fn fail_active_list(&self, fail: bool) {
        self.fail_active.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, pool_id: &str) {
        self.fail_fetch.lock().unwrap().insert(pool_id.to_string());
    }

    /// Answers fetches for the pool with a not-found error instead of `None`.
    pub fn report_missing(&self, pool_id: &str) {
        self.forget(pool_id);
        self.missing.lock().unwrap().insert(pool_id.to_string());
    }

    pub fn fail_destroy_report(&self, fail: bool) {
        self.fail_destroy_report.store(fail, Ordering::SeqCst);
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<(ResourceRef, ResourceStatus, String)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn reported_stats(&self) -> Vec<(String, PoolStats)> {
        self.stats.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlPlaneClient for FakeControlPlane {
    async fn get_active_pool_ids(&self) -> AgentResult<HashSet<String>> {
        if self.fail_active.load(Ordering::SeqCst) {
            return Err(AgentError::rpc("get_active_pool_ids", "service unavailable"));
        }
        Ok(self.active.lock().unwrap().clone())
    }

    async fn get_service_by_pool_id(
        &self,
        pool_id: &str,
    ) -> AgentResult<Option<ServiceDescription>> {
        if self.fail_fetch.lock().unwrap().contains(pool_id) {
            return Err(AgentError::rpc("get_service_by_pool_id", "timed out"));
        }
        if self.missing.lock().unwrap().contains(pool_id) {
            return Err(AgentError::NotFound(format!("pool {}", pool_id)));
        }
        Ok(self.services.lock().unwrap().get(pool_id).cloned())
    }

    async fn report_pool_destroyed(&self, pool_id: &str) -> AgentResult<()> {
        if self.fail_destroy_report.load(Ordering::SeqCst) {
            return Err(AgentError::rpc("pool_destroyed", "connection reset"));
        }
        self.destroyed.lock().unwrap().push(pool_id.to_string());
        Ok(())
    }

    async fn report_status(
        &self,
        resource: &ResourceRef,
        status: ResourceStatus,
        message: &str,
    ) -> AgentResult<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((resource.clone(), status, message.to_string()));
        Ok(())
    }

    async fn report_stats(&self, pool_id: &str, stats: &PoolStats) -> AgentResult<()> {
        self.stats
            .lock()
            .unwrap()
            .push((pool_id.to_string(), stats.clone()));
        Ok(())
    }
}
