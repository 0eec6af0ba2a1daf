//! # Service Cache
//!
//! Index of the services this agent believes are provisioned on its device.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ServiceCache                                   │
//! │                                                                         │
//! │   records (authoritative)              port_index                       │
//! │   ───────────────────────              ──────────                       │
//! │   pool-1 → {pool-1, port-7, t-a}       port-7 → pool-1                  │
//! │   pool-2 → {pool-2, None,   t-b}                                        │
//! │   pool-3 → {pool-3, port-9, t-a}       port-9 → pool-3                  │
//! │                                                                         │
//! │   • Keyed by pool ID, so a pool ID maps to at most one record          │
//! │   • port_index holds pool IDs, never records: nothing can dangle       │
//! │   • Every mutation updates both maps before returning                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no eviction policy. An entry lives exactly as long as the
//! service is believed provisioned.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::types::{ServiceDescription, ServiceRecord};

/// In-memory index of provisioned services with lookup by pool and port.
#[derive(Debug, Default, Clone)]
pub struct ServiceCache {
    /// Membership, keyed by pool ID.
    records: HashMap<String, ServiceRecord>,

    /// VIP port ID → pool ID.
    port_index: HashMap<String, String>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for the service's pool.
    pub fn put(&mut self, service: &ServiceDescription) {
        self.put_record(ServiceRecord::from(service));
    }

    /// Inserts or replaces a record, keyed by its pool ID.
    ///
    /// Putting an identical record twice leaves the cache unchanged.
    pub fn put_record(&mut self, record: ServiceRecord) {
        if self.records.get(&record.pool_id) == Some(&record) {
            return;
        }

        if let Some(previous) = self.records.remove(&record.pool_id) {
            self.unindex_port(&previous);
        }

        if let Some(ref port_id) = record.port_id {
            // A port fronts a single pool; a stale owner loses its entry.
            if let Some(old_pool) = self.port_index.insert(port_id.clone(), record.pool_id.clone())
            {
                if old_pool != record.pool_id {
                    debug!(port_id = %port_id, old_pool = %old_pool, "VIP port moved between pools");
                }
            }
        }

        debug!(pool_id = %record.pool_id, tenant_id = %record.tenant_id, "Cached service");
        self.records.insert(record.pool_id.clone(), record);
    }

    /// Removes the record matching the service's identity, if present.
    pub fn remove(&mut self, service: &ServiceDescription) {
        self.remove_record(&ServiceRecord::from(service));
    }

    /// Removes the record if the cached entry matches all three attributes.
    pub fn remove_record(&mut self, record: &ServiceRecord) {
        if self.records.get(&record.pool_id) == Some(record) {
            self.remove_by_pool_id(&record.pool_id);
        }
    }

    /// Removes whichever record is indexed under `pool_id`.
    pub fn remove_by_pool_id(&mut self, pool_id: &str) -> Option<ServiceRecord> {
        let record = self.records.remove(pool_id)?;
        self.unindex_port(&record);
        debug!(pool_id = %pool_id, "Removed service from cache");
        Some(record)
    }

    pub fn get_by_pool_id(&self, pool_id: &str) -> Option<&ServiceRecord> {
        self.records.get(pool_id)
    }

    pub fn get_by_port_id(&self, port_id: &str) -> Option<&ServiceRecord> {
        self.port_index
            .get(port_id)
            .and_then(|pool_id| self.records.get(pool_id))
    }

    /// Returns every cached pool ID, in no particular order.
    pub fn get_all_pool_ids(&self) -> HashSet<String> {
        self.records.keys().cloned().collect()
    }

    /// Returns the distinct tenants owning cached services.
    pub fn get_all_tenant_ids(&self) -> HashSet<String> {
        self.records
            .values()
            .map(|record| record.tenant_id.clone())
            .collect()
    }

    pub fn contains_pool(&self, pool_id: &str) -> bool {
        self.records.contains_key(pool_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.values()
    }

    fn unindex_port(&mut self, record: &ServiceRecord) {
        if let Some(ref port_id) = record.port_id {
            // Only drop the entry if it still points at this pool.
            if self.port_index.get(port_id) == Some(&record.pool_id) {
                self.port_index.remove(port_id);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pool: &str, port: Option<&str>, tenant: &str) -> ServiceRecord {
        ServiceRecord::new(pool, port.map(str::to_string), tenant)
    }

    /// Every port index entry must resolve to a cached record owning that port.
    fn assert_consistent(cache: &ServiceCache) {
        for (port_id, pool_id) in &cache.port_index {
            let owner = cache.records.get(pool_id).expect("dangling port index");
            assert_eq!(owner.port_id.as_deref(), Some(port_id.as_str()));
        }
        for record in cache.records.values() {
            if let Some(ref port_id) = record.port_id {
                assert_eq!(cache.port_index.get(port_id), Some(&record.pool_id));
            }
        }
    }

    #[test]
    fn test_put_and_lookup() {
        let mut cache = ServiceCache::new();
        cache.put_record(record("pool-1", Some("port-1"), "tenant-a"));
        cache.put_record(record("pool-2", None, "tenant-b"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_by_pool_id("pool-1").unwrap().tenant_id, "tenant-a");
        assert_eq!(cache.get_by_port_id("port-1").unwrap().pool_id, "pool-1");
        assert!(cache.get_by_port_id("port-2").is_none());
        assert!(cache.get_by_pool_id("pool-9").is_none());
        assert_consistent(&cache);
    }

    #[test]
    fn test_put_is_idempotent() {
        let mut cache = ServiceCache::new();
        cache.put_record(record("pool-1", Some("port-1"), "tenant-a"));
        let before = cache.get_by_pool_id("pool-1").cloned();

        cache.put_record(record("pool-1", Some("port-1"), "tenant-a"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_by_pool_id("pool-1").cloned(), before);
        assert_consistent(&cache);
    }

    #[test]
    fn test_put_replaces_in_place() {
        let mut cache = ServiceCache::new();
        cache.put_record(record("pool-1", Some("port-1"), "tenant-a"));
        cache.put_record(record("pool-1", Some("port-2"), "tenant-a"));

        assert_eq!(cache.len(), 1);
        assert!(cache.get_by_port_id("port-1").is_none());
        assert_eq!(cache.get_by_port_id("port-2").unwrap().pool_id, "pool-1");
        assert_consistent(&cache);
    }

    #[test]
    fn test_port_moving_between_pools() {
        let mut cache = ServiceCache::new();
        cache.put_record(record("pool-1", Some("port-1"), "tenant-a"));
        cache.put_record(record("pool-2", Some("port-1"), "tenant-a"));

        assert_eq!(cache.get_by_port_id("port-1").unwrap().pool_id, "pool-2");

        // Removing the previous owner must not unindex the new owner's port.
        cache.remove_by_pool_id("pool-1");
        assert_eq!(cache.get_by_port_id("port-1").unwrap().pool_id, "pool-2");
    }

    #[test]
    fn test_remove_requires_matching_identity() {
        let mut cache = ServiceCache::new();
        cache.put_record(record("pool-1", Some("port-1"), "tenant-a"));

        cache.remove_record(&record("pool-1", Some("port-1"), "tenant-b"));
        assert!(cache.contains_pool("pool-1"));

        cache.remove_record(&record("pool-1", Some("port-1"), "tenant-a"));
        assert!(cache.is_empty());
        assert!(cache.get_by_port_id("port-1").is_none());
        assert_consistent(&cache);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cache = ServiceCache::new();
        cache.remove_record(&record("pool-1", None, "tenant-a"));
        assert!(cache.remove_by_pool_id("pool-1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_pool_and_tenant_sets() {
        let mut cache = ServiceCache::new();
        cache.put_record(record("pool-1", None, "tenant-a"));
        cache.put_record(record("pool-2", None, "tenant-a"));
        cache.put_record(record("pool-3", Some("port-3"), "tenant-b"));

        let pools = cache.get_all_pool_ids();
        assert_eq!(pools.len(), 3);
        assert!(pools.contains("pool-2"));

        let tenants = cache.get_all_tenant_ids();
        assert_eq!(tenants.len(), 2);
        assert!(tenants.contains("tenant-a") && tenants.contains("tenant-b"));
    }
}
