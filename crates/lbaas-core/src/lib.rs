//! # lbaas-core: Service Model and Cache for the LBaaS Agent
//!
//! This crate holds the in-memory half of the agent: the service description
//! model delivered by the control plane, the [`ServiceCache`] of services the
//! agent believes are provisioned, and validation. It has zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LBaaS Agent Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Control plane (RPC)                          │   │
//! │  │    active pool IDs, service descriptions, status sinks          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              lbaas-agent (reconciliation engine)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ lbaas-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌────────────┐               │   │
//! │  │   │   types   │  │    cache    │  │ validation │               │   │
//! │  │   │  Pool,Vip │  │ ServiceCache│  │   rules    │               │   │
//! │  │   │  Member   │  │  dual index │  │   checks   │               │   │
//! │  │   └───────────┘  └─────────────┘  └────────────┘               │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO DEVICE ACCESS                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Service description model and [`ServiceRecord`]
//! - [`cache`] - [`ServiceCache`], indexed by pool and VIP port
//! - [`error`] - Domain error types
//! - [`validation`] - Structural checks on service descriptions
//!
//! ## Example Usage
//!
//! ```rust
//! use lbaas_core::{ServiceCache, ServiceRecord};
//!
//! let mut cache = ServiceCache::new();
//! cache.put_record(ServiceRecord::new("pool-1", Some("port-1".into()), "tenant-a"));
//!
//! assert_eq!(cache.get_by_port_id("port-1").unwrap().pool_id, "pool-1");
//! assert!(cache.get_all_pool_ids().contains("pool-1"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cache::ServiceCache;
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
