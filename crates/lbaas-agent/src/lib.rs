//! # lbaas-agent: Reconciliation Agent for Load-Balancer Devices
//!
//! Keeps load-balancing devices consistent with the pools a control plane
//! says should exist, through restarts, partial failures and device outages.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LBaaS Agent Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 LbaasAgent (single tokio task)                   │  │
//! │  │                                                                  │  │
//! │  │  resync / stats / backup ticks + inbound AgentEvents            │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ &mut                                    │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                    ReconciliationEngine                          │  │
//! │  │                                                                  │  │
//! │  │  sync_state • refresh/destroy • events • stats • admin state    │  │
//! │  │  ServiceCache (lbaas-core) • needs_resync • PassReport          │  │
//! │  └───────────┬───────────────────────────────────────┬──────────────┘  │
//! │              │                                       │                  │
//! │  ┌───────────▼──────────────┐           ┌────────────▼─────────────┐   │
//! │  │   ConnectionGuard        │           │   ControlPlaneClient     │   │
//! │  │   └─► DeviceDriver       │           │   (desired state, status)│   │
//! │  └──────────────────────────┘           └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `LbaasAgent` task, `AgentHandle` and builder
//! - [`engine`] - `ReconciliationEngine`
//! - [`event`] - Inbound `AgentEvent`s
//! - [`guard`] - Device connection guard with backoff
//! - [`traits`] - `DeviceDriver` and `ControlPlaneClient`
//! - [`report`] - Pass reports and published status
//! - [`config`] - Agent configuration (TOML + env)
//! - [`error`] - Agent error types
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lbaas_agent::{AgentConfig, LbaasAgentBuilder};
//!
//! lbaas_agent::telemetry::init_tracing()?;
//! let config = AgentConfig::load(None)?;
//!
//! let (agent, handle) = LbaasAgentBuilder::new(config)
//!     .with_driver(Arc::new(my_driver))
//!     .with_control_plane(Arc::new(my_rpc_client))
//!     .build()?;
//! tokio::spawn(agent.run());
//!
//! handle.reload_pool("pool-1", "lb-agent-01:cluster-a").await?;
//! println!("services: {}", handle.status().await.service_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod guard;
pub mod report;
pub mod telemetry;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentHandle, LbaasAgent, LbaasAgentBuilder};
pub use config::{AgentConfig, HaType};
pub use engine::ReconciliationEngine;
pub use error::{AgentError, AgentResult};
pub use event::AgentEvent;
pub use guard::{ConnectionGuard, ReconnectPolicy};
pub use report::{AgentStatus, EngineState, OrphanOutcome, PassReport, ServiceOutcome};
pub use traits::{ControlPlaneClient, DeviceDriver};
