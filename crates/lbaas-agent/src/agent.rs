//! # LBaaS Agent
//!
//! The task that owns the [`ReconciliationEngine`] and drives it.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LbaasAgent Task                                  │
//! │                                                                         │
//! │   resync tick (40s) ──┐                                                │
//! │   stats tick  (6s)  ──┤                                                │
//! │   backup tick (600s) ─┼──► select! ──► ReconciliationEngine (&mut)     │
//! │   AgentEvent (mpsc) ──┤                        │                       │
//! │   shutdown          ──┘                        ▼                       │
//! │                                      Arc<RwLock<AgentStatus>>          │
//! │                                                 ▲                       │
//! │   AgentHandle (clone) ── send / reload_pool / set_admin_state / status │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one engine operation runs at a time. Ticks that fall behind are
//! delayed, never replayed in a burst.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::engine::ReconciliationEngine;
use crate::error::{AgentError, AgentResult};
use crate::event::AgentEvent;
use crate::report::{AgentStatus, EngineState};
use crate::traits::{ControlPlaneClient, DeviceDriver};

// =============================================================================
// Agent Handle
// =============================================================================

/// Handle for talking to a running agent from other tasks.
#[derive(Clone)]
pub struct AgentHandle {
    event_tx: mpsc::Sender<AgentEvent>,
    shutdown_tx: mpsc::Sender<()>,
    status: Arc<RwLock<AgentStatus>>,
}

impl AgentHandle {
    /// Queues an inbound event. Fails with `ShuttingDown` once the agent
    /// task has stopped.
    pub async fn send(&self, event: AgentEvent) -> AgentResult<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| AgentError::ShuttingDown)
    }

    /// Asks the agent to re-apply one pool.
    pub async fn reload_pool(&self, pool_id: &str, host: &str) -> AgentResult<()> {
        self.send(AgentEvent::ReloadPool {
            pool_id: pool_id.to_string(),
            host: host.to_string(),
        })
        .await
    }

    pub async fn set_admin_state(&self, admin_state_up: bool) -> AgentResult<()> {
        self.send(AgentEvent::AgentUpdated { admin_state_up }).await
    }

    /// Latest published status.
    pub async fn status(&self) -> AgentStatus {
        self.status.read().await.clone()
    }

    /// Signals the agent to stop after the current operation.
    pub async fn shutdown(&self) -> AgentResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| AgentError::ShuttingDown)
    }
}

// =============================================================================
// Agent
// =============================================================================

pub struct LbaasAgent {
    engine: ReconciliationEngine,
    config: Arc<AgentConfig>,
    status: Arc<RwLock<AgentStatus>>,
    event_rx: mpsc::Receiver<AgentEvent>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl LbaasAgent {
    /// Creates the agent and a handle to it. Call [`LbaasAgent::run`] to start.
    pub fn new(engine: ReconciliationEngine, config: Arc<AgentConfig>) -> (Self, AgentHandle) {
        let (event_tx, event_rx) = mpsc::channel(config.reconcile.event_channel_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let status = Arc::new(RwLock::new(engine.status()));

        let agent = LbaasAgent {
            engine,
            config,
            status: status.clone(),
            event_rx,
            shutdown_rx,
        };

        let handle = AgentHandle {
            event_tx,
            shutdown_tx,
            status,
        };

        (agent, handle)
    }

    /// Creates the agent and runs it on a new tokio task.
    pub fn spawn(
        engine: ReconciliationEngine,
        config: Arc<AgentConfig>,
    ) -> (AgentHandle, JoinHandle<()>) {
        let (agent, handle) = Self::new(engine, config);
        let task = tokio::spawn(agent.run());
        (handle, task)
    }

    /// Runs until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        info!(
            agent_host = %self.engine.agent_host(),
            resync_secs = self.config.reconcile.resync_interval_secs,
            stats_secs = self.config.reconcile.stats_interval_secs,
            "LBaaS agent starting"
        );

        let mut resync = tokio::time::interval(self.config.resync_interval());
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = tokio::time::interval(self.config.stats_interval());
        stats.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut backup = tokio::time::interval(self.config.backup_interval());
        backup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = resync.tick() => {
                    if self.engine.needs_resync() {
                        self.mark_reconciling().await;
                    }
                    self.engine.periodic_resync().await;
                    self.publish().await;
                }

                _ = stats.tick() => {
                    self.engine.collect_stats().await;
                    self.publish().await;
                }

                _ = backup.tick() => {
                    self.engine.backup_configuration().await;
                }

                Some(event) = self.event_rx.recv() => {
                    debug!(event = event.name(), "Event received");
                    self.mark_reconciling().await;
                    self.engine.handle_event(event).await;
                    self.publish().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("LBaaS agent received shutdown");
                    break;
                }
            }
        }

        self.publish().await;
        info!("LBaaS agent stopped");
    }

    async fn mark_reconciling(&self) {
        self.status.write().await.state = EngineState::Reconciling;
    }

    async fn publish(&self) {
        *self.status.write().await = self.engine.status();
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for assembling an agent from its collaborators.
pub struct LbaasAgentBuilder {
    config: AgentConfig,
    driver: Option<Arc<dyn DeviceDriver>>,
    client: Option<Arc<dyn ControlPlaneClient>>,
}

impl LbaasAgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        LbaasAgentBuilder {
            config,
            driver: None,
            client: None,
        }
    }

    pub fn with_driver(mut self, driver: Arc<dyn DeviceDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_control_plane(mut self, client: Arc<dyn ControlPlaneClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Validates the configuration and builds the agent.
    pub fn build(self) -> AgentResult<(LbaasAgent, AgentHandle)> {
        self.config.validate()?;

        let driver = self.driver.ok_or_else(|| {
            AgentError::InvalidConfig(format!("Device driver '{}' not provided", self.config.device.driver))
        })?;
        let client = self
            .client
            .ok_or_else(|| AgentError::InvalidConfig("Control plane client required".into()))?;

        let engine = ReconciliationEngine::from_config(driver, client, &self.config);
        Ok(LbaasAgent::new(engine, Arc::new(self.config)))
    }
}
