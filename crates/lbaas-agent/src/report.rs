//! Pass reports and the published agent status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Per-service Outcome
// =============================================================================

/// Result of refreshing or destroying one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// The device now matches the description.
    Applied,

    /// The control plane no longer knows the pool; nothing to do.
    Absent,

    /// The attempt failed and a resync is pending.
    Failed(String),
}

impl ServiceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ServiceOutcome::Failed(_))
    }
}

/// Result of asking the driver to remove orphaned device objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum OrphanOutcome {
    #[default]
    NotRun,
    Done,
    Unsupported,
    Failed(String),
}

// =============================================================================
// Pass Report
// =============================================================================

/// Summary of one full reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// The active pool list could not be fetched; no destroys or refreshes ran.
    pub fetch_failed: bool,

    pub destroyed: Vec<String>,
    pub refreshed: Vec<String>,

    /// Pools the control plane no longer describes.
    pub absent: Vec<String>,

    /// Pool ID → error message.
    pub failed: BTreeMap<String, String>,

    pub orphans: OrphanOutcome,
}

impl PassReport {
    pub fn start() -> Self {
        PassReport {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            fetch_failed: false,
            destroyed: Vec::new(),
            refreshed: Vec::new(),
            absent: Vec::new(),
            failed: BTreeMap::new(),
            orphans: OrphanOutcome::NotRun,
        }
    }

    pub fn record_destroy(&mut self, pool_id: &str, outcome: ServiceOutcome) {
        match outcome {
            ServiceOutcome::Applied => self.destroyed.push(pool_id.to_string()),
            ServiceOutcome::Absent => self.absent.push(pool_id.to_string()),
            ServiceOutcome::Failed(message) => {
                self.failed.insert(pool_id.to_string(), message);
            }
        }
    }

    pub fn record_refresh(&mut self, pool_id: &str, outcome: ServiceOutcome) {
        match outcome {
            ServiceOutcome::Applied => self.refreshed.push(pool_id.to_string()),
            ServiceOutcome::Absent => self.absent.push(pool_id.to_string()),
            ServiceOutcome::Failed(message) => {
                self.failed.insert(pool_id.to_string(), message);
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True if nothing in the pass asked for another one.
    pub fn is_clean(&self) -> bool {
        !self.fetch_failed
            && self.failed.is_empty()
            && !matches!(self.orphans, OrphanOutcome::Failed(_))
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

// =============================================================================
// Agent Status
// =============================================================================

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Reconciling,
}

/// Snapshot published by the agent task after every engine operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_host: String,
    pub state: EngineState,
    pub admin_state_up: bool,
    pub needs_resync: bool,
    pub service_count: usize,
    pub tenant_count: usize,
    pub last_pass: Option<PassReport>,
    pub last_error: Option<String>,
}
