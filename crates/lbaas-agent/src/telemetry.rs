//! Tracing setup for processes embedding the agent.

use tracing_subscriber::EnvFilter;

use crate::error::{AgentError, AgentResult};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,lbaas=debug";

/// Installs the global fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=lbaas_agent=trace` - Show trace for the agent only
/// - Default: INFO, DEBUG for the lbaas crates
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing() -> AgentResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| AgentError::Internal(format!("Failed to install tracing subscriber: {}", e)))
}
