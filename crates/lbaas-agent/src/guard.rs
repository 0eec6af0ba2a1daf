//! # Connection Guard
//!
//! Precondition check run before every device call.
//!
//! ```text
//!   device call ──► ensure_connected(op)
//!                        │
//!          connected && no lost session? ──yes──► proceed
//!                        │ no
//!                        ▼
//!                 driver.connect() ◄──────────┐
//!                        │                    │ backoff (500ms, 1s, 2s, ... ≤ max)
//!                   ok ──┴── err ─────────────┘
//!                   │          │ retries or elapsed budget exhausted
//!                proceed       ▼
//!                        NotConnected { op }
//! ```
//!
//! After the call, [`ConnectionGuard::observe`] marks the session lost when
//! the driver returned a connection error, so the next call reconnects even
//! if the driver still claims to be connected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, error, info, warn};

use crate::config::DeviceSettings;
use crate::error::{AgentError, AgentResult};
use crate::traits::DeviceDriver;

// =============================================================================
// Reconnect Policy
// =============================================================================

/// Backoff bounds for re-establishing a device session.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_elapsed: Duration,
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::from_settings(&DeviceSettings::default())
    }
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &DeviceSettings) -> Self {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(settings.reconnect_initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.reconnect_max_backoff_secs),
            max_elapsed: Duration::from_secs(settings.reconnect_max_elapsed_secs),
            max_retries: settings.reconnect_max_retries,
        }
    }
}

// =============================================================================
// Connection Guard
// =============================================================================

pub struct ConnectionGuard {
    driver: Arc<dyn DeviceDriver>,
    policy: ReconnectPolicy,

    /// Set when a device call failed with a connection error.
    session_lost: AtomicBool,
}

impl ConnectionGuard {
    pub fn new(driver: Arc<dyn DeviceDriver>, policy: ReconnectPolicy) -> Self {
        ConnectionGuard {
            driver,
            policy,
            session_lost: AtomicBool::new(false),
        }
    }

    /// Returns once the device is usable, reconnecting if needed.
    pub async fn ensure_connected(&self, operation: &str) -> AgentResult<()> {
        if self.driver.is_connected() && !self.session_lost.load(Ordering::SeqCst) {
            return Ok(());
        }

        debug!(operation = %operation, "Device session not established, connecting");

        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.driver.connect().await {
                Ok(()) => {
                    self.session_lost.store(false, Ordering::SeqCst);
                    info!(attempt, "Device session established");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, operation = %operation, "Device connection attempt failed");
                }
            }

            if attempt >= self.policy.max_retries {
                break;
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    debug!(?delay, "Backing off before reconnecting");
                    tokio::time::sleep(delay).await;
                }
                None => break,
            }
        }

        error!(operation = %operation, attempts = attempt, "Giving up on device connection");
        Err(AgentError::NotConnected {
            operation: operation.to_string(),
        })
    }

    /// Inspects the outcome of a device call.
    pub fn observe<T>(&self, result: &AgentResult<T>) {
        if let Err(e) = result {
            if e.is_connection_error() {
                warn!(error = %e, "Device session lost");
                self.session_lost.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn is_session_lost(&self) -> bool {
        self.session_lost.load(Ordering::SeqCst)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.policy.initial_backoff,
            max_interval: self.policy.max_backoff,
            max_elapsed_time: Some(self.policy.max_elapsed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;

    fn fast_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            max_elapsed: Duration::from_secs(5),
            max_retries,
        }
    }

    #[tokio::test]
    async fn test_connected_driver_skips_connect() {
        let driver = Arc::new(FakeDriver::new());
        let guard = ConnectionGuard::new(driver.clone(), fast_policy(3));

        guard.ensure_connected("sync").await.unwrap();
        assert_eq!(driver.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconnects_after_failures() {
        let driver = Arc::new(FakeDriver::new());
        driver.set_connected(false);
        driver.fail_next_connects(2);
        let guard = ConnectionGuard::new(driver.clone(), fast_policy(5));

        guard.ensure_connected("create_vip").await.unwrap();
        assert_eq!(driver.connect_calls(), 3);
        assert!(driver.is_connected());
    }

    #[tokio::test]
    async fn test_gives_up_with_not_connected() {
        let driver = Arc::new(FakeDriver::new());
        driver.set_connected(false);
        driver.fail_next_connects(10);
        let guard = ConnectionGuard::new(driver.clone(), fast_policy(3));

        let err = guard.ensure_connected("delete_member").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::NotConnected { ref operation } if operation == "delete_member"
        ));
        assert_eq!(driver.connect_calls(), 3);
    }

    #[tokio::test]
    async fn test_connection_error_forces_reconnect() {
        let driver = Arc::new(FakeDriver::new());
        let guard = ConnectionGuard::new(driver.clone(), fast_policy(3));

        guard.observe::<()>(&Err(AgentError::device("sync", "bad monitor")));
        assert!(!guard.is_session_lost());

        guard.observe::<()>(&Err(AgentError::ConnectionFailed("reset".into())));
        assert!(guard.is_session_lost());

        guard.ensure_connected("sync").await.unwrap();
        assert_eq!(driver.connect_calls(), 1);
        assert!(!guard.is_session_lost());
    }
}
