//! # Agent Error Types
//!
//! Error types for device, control-plane and runtime operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Agent Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Device      │  │     Control Plane       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  RpcFailed              │ │
//! │  │  ConfigLoad     │  │  NotConnected   │  │  NotFound               │ │
//! │  │  ConfigSave     │  │  Unsupported    │  │                         │ │
//! │  │                 │  │  DeviceError    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │   Validation    │  │                Internal                     │  │
//! │  │                 │  │                                             │  │
//! │  │  InvalidService │  │  ShuttingDown, Internal                     │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No variant ever escapes a periodic tick or an event handler: the engine
//! turns them into log lines, the resync flag, or an `ERROR` status report.

use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent error type covering every failure the engine can observe.
#[derive(Debug, Error)]
pub enum AgentError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid agent configuration.
    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Device Errors
    // =========================================================================
    /// Could not (re)establish a session with the device.
    #[error("Device connection failed: {0}")]
    ConnectionFailed(String),

    /// A device call was attempted while no session could be established.
    #[error("Cannot execute {operation}: device not connected")]
    NotConnected { operation: String },

    /// The driver does not implement an optional capability.
    #[error("Operation not supported by device driver: {0}")]
    Unsupported(String),

    /// The device rejected or failed an operation.
    #[error("Device error during {operation}: {message}")]
    DeviceError { operation: String, message: String },

    // =========================================================================
    // Control Plane Errors
    // =========================================================================
    /// A control-plane call failed.
    #[error("Control plane call {method} failed: {message}")]
    RpcFailed { method: String, message: String },

    /// The control plane or the device does not know the object. Callers
    /// treat this as work already done.
    #[error("Not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// The control plane delivered a description that cannot be applied.
    #[error("Invalid service description: {0}")]
    InvalidService(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal agent error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The agent task has stopped and no longer accepts requests.
    #[error("Agent is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Constructors
// =============================================================================

impl AgentError {
    /// Shorthand for a device-side failure.
    pub fn device(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::DeviceError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a failed control-plane call.
    pub fn rpc(method: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::RpcFailed {
            method: method.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<lbaas_core::CoreError> for AgentError {
    fn from(err: lbaas_core::CoreError) -> Self {
        AgentError::InvalidService(err.to_string())
    }
}

impl From<lbaas_core::ValidationError> for AgentError {
    fn from(err: lbaas_core::ValidationError) -> Self {
        AgentError::InvalidService(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::InvalidService(err.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(err: toml::de::Error) -> Self {
        AgentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for AgentError {
    fn from(err: toml::ser::Error) -> Self {
        AgentError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl AgentError {
    /// Returns true if the device session should be considered lost.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AgentError::ConnectionFailed(_) | AgentError::NotConnected { .. }
        )
    }

    /// Returns true if the driver lacks the requested capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AgentError::Unsupported(_))
    }

    /// Returns true if the target object is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(AgentError::NotFound("delete_member:m-1".into()).is_not_found());
        assert!(!AgentError::device("delete_member", "busy").is_not_found());

        assert!(AgentError::Unsupported("remove_orphans".into()).is_unsupported());
        assert!(!AgentError::rpc("get_active_pool_ids", "503").is_unsupported());
    }

    #[test]
    fn test_connection_errors() {
        let err = AgentError::NotConnected {
            operation: "create_vip".into(),
        };
        assert!(err.is_connection_error());
        assert_eq!(
            err.to_string(),
            "Cannot execute create_vip: device not connected"
        );
        assert!(!AgentError::device("sync", "x").is_connection_error());
    }

    #[test]
    fn test_core_error_conversion() {
        let core = lbaas_core::CoreError::PoolIdMismatch {
            requested: "pool-1".into(),
            actual: "pool-2".into(),
        };
        let err: AgentError = core.into();
        assert!(matches!(err, AgentError::InvalidService(_)));
        assert!(err.to_string().contains("pool-2"));
    }
}
