//! # Validation Module
//!
//! Sanity checks applied to service descriptions before they reach a device.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Control plane                                                │
//! │  └── API-level schema checks on user input                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Agent (Rust)                                                 │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: structural consistency of one description            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Device driver                                                │
//! │  └── Device-specific limits                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A description that fails here is never applied: the refresh counts as a
//! failure and the pool is retried on the next pass.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{HealthMonitor, Member, ServiceDescription};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest identifier accepted from the control plane.
pub const MAX_ID_LEN: usize = 255;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a resource identifier.
///
/// ## Rules
/// - Must not be empty or blank
/// - At most [`MAX_ID_LEN`] characters
///
/// ## Example
/// ```rust
/// use lbaas_core::validation::validate_id;
///
/// assert!(validate_id("pool.id", "6f1e2c").is_ok());
/// assert!(validate_id("pool.id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a TCP/UDP port number (0 is not a usable port).
pub fn validate_protocol_port(field: &str, port: u16) -> ValidationResult<()> {
    if port == 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: u16::MAX as i64,
        });
    }
    Ok(())
}

/// Validates an IP address literal.
pub fn validate_address(field: &str, address: &str) -> ValidationResult<()> {
    address
        .parse::<std::net::IpAddr>()
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

// =============================================================================
// Resource Validators
// =============================================================================

/// Validates one member against the pool it is delivered with.
pub fn validate_member(member: &Member, pool_id: &str) -> CoreResult<()> {
    validate_id("member.id", &member.id)?;
    validate_address("member.address", &member.address)?;
    validate_protocol_port("member.protocol_port", member.protocol_port)?;

    if member.pool_id != pool_id {
        return Err(CoreError::MemberPoolMismatch {
            member_id: member.id.clone(),
            member_pool_id: member.pool_id.clone(),
            pool_id: pool_id.to_string(),
        });
    }

    Ok(())
}

/// Validates a health monitor.
///
/// ## Rules
/// - `delay` must be at least 1 second
/// - `timeout` must not exceed `delay` (a probe must finish before the next)
pub fn validate_health_monitor(monitor: &HealthMonitor) -> ValidationResult<()> {
    validate_id("health_monitor.id", &monitor.id)?;

    if monitor.delay == 0 {
        return Err(ValidationError::OutOfRange {
            field: "health_monitor.delay".to_string(),
            min: 1,
            max: u32::MAX as i64,
        });
    }

    if monitor.timeout > monitor.delay {
        return Err(ValidationError::OutOfRange {
            field: "health_monitor.timeout".to_string(),
            min: 0,
            max: monitor.delay as i64,
        });
    }

    Ok(())
}

/// Validates a full service description.
///
/// When `expected_pool_id` is given, the description must describe that pool.
pub fn validate_service(
    service: &ServiceDescription,
    expected_pool_id: Option<&str>,
) -> CoreResult<()> {
    validate_id("pool.id", &service.pool.id)?;
    validate_id("pool.tenant_id", &service.pool.tenant_id)?;

    if let Some(expected) = expected_pool_id {
        if expected != service.pool.id {
            return Err(CoreError::PoolIdMismatch {
                requested: expected.to_string(),
                actual: service.pool.id.clone(),
            });
        }
    }

    if let Some(ref vip) = service.vip {
        validate_id("vip.id", &vip.id)?;
        validate_address("vip.address", &vip.address)?;
        validate_protocol_port("vip.protocol_port", vip.protocol_port)?;
    }

    for member in &service.members {
        validate_member(member, &service.pool.id)?;
    }

    for monitor in &service.health_monitors {
        validate_health_monitor(monitor)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
