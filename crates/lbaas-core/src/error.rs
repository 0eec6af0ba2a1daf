//! # Error Types
//!
//! Domain-specific error types for lbaas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  lbaas-core errors (this file)                                         │
//! │  ├── CoreError        - Service description inconsistencies            │
//! │  └── ValidationError  - Field-level validation failures                │
//! │                                                                         │
//! │  lbaas-agent errors (separate crate)                                   │
//! │  └── AgentError       - Device, control-plane and runtime failures     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → AgentError → logs / ERROR status  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (pool ID, member ID, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised when a service description cannot be trusted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The control plane answered with a different pool than requested.
    ///
    /// ## When This Occurs
    /// - Pool IDs were recycled on the control-plane side
    /// - A buggy control-plane client mixed up responses
    #[error("Requested pool {requested} but control plane returned pool {actual}")]
    PoolIdMismatch { requested: String, actual: String },

    /// A member in the description claims to belong to another pool.
    #[error("Member {member_id} belongs to pool {member_pool_id}, not {pool_id}")]
    MemberPoolMismatch {
        member_id: String,
        member_pool_id: String,
        pool_id: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed address).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
