//! # Error Types
//!
//! Domain-specific error types for tienda-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tienda-core errors (this file)                                        │
//! │  ├── CoreError        - NotFound / Conflict / Validation               │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tienda-db errors (separate crate)                                     │
//! │  └── DbError          - Adds Consistency + storage failures            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → route handler           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tenant Isolation
//! `NotFound` never says whether a row exists under another tenant. The
//! message only carries the entity kind and the id the caller supplied.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Entity absent, or owned by a different tenant.
    ///
    /// ## When This Occurs
    /// - Quotation, register, customer or branch id doesn't exist
    /// - Row exists but `tenant_id` differs (reported identically)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// State-machine violation.
    ///
    /// ## When This Occurs
    /// - Opening a register that is already open
    /// - Closing or adjusting a register that is closed
    /// - Deleting a register that is open
    ///
    /// ## User Workflow
    /// ```text
    /// Cashier presses "Abrir caja"
    ///      │
    ///      ▼
    /// Register state: Open
    ///      │
    ///      ▼
    /// Conflict { reason: "la caja ya está abierta" }
    ///      │
    ///      ▼
    /// UI shows the reason verbatim, nothing was changed
    /// ```
    #[error("{entity} {id}: {reason}")]
    Conflict {
        entity: String,
        id: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::Conflict {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Always recoverable by the caller correcting input; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed document number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two values that must agree don't.
    #[error("{field} must equal {expected}, got {actual}")]
    Mismatch {
        field: String,
        expected: i64,
        actual: i64,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::conflict("CashRegister", "r-1", "la caja ya está abierta");
        assert_eq!(err.to_string(), "CashRegister r-1: la caja ya está abierta");

        let err = CoreError::not_found("Quotation", "q-9");
        assert_eq!(err.to_string(), "Quotation not found: q-9");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");

        let err = ValidationError::Mismatch {
            field: "total".to_string(),
            expected: 2000,
            actual: 1900,
        };
        assert_eq!(err.to_string(), "total must equal 2000, got 1900");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
