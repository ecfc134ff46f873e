//! # Validation Module
//!
//! Input validation for ledger payloads.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Route handler (web app)                                      │
//! │  └── Body shape / deserialization                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── quantities > 0, money >= 0, totals agree                          │
//! │  └── names, ids, search terms                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK constraints (quantity > 0, amounts >= 0)                    │
//! │  ├── UNIQUE (tenant_id, document_number)                               │
//! │  └── Foreign keys (items → quotation)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_NAME_LEN, MAX_NOTES_LEN, MAX_SEARCH_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an opaque identifier (tenant, customer, product, ...).
///
/// ```rust
/// use tienda_core::validation::validate_id;
///
/// assert!(validate_id("customer_id", "c-1").is_ok());
/// assert!(validate_id("customer_id", " ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a display name (register, customer, branch).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates free-form notes on a quotation.
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }

    Ok(())
}

/// Validates a search query and returns it trimmed. Empty is allowed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity: strictly positive.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates that an amount is zero or greater.
///
/// ```rust
/// use tienda_core::money::Money;
/// use tienda_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("discount", Money::zero()).is_ok());
/// assert!(validate_non_negative("discount", Money::from_cents(-1)).is_err());
/// ```
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a balance adjustment: any sign, but not zero.
pub fn validate_adjustment(delta: Money) -> ValidationResult<()> {
    if delta.is_zero() {
        return Err(ValidationError::InvalidFormat {
            field: "delta".to_string(),
            reason: "adjustment must not be zero".to_string(),
        });
    }

    Ok(())
}

/// Validates document aggregates: all non-negative and
/// `total = subtotal - discount`.
///
/// ## Example
/// ```rust
/// use tienda_core::money::Money;
/// use tienda_core::validation::validate_totals;
///
/// let m = Money::from_cents;
/// assert!(validate_totals(m(2000), m(0), m(2000)).is_ok());
/// assert!(validate_totals(m(2000), m(500), m(1500)).is_ok());
/// assert!(validate_totals(m(2000), m(500), m(2000)).is_err());
/// assert!(validate_totals(m(2000), m(2500), m(-500)).is_err());
/// ```
pub fn validate_totals(subtotal: Money, discount: Money, total: Money) -> ValidationResult<()> {
    validate_non_negative("subtotal", subtotal)?;
    validate_non_negative("discount", discount)?;
    validate_non_negative("total", total)?;

    let expected = subtotal
        .checked_sub(discount)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "total".to_string(),
            min: 0,
            max: i64::MAX,
        })?;

    if expected != total {
        return Err(ValidationError::Mismatch {
            field: "total".to_string(),
            expected: expected.cents(),
            actual: total.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", &"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Caja principal").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_notes() {
        assert!(validate_notes("").is_ok());
        assert!(validate_notes(&"n".repeat(MAX_NOTES_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(10_000).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_adjustment() {
        assert!(validate_adjustment(Money::from_cents(-3000)).is_ok());
        assert!(validate_adjustment(Money::from_cents(1)).is_ok());
        assert!(validate_adjustment(Money::zero()).is_err());
    }

    #[test]
    fn test_validate_totals_reports_mismatch() {
        let err = validate_totals(
            Money::from_cents(2000),
            Money::from_cents(100),
            Money::from_cents(2000),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Mismatch {
                field: "total".to_string(),
                expected: 1900,
                actual: 2000,
            }
        );
    }

    #[test]
    fn test_validate_totals_rejects_negative_parts() {
        let m = Money::from_cents;
        assert!(validate_totals(m(-1), m(0), m(-1)).is_err());
        assert!(validate_totals(m(100), m(-1), m(101)).is_err());
    }
}
