//! # Cash Registers
//!
//! The open/close state machine of a cash register (caja) and the pure rules
//! behind every balance-affecting operation.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            open(amount)                                                 │
//! │   Closed ───────────────────► Open ◄──┐                                 │
//! │     ▲                          │      │ adjust(delta)                   │
//! │     │        close()           │      │ current += delta                │
//! │     └──────────────────────────┘ ─────┘                                 │
//! │                                                                         │
//! │   open on Open      → Conflict "la caja ya está abierta"                │
//! │   close on Closed   → Conflict "la caja ya está cerrada"                │
//! │   adjust on Closed  → Conflict "la caja está cerrada"                   │
//! │   delete on Open    → Conflict "no se puede eliminar una caja abierta"  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balances are stored flat (`opening_balance_cents`, `current_balance_cents`)
//! alongside `is_open` and the two timestamps. [`RegisterState`] is the typed
//! view; [`RegisterState::from_columns`] rejects flag/timestamp combinations
//! that can't occur.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_adjustment, validate_id, validate_name, validate_non_negative};

/// Entity name used in register errors.
pub const CASH_REGISTER: &str = "CashRegister";

pub const ALREADY_OPEN: &str = "la caja ya está abierta";
pub const ALREADY_CLOSED: &str = "la caja ya está cerrada";
pub const REGISTER_CLOSED: &str = "la caja está cerrada";
pub const DELETE_OPEN: &str = "no se puede eliminar una caja abierta";

// =============================================================================
// State
// =============================================================================

/// Whether a register is taking cash, and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterState {
    Closed {
        /// `None` for a register that was never closed.
        #[ts(as = "Option<String>")]
        since: Option<DateTime<Utc>>,
    },
    Open {
        #[ts(as = "String")]
        since: DateTime<Utc>,
        starting_balance_cents: i64,
    },
}

impl RegisterState {
    /// Rebuilds the state from its storage columns.
    ///
    /// Returns `None` for an open register without an open timestamp.
    pub fn from_columns(
        is_open: bool,
        last_open_at: Option<DateTime<Utc>>,
        last_close_at: Option<DateTime<Utc>>,
        opening_balance_cents: i64,
    ) -> Option<Self> {
        match (is_open, last_open_at) {
            (true, Some(since)) => Some(RegisterState::Open {
                since,
                starting_balance_cents: opening_balance_cents,
            }),
            (true, None) => None,
            (false, _) => Some(RegisterState::Closed {
                since: last_close_at,
            }),
        }
    }

    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, RegisterState::Open { .. })
    }
}

// =============================================================================
// Cash Register
// =============================================================================

/// A cash register belonging to a tenant, optionally assigned to a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: Option<String>,
    pub name: String,
    /// Amount counted in at the last open.
    pub opening_balance_cents: i64,
    pub current_balance_cents: i64,
    pub state: RegisterState,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashRegister {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    #[inline]
    pub fn opening_balance(&self) -> Money {
        Money::from_cents(self.opening_balance_cents)
    }

    #[inline]
    pub fn current_balance(&self) -> Money {
        Money::from_cents(self.current_balance_cents)
    }

    /// Opens the register with a counted amount.
    ///
    /// Both balances are reset to `amount`.
    pub fn open(&self, amount: Money, now: DateTime<Utc>) -> CoreResult<CashRegister> {
        validate_non_negative("amount", amount)?;
        if self.is_open() {
            return Err(self.conflict(ALREADY_OPEN));
        }

        Ok(CashRegister {
            opening_balance_cents: amount.cents(),
            current_balance_cents: amount.cents(),
            state: RegisterState::Open {
                since: now,
                starting_balance_cents: amount.cents(),
            },
            updated_at: now,
            ..self.clone()
        })
    }

    /// Closes the register. Balances are left as they are.
    pub fn close(&self, now: DateTime<Utc>) -> CoreResult<CashRegister> {
        if !self.is_open() {
            return Err(self.conflict(ALREADY_CLOSED));
        }

        Ok(CashRegister {
            state: RegisterState::Closed { since: Some(now) },
            updated_at: now,
            ..self.clone()
        })
    }

    /// Applies a signed delta to the current balance of an open register.
    ///
    /// The balance may go negative.
    pub fn adjust(&self, delta: Money, now: DateTime<Utc>) -> CoreResult<CashRegister> {
        validate_adjustment(delta)?;
        self.ensure_adjustable()?;

        let current = self
            .current_balance()
            .checked_add(delta)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "current_balance".to_string(),
                min: i64::MIN,
                max: i64::MAX,
            })?;

        Ok(CashRegister {
            current_balance_cents: current.cents(),
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn ensure_adjustable(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(self.conflict(REGISTER_CLOSED))
        }
    }

    pub fn ensure_deletable(&self) -> CoreResult<()> {
        if self.is_open() {
            Err(self.conflict(DELETE_OPEN))
        } else {
            Ok(())
        }
    }

    fn conflict(&self, reason: &str) -> CoreError {
        CoreError::conflict(CASH_REGISTER, &self.id, reason)
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Payload for registering a new cash register. Registers start closed with
/// `current_balance = opening_balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCashRegister {
    pub name: String,
    pub branch_id: Option<String>,
    #[serde(default)]
    pub opening_balance: Money,
}

impl NewCashRegister {
    pub fn new(name: impl Into<String>) -> Self {
        NewCashRegister {
            name: name.into(),
            branch_id: None,
            opening_balance: Money::zero(),
        }
    }

    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn with_opening_balance(mut self, amount: Money) -> Self {
        self.opening_balance = amount;
        self
    }

    /// Returns the payload with a trimmed name.
    pub fn validate(&self) -> Result<NewCashRegister, ValidationError> {
        validate_name(&self.name)?;
        validate_non_negative("opening_balance", self.opening_balance)?;
        if let Some(branch_id) = &self.branch_id {
            validate_id("branch_id", branch_id)?;
        }
        Ok(NewCashRegister {
            name: self.name.trim().to_string(),
            branch_id: self.branch_id.as_ref().map(|b| b.trim().to_string()),
            opening_balance: self.opening_balance,
        })
    }
}

/// Administrative edit of a register. Skips the state machine, so it can
/// rename, reassign or correct balances regardless of the open flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashRegisterChanges {
    pub name: Option<String>,
    /// `Some(None)` detaches the register from its branch.
    pub branch_id: Option<Option<String>>,
    pub opening_balance: Option<Money>,
    pub current_balance: Option<Money>,
}

impl CashRegisterChanges {
    pub fn validate(&self) -> Result<CashRegisterChanges, ValidationError> {
        let name = match &self.name {
            Some(name) => {
                validate_name(name)?;
                Some(name.trim().to_string())
            }
            None => None,
        };
        if let Some(Some(branch_id)) = &self.branch_id {
            validate_id("branch_id", branch_id)?;
        }
        if let Some(opening) = self.opening_balance {
            validate_non_negative("opening_balance", opening)?;
        }

        Ok(CashRegisterChanges {
            name,
            branch_id: self.branch_id.clone(),
            opening_balance: self.opening_balance,
            current_balance: self.current_balance,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == CashRegisterChanges::default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_register() -> CashRegister {
        let now = Utc::now();
        CashRegister {
            id: "r-1".to_string(),
            tenant_id: "acme".to_string(),
            branch_id: None,
            name: "Caja 1".to_string(),
            opening_balance_cents: 0,
            current_balance_cents: 0,
            state: RegisterState::Closed { since: None },
            created_at: now,
            updated_at: now,
        }
    }

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn reason(err: CoreError) -> String {
        match err {
            CoreError::Conflict { reason, .. } => reason,
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_open_adjust_close_sequence() {
        let now = Utc::now();
        let r = closed_register().open(m(10_000), now).unwrap();
        assert!(r.is_open());
        assert_eq!(r.opening_balance(), m(10_000));
        assert_eq!(r.current_balance(), m(10_000));

        let r = r.adjust(m(2500), now).unwrap();
        let r = r.adjust(m(-3000), now).unwrap();
        assert_eq!(r.current_balance(), m(9500));

        let err = r.open(m(0), now).unwrap_err();
        assert_eq!(reason(err), ALREADY_OPEN);

        let r = r.close(now).unwrap();
        assert!(!r.is_open());
        assert_eq!(r.current_balance(), m(9500));
        assert_eq!(r.state, RegisterState::Closed { since: Some(now) });

        assert_eq!(reason(r.adjust(m(100), now).unwrap_err()), REGISTER_CLOSED);
        assert_eq!(reason(r.close(now).unwrap_err()), ALREADY_CLOSED);
        assert!(r.ensure_deletable().is_ok());
    }

    #[test]
    fn test_reopen_resets_balances() {
        let now = Utc::now();
        let r = closed_register()
            .open(m(10_000), now)
            .and_then(|r| r.adjust(m(-4_000), now))
            .and_then(|r| r.close(now))
            .and_then(|r| r.open(m(500), now))
            .unwrap();
        assert_eq!(r.opening_balance(), m(500));
        assert_eq!(r.current_balance(), m(500));
    }

    #[test]
    fn test_balance_may_go_negative() {
        let now = Utc::now();
        let r = closed_register()
            .open(m(100), now)
            .and_then(|r| r.adjust(m(-300), now))
            .unwrap();
        assert_eq!(r.current_balance(), m(-200));
    }

    #[test]
    fn test_open_register_cannot_be_deleted() {
        let r = closed_register().open(m(0), Utc::now()).unwrap();
        assert_eq!(reason(r.ensure_deletable().unwrap_err()), DELETE_OPEN);
    }

    #[test]
    fn test_invalid_amounts_are_validation_errors() {
        let now = Utc::now();
        assert!(matches!(
            closed_register().open(m(-1), now),
            Err(CoreError::Validation(_))
        ));
        let open = closed_register().open(m(0), now).unwrap();
        assert!(matches!(
            open.adjust(Money::zero(), now),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_state_from_columns() {
        let now = Utc::now();
        assert_eq!(
            RegisterState::from_columns(true, Some(now), None, 700),
            Some(RegisterState::Open {
                since: now,
                starting_balance_cents: 700
            })
        );
        assert_eq!(
            RegisterState::from_columns(false, Some(now), None, 0),
            Some(RegisterState::Closed { since: None })
        );
        assert_eq!(RegisterState::from_columns(true, None, None, 0), None);
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let json = serde_json::to_value(RegisterState::Closed { since: None }).unwrap();
        assert_eq!(json["status"], "closed");
    }

    #[test]
    fn test_new_register_validation() {
        let v = NewCashRegister::new("  Caja 2 ").with_branch("b-1").validate().unwrap();
        assert_eq!(v.name, "Caja 2");
        assert_eq!(v.branch_id.as_deref(), Some("b-1"));
        assert_eq!(v.opening_balance, Money::zero());
        assert!(NewCashRegister::new("").validate().is_err());
        assert!(NewCashRegister::new("Caja 3")
            .with_opening_balance(m(-1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_changes_validation() {
        assert!(CashRegisterChanges::default().is_empty());
        let bad = CashRegisterChanges {
            opening_balance: Some(m(-5)),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let corrected = CashRegisterChanges {
            current_balance: Some(m(-5)),
            ..Default::default()
        };
        assert!(corrected.validate().is_ok());
    }
}
