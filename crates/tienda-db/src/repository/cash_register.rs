//! # Cash Register Repository
//!
//! Persists the register state machine. Each transition is one conditional
//! `UPDATE`, so the state check and the write can't be split by another
//! writer.
//!
//! ## Transition Statements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open    UPDATE … SET is_open = 1, both balances = ?   WHERE is_open = 0│
//! │  close   UPDATE … SET is_open = 0                      WHERE is_open = 1│
//! │  adjust  UPDATE … SET current = current + ?            WHERE is_open = 1│
//! │  delete  DELETE …                                      WHERE is_open = 0│
//! │                                                                         │
//! │  0 rows ──► read row (tenant-scoped)                                    │
//! │             ├── missing    → NotFound                                   │
//! │             └── present    → CashRegister rule → Conflict (Spanish)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two concurrent opens: SQLite serializes the UPDATEs, the second sees
//! `is_open = 1`, matches nothing and reports "la caja ya está abierta".

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::branch::ensure_branch;
use tienda_core::register::CASH_REGISTER;
use tienda_core::validation::{validate_adjustment, validate_non_negative};
use tienda_core::{
    CashRegister, CashRegisterChanges, CoreResult, Money, NewCashRegister, RegisterState, TenantId,
};

const REGISTER_COLUMNS: &str = "id, tenant_id, branch_id, name, opening_balance_cents, \
     current_balance_cents, is_open, last_open_at, last_close_at, created_at, updated_at";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct CashRegisterRow {
    id: String,
    tenant_id: String,
    branch_id: Option<String>,
    name: String,
    opening_balance_cents: i64,
    current_balance_cents: i64,
    is_open: bool,
    last_open_at: Option<DateTime<Utc>>,
    last_close_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CashRegisterRow> for CashRegister {
    type Error = DbError;

    fn try_from(row: CashRegisterRow) -> Result<Self, Self::Error> {
        let state = RegisterState::from_columns(
            row.is_open,
            row.last_open_at,
            row.last_close_at,
            row.opening_balance_cents,
        )
        .ok_or_else(|| {
            DbError::Internal(format!(
                "cash register {} is open without an open timestamp",
                row.id
            ))
        })?;

        Ok(CashRegister {
            id: row.id,
            tenant_id: row.tenant_id,
            branch_id: row.branch_id,
            name: row.name,
            opening_balance_cents: row.opening_balance_cents,
            current_balance_cents: row.current_balance_cents,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cash register database operations.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    /// Creates a new CashRegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    /// Registers a closed cash register with
    /// `current_balance = opening_balance`.
    ///
    /// `NotFound` when the branch isn't the tenant's.
    pub async fn create(&self, tenant: &TenantId, new: NewCashRegister) -> DbResult<CashRegister> {
        let valid = new.validate()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(tenant = %tenant, id = %id, name = %valid.name, "Creating cash register");

        // The branch check rides in the INSERT so it can't go stale.
        let row = sqlx::query_as::<_, CashRegisterRow>(&format!(
            r#"
            INSERT INTO cash_registers (
                id, tenant_id, branch_id, name,
                opening_balance_cents, current_balance_cents,
                is_open, last_open_at, last_close_at, created_at, updated_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?5, 0, NULL, NULL, ?6, ?6
            WHERE ?3 IS NULL
               OR EXISTS (SELECT 1 FROM branches WHERE id = ?3 AND tenant_id = ?2)
            RETURNING {REGISTER_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(tenant.as_str())
        .bind(&valid.branch_id)
        .bind(&valid.name)
        .bind(valid.opening_balance.cents())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                info!(tenant = %tenant, id = %id, "Cash register created");
                row.try_into()
            }
            None => Err(DbError::not_found(
                "Branch",
                valid.branch_id.unwrap_or_default(),
            )),
        }
    }

    /// Opens a closed register; both balances become `amount`.
    pub async fn open(&self, tenant: &TenantId, id: &str, amount: Money) -> DbResult<CashRegister> {
        validate_non_negative("amount", amount)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CashRegisterRow>(&format!(
            r#"
            UPDATE cash_registers SET
                is_open = 1,
                opening_balance_cents = ?1,
                current_balance_cents = ?1,
                last_open_at = ?2,
                updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4 AND is_open = 0
            RETURNING {REGISTER_COLUMNS}
            "#
        ))
        .bind(amount.cents())
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current = load_required(&mut tx, tenant, id).await?;
            return Err(rule_violation(current.open(amount, now)));
        };

        let register = CashRegister::try_from(row)?;
        tx.commit().await?;

        info!(tenant = %tenant, id = %id, amount = %amount, "Cash register opened");
        Ok(register)
    }

    /// Closes an open register. Balances stay as they are.
    pub async fn close(&self, tenant: &TenantId, id: &str) -> DbResult<CashRegister> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CashRegisterRow>(&format!(
            r#"
            UPDATE cash_registers SET
                is_open = 0,
                last_close_at = ?1,
                updated_at = ?1
            WHERE id = ?2 AND tenant_id = ?3 AND is_open = 1
            RETURNING {REGISTER_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current = load_required(&mut tx, tenant, id).await?;
            return Err(rule_violation(current.close(now)));
        };

        let register = CashRegister::try_from(row)?;
        tx.commit().await?;

        info!(
            tenant = %tenant,
            id = %id,
            balance = %register.current_balance(),
            "Cash register closed"
        );
        Ok(register)
    }

    /// Adds `delta` (either sign, never zero) to the current balance of an
    /// open register.
    ///
    /// The increment happens in SQL, so concurrent adjustments commute.
    pub async fn adjust_balance(
        &self,
        tenant: &TenantId,
        id: &str,
        delta: Money,
    ) -> DbResult<CashRegister> {
        validate_adjustment(delta)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CashRegisterRow>(&format!(
            r#"
            UPDATE cash_registers SET
                current_balance_cents = current_balance_cents + ?1,
                updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4 AND is_open = 1
            RETURNING {REGISTER_COLUMNS}
            "#
        ))
        .bind(delta.cents())
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current = load_required(&mut tx, tenant, id).await?;
            return Err(rule_violation(current.adjust(delta, now)));
        };

        let register = CashRegister::try_from(row)?;
        tx.commit().await?;

        debug!(
            tenant = %tenant,
            id = %id,
            delta = %delta,
            balance = %register.current_balance(),
            "Cash register balance adjusted"
        );
        Ok(register)
    }

    /// Deletes a closed register.
    pub async fn delete(&self, tenant: &TenantId, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM cash_registers WHERE id = ?1 AND tenant_id = ?2 AND is_open = 0")
                .bind(id)
                .bind(tenant.as_str())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            let current = load_required(&mut tx, tenant, id).await?;
            return Err(rule_violation(current.ensure_deletable()));
        }

        tx.commit().await?;

        info!(tenant = %tenant, id = %id, "Cash register deleted");
        Ok(())
    }

    /// Administrative edit: name, branch and balance corrections, applied
    /// regardless of the open flag.
    pub async fn update(
        &self,
        tenant: &TenantId,
        id: &str,
        changes: CashRegisterChanges,
    ) -> DbResult<CashRegister> {
        let changes = changes.validate()?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let claimed =
            sqlx::query("UPDATE cash_registers SET updated_at = ?1 WHERE id = ?2 AND tenant_id = ?3")
                .bind(now)
                .bind(id)
                .bind(tenant.as_str())
                .execute(&mut *tx)
                .await?;
        if claimed.rows_affected() == 0 {
            return Err(DbError::not_found(CASH_REGISTER, id));
        }

        let current = load_required(&mut tx, tenant, id).await?;

        if let Some(Some(branch_id)) = &changes.branch_id {
            ensure_branch(&mut tx, tenant, branch_id).await?;
        }

        let name = changes.name.unwrap_or(current.name);
        let branch_id = changes.branch_id.unwrap_or(current.branch_id);
        let opening = changes
            .opening_balance
            .map_or(current.opening_balance_cents, |m| m.cents());
        let balance = changes
            .current_balance
            .map_or(current.current_balance_cents, |m| m.cents());

        let row = sqlx::query_as::<_, CashRegisterRow>(&format!(
            r#"
            UPDATE cash_registers SET
                name = ?1,
                branch_id = ?2,
                opening_balance_cents = ?3,
                current_balance_cents = ?4,
                updated_at = ?5
            WHERE id = ?6 AND tenant_id = ?7
            RETURNING {REGISTER_COLUMNS}
            "#
        ))
        .bind(&name)
        .bind(&branch_id)
        .bind(opening)
        .bind(balance)
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let register = CashRegister::try_from(row)?;
        tx.commit().await?;

        info!(tenant = %tenant, id = %id, "Cash register updated");
        Ok(register)
    }

    /// Gets one of the tenant's registers.
    pub async fn get(&self, tenant: &TenantId, id: &str) -> DbResult<CashRegister> {
        let mut conn = self.pool.acquire().await?;
        load_required(&mut conn, tenant, id).await
    }

    /// Lists the tenant's registers, optionally only those of one branch.
    pub async fn list(&self, tenant: &TenantId, branch_id: Option<&str>) -> DbResult<Vec<CashRegister>> {
        let rows = sqlx::query_as::<_, CashRegisterRow>(&format!(
            r#"
            SELECT {REGISTER_COLUMNS} FROM cash_registers
            WHERE tenant_id = ?1 AND (?2 IS NULL OR branch_id = ?2)
            ORDER BY name, id
            "#
        ))
        .bind(tenant.as_str())
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CashRegister::try_from).collect()
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_required(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    id: &str,
) -> DbResult<CashRegister> {
    let row = sqlx::query_as::<_, CashRegisterRow>(&format!(
        "SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE id = ?1 AND tenant_id = ?2"
    ))
    .bind(id)
    .bind(tenant.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => row.try_into(),
        None => Err(DbError::not_found(CASH_REGISTER, id)),
    }
}

/// Error for a conditional statement that matched nothing on an existing row.
/// The core rule names the conflict. If the rule accepts, the row is corrupt.
fn rule_violation<T>(outcome: CoreResult<T>) -> DbError {
    match outcome {
        Err(e) => e.into(),
        Ok(_) => DbError::Internal("register state changed during transition".to_string()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
