//! # Sequence Allocator
//!
//! Hands out `COT-YYYYMM-NNNN` numbers from a counter row per
//! (tenant, prefix, period).
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller's write transaction                                             │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │ INSERT INTO document_sequences … VALUES (…, 1 + max(issued))      │ │
//! │  │ ON CONFLICT DO UPDATE SET last_value = max(last_value, issued) + 1│ │
//! │  │ RETURNING last_value                    ← takes the write lock    │ │
//! │  ├───────────────────────────────────────────────────────────────────┤ │
//! │  │ INSERT INTO quotations (… document_number …)                      │ │
//! │  │ INSERT INTO quotation_items …                                     │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │  COMMIT   → number is used                                              │
//! │  ROLLBACK → counter goes back with it, no gap                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `issued` is the highest sequence already stored on documents for the key,
//! so a counter row that is missing or behind (imported data, manual edits)
//! never produces a duplicate. Deleting documents never lowers the counter.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tienda_core::{DocumentKind, DocumentNumber, Period, TenantId};

/// Allocates document numbers.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    /// Creates a new SequenceAllocator.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceAllocator { pool }
    }

    /// Reserves the next number for `kind` in the period containing `at`.
    ///
    /// Must run on the connection of the transaction that inserts the
    /// document, as its first statement; the reservation lives and dies
    /// with that transaction.
    pub async fn next_in(
        conn: &mut SqliteConnection,
        tenant: &TenantId,
        kind: DocumentKind,
        at: DateTime<Utc>,
    ) -> DbResult<DocumentNumber> {
        let period = Period::containing(at)?;
        let now = Utc::now();

        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (tenant_id, prefix, period, last_value, updated_at)
            VALUES (
                ?1, ?2, ?3,
                1 + COALESCE((
                    SELECT MAX(sequence_number) FROM quotations
                    WHERE tenant_id = ?1 AND sequence_prefix = ?2 AND sequence_period = ?3
                ), 0),
                ?4
            )
            ON CONFLICT (tenant_id, prefix, period) DO UPDATE SET
                last_value = MAX(document_sequences.last_value, excluded.last_value - 1) + 1,
                updated_at = excluded.updated_at
            RETURNING last_value
            "#,
        )
        .bind(tenant.as_str())
        .bind(kind.prefix())
        .bind(period.key())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        let number = to_number(kind, period, value)?;
        debug!(tenant = %tenant, number = %number, "Allocated document number");
        Ok(number)
    }

    /// The number the next creation in the period containing `at` would get,
    /// without reserving it.
    pub async fn peek(
        &self,
        tenant: &TenantId,
        kind: DocumentKind,
        at: DateTime<Utc>,
    ) -> DbResult<DocumentNumber> {
        let period = Period::containing(at)?;

        let value: i64 = sqlx::query_scalar(
            r#"
            SELECT 1 + MAX(
                COALESCE((
                    SELECT last_value FROM document_sequences
                    WHERE tenant_id = ?1 AND prefix = ?2 AND period = ?3
                ), 0),
                COALESCE((
                    SELECT MAX(sequence_number) FROM quotations
                    WHERE tenant_id = ?1 AND sequence_prefix = ?2 AND sequence_period = ?3
                ), 0)
            )
            "#,
        )
        .bind(tenant.as_str())
        .bind(kind.prefix())
        .bind(period.key())
        .fetch_one(&self.pool)
        .await?;

        to_number(kind, period, value)
    }
}

fn to_number(kind: DocumentKind, period: Period, value: i64) -> DbResult<DocumentNumber> {
    let sequence = u64::try_from(value)
        .map_err(|_| DbError::Internal(format!("negative sequence value {value}")))?;
    DocumentNumber::new(kind, period, sequence).map_err(|e| DbError::Internal(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
