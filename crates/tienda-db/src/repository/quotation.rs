//! # Quotation Repository
//!
//! Quotations and their line items, always written as one unit.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Quotation Writes                                  │
//! │                                                                         │
//! │  create()      BEGIN                                                   │
//! │                ├── counter upsert (write lock taken here)              │
//! │                ├── customer belongs to tenant?                         │
//! │                ├── INSERT quotations                                   │
//! │                └── INSERT quotation_items × n                          │
//! │                COMMIT   (collision / busy → retry, max 5 attempts)     │
//! │                                                                         │
//! │  replace()     BEGIN                                                   │
//! │                ├── UPDATE … SET updated_at  (claim row, write lock)    │
//! │                ├── merge changes over stored row                       │
//! │                ├── UPDATE quotations                                   │
//! │                └── DELETE + INSERT items (only when items supplied)    │
//! │                COMMIT   (any failure → previous row + items stay)      │
//! │                                                                         │
//! │  delete()      BEGIN ── DELETE items ── DELETE quotation ── COMMIT     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement filters on `tenant_id`. Items have no tenant column and
//! are only touched through a quotation id that was matched against the
//! tenant first.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::customer::ensure_customer;
use crate::repository::sequence::SequenceAllocator;
use tienda_core::quotation::{PricedItem, ValidatedQuotation};
use tienda_core::types::search_key;
use tienda_core::{
    DocumentKind, NewQuotation, Page, Quotation, QuotationChanges, QuotationFilter,
    QuotationItem, QuotationStatus, TenantId,
};

pub(crate) const QUOTATION: &str = "Quotation";

/// How many times a creation is attempted before giving up with
/// [`DbError::Consistency`].
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

const QUOTATION_COLUMNS: &str = "q.id, q.tenant_id, q.document_number, q.customer_id, q.status, \
     q.subtotal_cents, q.discount_cents, q.total_cents, q.notes, q.expires_at, \
     q.created_at, q.updated_at";

const ITEM_COLUMNS: &str =
    "id, quotation_id, position, product_id, quantity, unit_price_cents, subtotal_cents";

/// Shared WHERE clause of list and count.
///
/// ?1 tenant, ?2 status, ?3 customer, ?4 LIKE pattern over a case-folded
/// term.
const LIST_FILTER: &str = r#"
    FROM quotations q
    LEFT JOIN customers c ON c.id = q.customer_id AND c.tenant_id = q.tenant_id
    WHERE q.tenant_id = ?1
      AND (?2 IS NULL OR q.status = ?2)
      AND (?3 IS NULL OR q.customer_id = ?3)
      AND (
        ?4 IS NULL
        OR q.document_number LIKE ?4 ESCAPE '\'
        OR q.notes_search LIKE ?4 ESCAPE '\'
        OR c.name_search LIKE ?4 ESCAPE '\'
      )
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct QuotationRow {
    id: String,
    tenant_id: String,
    document_number: String,
    customer_id: String,
    status: QuotationStatus,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    notes: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuotationRow {
    fn with_items(self, items: Vec<QuotationItem>) -> Quotation {
        Quotation {
            id: self.id,
            tenant_id: self.tenant_id,
            document_number: self.document_number,
            customer_id: self.customer_id,
            status: self.status,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            total_cents: self.total_cents,
            notes: self.notes,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for quotation database operations.
#[derive(Debug, Clone)]
pub struct QuotationRepository {
    pool: SqlitePool,
}

impl QuotationRepository {
    /// Creates a new QuotationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QuotationRepository { pool }
    }

    /// Creates a pending quotation numbered in the current month.
    pub async fn create(&self, tenant: &TenantId, new: NewQuotation) -> DbResult<Quotation> {
        self.create_at(tenant, new, Utc::now()).await
    }

    /// Creates a pending quotation numbered in the month containing `at`.
    ///
    /// ## Errors
    /// - `Validation` - empty items, bad quantity/price, inconsistent totals
    /// - `NotFound` - customer is not the tenant's
    /// - `Consistency` - the number kept colliding; nothing was written
    pub async fn create_at(
        &self,
        tenant: &TenantId,
        new: NewQuotation,
        at: DateTime<Utc>,
    ) -> DbResult<Quotation> {
        let valid = new.validate()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_create(tenant, &valid, at).await {
                Ok(quotation) => {
                    info!(
                        tenant = %tenant,
                        id = %quotation.id,
                        number = %quotation.document_number,
                        "Quotation created"
                    );
                    return Ok(quotation);
                }
                Err(e) if is_allocation_race(&e) => {
                    if attempt >= MAX_ALLOCATION_ATTEMPTS {
                        warn!(tenant = %tenant, attempts = attempt, error = %e, "Giving up on document number");
                        return Err(DbError::Consistency { attempts: attempt });
                    }
                    warn!(tenant = %tenant, attempt, error = %e, "Document number race, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_create(
        &self,
        tenant: &TenantId,
        valid: &ValidatedQuotation,
        at: DateTime<Utc>,
    ) -> DbResult<Quotation> {
        let mut tx = self.pool.begin().await?;

        let number = SequenceAllocator::next_in(&mut tx, tenant, DocumentKind::Quotation, at).await?;
        ensure_customer(&mut tx, tenant, &valid.customer_id).await?;

        let id = Uuid::new_v4().to_string();
        let document_number = number.to_string();

        debug!(tenant = %tenant, id = %id, number = %document_number, "Inserting quotation");

        sqlx::query(
            r#"
            INSERT INTO quotations (
                id, tenant_id, document_number,
                sequence_prefix, sequence_period, sequence_number,
                customer_id, status,
                subtotal_cents, discount_cents, total_cents,
                notes, notes_search, expires_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6,
                ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?15
            )
            "#,
        )
        .bind(&id)
        .bind(tenant.as_str())
        .bind(&document_number)
        .bind(number.kind().prefix())
        .bind(number.period().key())
        .bind(number.sequence() as i64)
        .bind(&valid.customer_id)
        .bind(QuotationStatus::Pending)
        .bind(valid.subtotal.cents())
        .bind(valid.discount.cents())
        .bind(valid.total.cents())
        .bind(&valid.notes)
        .bind(valid.notes.as_deref().map(search_key))
        .bind(valid.expires_at)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let items = insert_items(&mut tx, &id, &valid.items).await?;

        tx.commit().await?;

        Ok(Quotation {
            id,
            tenant_id: tenant.to_string(),
            document_number,
            customer_id: valid.customer_id.clone(),
            status: QuotationStatus::Pending,
            subtotal_cents: valid.subtotal.cents(),
            discount_cents: valid.discount.cents(),
            total_cents: valid.total.cents(),
            notes: valid.notes.clone(),
            expires_at: valid.expires_at,
            created_at: at,
            updated_at: at,
            items,
        })
    }

    /// Updates the supplied fields; `changes.items`, when present, replaces
    /// the whole item set. All or nothing.
    pub async fn replace(
        &self,
        tenant: &TenantId,
        id: &str,
        changes: QuotationChanges,
    ) -> DbResult<Quotation> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        claim(&mut tx, tenant, id, now).await?;

        let current = load(&mut tx, tenant, id)
            .await?
            .ok_or_else(|| DbError::not_found(QUOTATION, id))?;
        let merged = changes.merge_onto(&current)?;

        if merged.customer_id != current.customer_id {
            ensure_customer(&mut tx, tenant, &merged.customer_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE quotations SET
                customer_id = ?1,
                status = ?2,
                subtotal_cents = ?3,
                discount_cents = ?4,
                total_cents = ?5,
                notes = ?6,
                notes_search = ?7,
                expires_at = ?8,
                updated_at = ?9
            WHERE id = ?10 AND tenant_id = ?11
            "#,
        )
        .bind(&merged.customer_id)
        .bind(merged.status)
        .bind(merged.subtotal.cents())
        .bind(merged.discount.cents())
        .bind(merged.total.cents())
        .bind(&merged.notes)
        .bind(merged.notes.as_deref().map(search_key))
        .bind(merged.expires_at)
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;

        if let Some(items) = &merged.items {
            sqlx::query("DELETE FROM quotation_items WHERE quotation_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, id, items).await?;
        }

        let updated = load(&mut tx, tenant, id)
            .await?
            .ok_or_else(|| DbError::not_found(QUOTATION, id))?;

        tx.commit().await?;

        info!(
            tenant = %tenant,
            id = %id,
            items_replaced = merged.items.is_some(),
            "Quotation replaced"
        );
        Ok(updated)
    }

    /// Sets the status. Any status may follow any other.
    pub async fn transition(
        &self,
        tenant: &TenantId,
        id: &str,
        status: QuotationStatus,
    ) -> DbResult<Quotation> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE quotations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4",
        )
        .bind(status)
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(QUOTATION, id));
        }

        let updated = load(&mut tx, tenant, id)
            .await?
            .ok_or_else(|| DbError::not_found(QUOTATION, id))?;

        tx.commit().await?;

        info!(tenant = %tenant, id = %id, status = %status, "Quotation status changed");
        Ok(updated)
    }

    /// Deletes the quotation and its items. The document number is not
    /// reused.
    pub async fn delete(&self, tenant: &TenantId, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM quotation_items
            WHERE quotation_id IN (SELECT id FROM quotations WHERE id = ?1 AND tenant_id = ?2)
            "#,
        )
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM quotations WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(QUOTATION, id));
        }

        tx.commit().await?;

        info!(tenant = %tenant, id = %id, "Quotation deleted");
        Ok(())
    }

    /// Gets a quotation with its items.
    pub async fn get(&self, tenant: &TenantId, id: &str) -> DbResult<Quotation> {
        // Read transaction so the row and its items come from one snapshot.
        let mut tx = self.pool.begin().await?;
        let quotation = load(&mut tx, tenant, id).await?;
        tx.commit().await?;

        quotation.ok_or_else(|| DbError::not_found(QUOTATION, id))
    }

    /// Lists the tenant's quotations, newest first.
    ///
    /// `search` matches document number, notes or customer name,
    /// case-insensitively.
    pub async fn list(&self, tenant: &TenantId, filter: &QuotationFilter) -> DbResult<Page<Quotation>> {
        let filter = filter.normalized()?;
        let pattern = filter.search.as_deref().map(like_pattern);

        let mut tx = self.pool.begin().await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {LIST_FILTER}"))
            .bind(tenant.as_str())
            .bind(filter.status)
            .bind(&filter.customer_id)
            .bind(&pattern)
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {QUOTATION_COLUMNS} {LIST_FILTER} \
             ORDER BY q.created_at DESC, q.document_number DESC \
             LIMIT ?5 OFFSET ?6"
        ))
        .bind(tenant.as_str())
        .bind(filter.status)
        .bind(&filter.customer_id)
        .bind(&pattern)
        .bind(i64::from(filter.pagination.take))
        .bind(i64::from(filter.pagination.skip))
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let mut items = load_items_for(&mut tx, &ids).await?;

        tx.commit().await?;

        debug!(tenant = %tenant, total, returned = rows.len(), "Listed quotations");

        let items = rows
            .into_iter()
            .map(|row| {
                let own = items.remove(&row.id).unwrap_or_default();
                row.with_items(own)
            })
            .collect();

        Ok(Page { items, total })
    }

    /// Moves pending quotations whose `expires_at` is before `now` to
    /// `expired`. Returns how many changed.
    pub async fn expire_overdue(&self, tenant: &TenantId, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE quotations SET status = ?1, updated_at = ?2
            WHERE tenant_id = ?3
              AND status = ?4
              AND expires_at IS NOT NULL
              AND expires_at < ?2
            "#,
        )
        .bind(QuotationStatus::Expired)
        .bind(now)
        .bind(tenant.as_str())
        .bind(QuotationStatus::Pending)
        .execute(&self.pool)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            info!(tenant = %tenant, expired, "Expired overdue quotations");
        }
        Ok(expired)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// A lost race for a document number: another writer committed the same
/// number first, or the database stayed locked.
fn is_allocation_race(err: &DbError) -> bool {
    err.is_unique_violation_on("document_number") || matches!(err, DbError::Busy(_))
}

/// Touches the row so the transaction holds the write lock before reading.
async fn claim(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE quotations SET updated_at = ?1 WHERE id = ?2 AND tenant_id = ?3")
        .bind(now)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(QUOTATION, id));
    }
    Ok(())
}

async fn load(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    id: &str,
) -> DbResult<Option<Quotation>> {
    let row = sqlx::query_as::<_, QuotationRow>(&format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotations q WHERE q.id = ?1 AND q.tenant_id = ?2"
    ))
    .bind(id)
    .bind(tenant.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, QuotationItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM quotation_items WHERE quotation_id = ?1 ORDER BY position"
    ))
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.with_items(items)))
}

/// Items of several quotations, grouped by quotation id, each in position
/// order.
async fn load_items_for(
    conn: &mut SqliteConnection,
    quotation_ids: &[&str],
) -> DbResult<HashMap<String, Vec<QuotationItem>>> {
    let mut grouped: HashMap<String, Vec<QuotationItem>> = HashMap::new();
    if quotation_ids.is_empty() {
        return Ok(grouped);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {ITEM_COLUMNS} FROM quotation_items WHERE quotation_id IN ("
    ));
    let mut separated = builder.separated(", ");
    for id in quotation_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY quotation_id, position");

    let items = builder
        .build_query_as::<QuotationItem>()
        .fetch_all(&mut *conn)
        .await?;

    for item in items {
        grouped.entry(item.quotation_id.clone()).or_default().push(item);
    }
    Ok(grouped)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    quotation_id: &str,
    items: &[PricedItem],
) -> DbResult<Vec<QuotationItem>> {
    let mut inserted = Vec::with_capacity(items.len());

    for item in items {
        let row = QuotationItem {
            id: Uuid::new_v4().to_string(),
            quotation_id: quotation_id.to_string(),
            position: item.position,
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            subtotal_cents: item.subtotal.cents(),
        };

        sqlx::query(
            r#"
            INSERT INTO quotation_items (
                id, quotation_id, position, product_id,
                quantity, unit_price_cents, subtotal_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&row.id)
        .bind(&row.quotation_id)
        .bind(row.position)
        .bind(&row.product_id)
        .bind(row.quantity)
        .bind(row.unit_price_cents)
        .bind(row.subtotal_cents)
        .execute(&mut *conn)
        .await?;

        inserted.push(row);
    }

    Ok(inserted)
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Unit Tests
// =============================================================================
