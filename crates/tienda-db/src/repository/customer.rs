//! # Customer Repository
//!
//! Minimal customer rows: enough for quotations to prove their customer
//! belongs to the same tenant, and for list search to match customer names.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::types::{normalize_reference_name, search_key};
use tienda_core::{Customer, TenantId};

pub(crate) const CUSTOMER: &str = "Customer";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer for the tenant.
    pub async fn create(&self, tenant: &TenantId, name: &str) -> DbResult<Customer> {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.to_string(),
            name: normalize_reference_name(name)?,
            created_at: Utc::now(),
        };

        debug!(tenant = %tenant, id = %customer.id, "Creating customer");

        sqlx::query(
            "INSERT INTO customers (id, tenant_id, name, name_search, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(search_key(&customer.name))
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets one of the tenant's customers.
    pub async fn get(&self, tenant: &TenantId, id: &str) -> DbResult<Customer> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, tenant_id, name, created_at FROM customers WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(CUSTOMER, id))
    }

    /// Lists the tenant's customers by name.
    pub async fn list(&self, tenant: &TenantId) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT id, tenant_id, name, created_at FROM customers WHERE tenant_id = ?1 ORDER BY name, id",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }
}

/// Fails with NotFound unless the customer exists under the tenant.
pub(crate) async fn ensure_customer(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    id: &str,
) -> DbResult<()> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(DbError::not_found(CUSTOMER, id)),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use tienda_core::TenantId;

    #[tokio::test]
    async fn test_create_get_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let acme = TenantId::new("acme").unwrap();

        let ana = db.customers().create(&acme, "  Ana Pérez ").await.unwrap();
        assert_eq!(ana.name, "Ana Pérez");
        db.customers().create(&acme, "Bruno").await.unwrap();

        let fetched = db.customers().get(&acme, &ana.id).await.unwrap();
        assert_eq!(fetched, ana);

        let names: Vec<String> = db
            .customers()
            .list(&acme)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ana Pérez", "Bruno"]);
    }

    #[tokio::test]
    async fn test_other_tenant_sees_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let acme = TenantId::new("acme").unwrap();
        let other = TenantId::new("bodega").unwrap();

        let ana = db.customers().create(&acme, "Ana").await.unwrap();
        let err = db.customers().get(&other, &ana.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(db.customers().list(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let acme = TenantId::new("acme").unwrap();
        assert!(db.customers().create(&acme, "  ").await.is_err());
    }
}
