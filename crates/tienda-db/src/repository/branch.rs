//! # Branch Repository
//!
//! Branches (sucursales) a cash register can be assigned to.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::types::normalize_reference_name;
use tienda_core::{Branch, TenantId};

pub(crate) const BRANCH: &str = "Branch";

/// Repository for branch database operations.
#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    /// Creates a new BranchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    pub async fn create(&self, tenant: &TenantId, name: &str) -> DbResult<Branch> {
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.to_string(),
            name: normalize_reference_name(name)?,
            created_at: Utc::now(),
        };

        debug!(tenant = %tenant, id = %branch.id, "Creating branch");

        sqlx::query("INSERT INTO branches (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&branch.id)
            .bind(&branch.tenant_id)
            .bind(&branch.name)
            .bind(branch.created_at)
            .execute(&self.pool)
            .await?;

        Ok(branch)
    }

    pub async fn get(&self, tenant: &TenantId, id: &str) -> DbResult<Branch> {
        sqlx::query_as::<_, Branch>(
            "SELECT id, tenant_id, name, created_at FROM branches WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(BRANCH, id))
    }

    pub async fn list(&self, tenant: &TenantId) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            "SELECT id, tenant_id, name, created_at FROM branches WHERE tenant_id = ?1 ORDER BY name, id",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }
}

/// Fails with NotFound unless the branch exists under the tenant.
pub(crate) async fn ensure_branch(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    id: &str,
) -> DbResult<()> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM branches WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    found
        .map(|_| ())
        .ok_or_else(|| DbError::not_found(BRANCH, id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use tienda_core::TenantId;

    #[tokio::test]
    async fn test_branches_are_tenant_scoped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let acme = TenantId::new("acme").unwrap();
        let other = TenantId::new("bodega").unwrap();

        let centro = db.branches().create(&acme, "Centro").await.unwrap();
        assert_eq!(db.branches().get(&acme, &centro.id).await.unwrap(), centro);
        assert!(db.branches().get(&other, &centro.id).await.unwrap_err().is_not_found());
        assert_eq!(db.branches().list(&acme).await.unwrap().len(), 1);
        assert!(db.branches().list(&other).await.unwrap().is_empty());
    }
}
