//! # Shared Domain Types
//!
//! Identity and reference types used by every ledger component.
//!
//! ## Tenant Scoping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /acme/cotizaciones      ──► Tenant Gateway (web app) ──► TenantId     │
//! │                                                             │           │
//! │                                                             ▼           │
//! │  quotations().create(&tenant, …)   ← tenant is always the first arg    │
//! │  cash_registers().open(&tenant, …) ← never an optional filter          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (`document_number` on quotations)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{validate_id, validate_name, validate_search_query};
use crate::MAX_PAGE_SIZE;

// =============================================================================
// Tenant
// =============================================================================

/// Identifier of a tenant, already resolved and trusted by the caller.
///
/// Constructing one only checks that it is not blank; the core never looks
/// tenants up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validate_id("tenant_id", &id)?;
        Ok(TenantId(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Reference Rows
// =============================================================================

/// A tenant's customer. Quotations must reference one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A tenant's branch (sucursal). Cash registers may belong to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Validates the name of a new customer or branch and returns it trimmed.
pub fn normalize_reference_name(name: &str) -> Result<String, ValidationError> {
    validate_name(name)?;
    Ok(name.trim().to_string())
}

// =============================================================================
// Paging
// =============================================================================

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter, ignoring skip/take.
    pub total: i64,
}

/// Skip/take window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pagination {
    pub skip: u32,
    pub take: u32,
}

impl Pagination {
    /// Take is clamped to 1..=MAX_PAGE_SIZE.
    pub fn new(skip: u32, take: u32) -> Self {
        Pagination {
            skip,
            take: take.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            skip: 0,
            take: 20,
        }
    }
}

/// Normalizes a free-text search term: trimmed, `None` when blank.
pub fn normalize_search(search: Option<&str>) -> Result<Option<String>, ValidationError> {
    match search {
        None => Ok(None),
        Some(s) => {
            let s = validate_search_query(s)?;
            Ok(if s.is_empty() { None } else { Some(search_key(&s)) })
        }
    }
}

/// Case-folded form of searchable text. Stored next to customer names and
/// quotation notes, and applied to search terms, so `ÁLVAREZ` finds
/// `Álvarez`.
pub fn search_key(text: &str) -> String {
    text.to_lowercase()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_rejects_blank() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("   ").is_err());
        assert_eq!(TenantId::new("acme").unwrap().as_str(), "acme");
    }

    #[test]
    fn test_tenant_id_serializes_as_plain_string() {
        let tenant = TenantId::new("acme").unwrap();
        assert_eq!(serde_json::to_string(&tenant).unwrap(), "\"acme\"");
    }

    #[test]
    fn test_pagination_clamps_take() {
        assert_eq!(Pagination::new(0, 0).take, 1);
        assert_eq!(Pagination::new(0, 10_000).take, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(40, 20), Pagination { skip: 40, take: 20 });
    }

    #[test]
    fn test_normalize_search() {
        assert_eq!(normalize_search(None).unwrap(), None);
        assert_eq!(normalize_search(Some("   ")).unwrap(), None);
        assert_eq!(normalize_search(Some(" cot-2025 ")).unwrap(), Some("cot-2025".to_string()));
        assert!(normalize_search(Some(&"x".repeat(200))).is_err());
        assert_eq!(normalize_search(Some("NÚÑEZ")).unwrap(), Some("núñez".to_string()));
    }

    #[test]
    fn test_search_key_folds_accented_letters() {
        assert_eq!(search_key("Álvarez Núñez"), "álvarez núñez");
        assert_eq!(search_key("ÁLVAREZ"), search_key("álvarez"));
        assert_eq!(search_key("COT-202503-0001"), "cot-202503-0001");
    }
}
