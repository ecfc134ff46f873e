//! # Quotations
//!
//! Quotation (cotización) documents, their line items and the pure rules that
//! decide what a create or replace is allowed to write.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► pending ──┬──► approved                                    │
//! │                        ├──► rejected       any status may move to any   │
//! │                        ├──► converted      other status; nothing here   │
//! │                        └──► expired        restricts the graph          │
//! │                                                                         │
//! │   replace: scalar fields + optional full item set, one transaction      │
//! │   delete:  items, then document, one transaction (no soft delete)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{normalize_search, Pagination};
use crate::validation::{
    validate_id, validate_non_negative, validate_notes, validate_quantity, validate_totals,
    ValidationResult,
};

// =============================================================================
// Status
// =============================================================================

/// The status of a quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    /// Freshly created, waiting on the customer.
    #[default]
    Pending,
    Approved,
    Rejected,
    /// Turned into a sale upstream.
    Converted,
    /// Past `expires_at`.
    Expired,
}

impl QuotationStatus {
    pub const ALL: [QuotationStatus; 5] = [
        QuotationStatus::Pending,
        QuotationStatus::Approved,
        QuotationStatus::Rejected,
        QuotationStatus::Converted,
        QuotationStatus::Expired,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Pending => "pending",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Converted => "converted",
            QuotationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuotationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown status '{s}'"),
            })
    }
}

// =============================================================================
// Quotation
// =============================================================================

/// A quotation with its ordered line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quotation {
    pub id: String,
    pub tenant_id: String,
    /// `COT-YYYYMM-NNNN`, unique within the tenant.
    pub document_number: String,
    pub customer_id: String,
    pub status: QuotationStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Ordered by `position`.
    pub items: Vec<QuotationItem>,
}

impl Quotation {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Sum of the stored line subtotals.
    pub fn items_subtotal(&self) -> Money {
        self.items.iter().map(QuotationItem::subtotal).sum()
    }
}

/// One line of a quotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QuotationItem {
    pub id: String,
    pub quotation_id: String,
    /// 0-based order within the quotation.
    pub position: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit price.
    pub subtotal_cents: i64,
}

impl QuotationItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// A line item as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewQuotationItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewQuotationItem {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        NewQuotationItem {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }
}

/// A validated line ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedItem {
    pub position: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Validates a full item set and computes line subtotals.
///
/// Fails when the set is empty, a quantity is not positive, a price is
/// negative, or a subtotal overflows.
pub fn price_items(items: &[NewQuotationItem]) -> ValidationResult<Vec<PricedItem>> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            validate_id("product_id", &item.product_id)?;
            validate_quantity(item.quantity)?;
            validate_non_negative("unit_price", item.unit_price)?;

            let subtotal = item
                .unit_price
                .checked_mul_quantity(item.quantity)
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "line subtotal".to_string(),
                    min: 0,
                    max: i64::MAX,
                })?;

            Ok(PricedItem {
                position: position as i64,
                product_id: item.product_id.trim().to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal,
            })
        })
        .collect()
}

/// Sum of priced line subtotals, failing on overflow.
pub fn sum_items(items: &[PricedItem]) -> ValidationResult<Money> {
    items.iter().try_fold(Money::zero(), |acc, item| {
        acc.checked_add(item.subtotal)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "subtotal".to_string(),
                min: 0,
                max: i64::MAX,
            })
    })
}

/// Payload of a quotation creation.
///
/// Aggregates are caller-supplied and only checked for internal consistency
/// (`total = subtotal - discount`), not against the item sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewQuotation {
    pub customer_id: String,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub items: Vec<NewQuotationItem>,
    pub notes: Option<String>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A creation payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuotation {
    pub customer_id: String,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub items: Vec<PricedItem>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewQuotation {
    pub fn validate(&self) -> ValidationResult<ValidatedQuotation> {
        validate_id("customer_id", &self.customer_id)?;
        let items = price_items(&self.items)?;
        validate_totals(self.subtotal, self.discount, self.total)?;
        let notes = normalize_notes(self.notes.as_deref())?;

        Ok(ValidatedQuotation {
            customer_id: self.customer_id.trim().to_string(),
            subtotal: self.subtotal,
            discount: self.discount,
            total: self.total,
            items,
            notes,
            expires_at: self.expires_at,
        })
    }
}

/// Trims notes; blank notes are stored as NULL.
fn normalize_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(n) => {
            validate_notes(n)?;
            Ok(Some(n.to_string()))
        }
    }
}

/// Distinguishes "field absent" (`None`) from "field set to null"
/// (`Some(None)`) when deserializing a partial update.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Partial update of a quotation. Absent fields are left as they are.
///
/// `items`, when present, replaces the whole item set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotationChanges {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<QuotationStatus>,
    #[serde(default)]
    pub subtotal: Option<Money>,
    #[serde(default)]
    pub discount: Option<Money>,
    #[serde(default)]
    pub total: Option<Money>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub items: Option<Vec<NewQuotationItem>>,
}

/// The full row state a replace will write.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedQuotation {
    pub customer_id: String,
    pub status: QuotationStatus,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// `Some` when the item set is being replaced.
    pub items: Option<Vec<PricedItem>>,
}

impl QuotationChanges {
    /// Merges these changes over the stored quotation.
    ///
    /// ## Aggregate Rules
    /// - new items without a subtotal: subtotal = sum of the new lines
    /// - no explicit total: total = subtotal - discount
    /// - the merged aggregates must satisfy `validate_totals`
    pub fn merge_onto(&self, current: &Quotation) -> ValidationResult<MergedQuotation> {
        let items = match &self.items {
            Some(items) => Some(price_items(items)?),
            None => None,
        };

        let customer_id = match &self.customer_id {
            Some(id) => {
                validate_id("customer_id", id)?;
                id.trim().to_string()
            }
            None => current.customer_id.clone(),
        };

        let subtotal = match (self.subtotal, &items) {
            (Some(subtotal), _) => subtotal,
            (None, Some(priced)) => sum_items(priced)?,
            (None, None) => current.subtotal(),
        };
        let discount = self.discount.unwrap_or_else(|| current.discount());
        validate_non_negative("subtotal", subtotal)?;
        validate_non_negative("discount", discount)?;

        let total = match self.total {
            Some(total) => total,
            None => subtotal
                .checked_sub(discount)
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "total".to_string(),
                    min: 0,
                    max: i64::MAX,
                })?,
        };
        validate_totals(subtotal, discount, total)?;

        let notes = match &self.notes {
            Some(notes) => normalize_notes(notes.as_deref())?,
            None => current.notes.clone(),
        };

        Ok(MergedQuotation {
            customer_id,
            status: self.status.unwrap_or(current.status),
            subtotal,
            discount,
            total,
            notes,
            expires_at: self.expires_at.unwrap_or(current.expires_at),
            items,
        })
    }

    /// True when nothing would change.
    pub fn is_empty(&self) -> bool {
        *self == QuotationChanges::default()
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Filters for listing a tenant's quotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuotationFilter {
    /// Matches document number, notes or customer name.
    pub search: Option<String>,
    pub status: Option<QuotationStatus>,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl QuotationFilter {
    /// Returns the filter with a trimmed search term (or none) and a
    /// clamped page size.
    pub fn normalized(&self) -> ValidationResult<QuotationFilter> {
        Ok(QuotationFilter {
            search: normalize_search(self.search.as_deref())?,
            status: self.status,
            customer_id: self.customer_id.clone(),
            pagination: Pagination::new(self.pagination.skip, self.pagination.take),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn stored(subtotal: i64, discount: i64) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: "q-1".to_string(),
            tenant_id: "acme".to_string(),
            document_number: "COT-202503-0001".to_string(),
            customer_id: "c-1".to_string(),
            status: QuotationStatus::Pending,
            subtotal_cents: subtotal,
            discount_cents: discount,
            total_cents: subtotal - discount,
            notes: Some("entrega en obra".to_string()),
            expires_at: None,
            created_at: now,
            updated_at: now,
            items: vec![],
        }
    }

    fn payload(items: Vec<NewQuotationItem>) -> NewQuotation {
        NewQuotation {
            customer_id: "c-1".to_string(),
            subtotal: m(2000),
            discount: m(0),
            total: m(2000),
            items,
            notes: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in QuotationStatus::ALL {
            assert_eq!(status.as_str().parse::<QuotationStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<QuotationStatus>().is_err());
        assert_eq!(QuotationStatus::default(), QuotationStatus::Pending);
    }

    #[test]
    fn test_price_items_computes_line_subtotals() {
        let priced = price_items(&[
            NewQuotationItem::new("p-1", 2, m(1000)),
            NewQuotationItem::new("p-2", 3, m(0)),
        ])
        .unwrap();

        assert_eq!(priced[0].subtotal, m(2000));
        assert_eq!(priced[1].subtotal, m(0));
        assert_eq!(priced[1].position, 1);
        assert_eq!(sum_items(&priced).unwrap(), m(2000));
    }

    #[test]
    fn test_price_items_rejects_bad_lines() {
        assert!(matches!(
            price_items(&[]),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            price_items(&[NewQuotationItem::new("p-1", 0, m(10))]),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(price_items(&[NewQuotationItem::new("p-1", -1, m(10))]).is_err());
        assert!(price_items(&[NewQuotationItem::new("p-1", 1, m(-10))]).is_err());
        assert!(price_items(&[NewQuotationItem::new("", 1, m(10))]).is_err());
        assert!(price_items(&[NewQuotationItem::new("p-1", 2, m(i64::MAX))]).is_err());
    }

    #[test]
    fn test_new_quotation_validate() {
        let valid = payload(vec![NewQuotationItem::new("p-1", 2, m(1000))])
            .validate()
            .unwrap();
        assert_eq!(valid.items.len(), 1);
        assert_eq!(valid.total, m(2000));

        let mut wrong_total = payload(vec![NewQuotationItem::new("p-1", 2, m(1000))]);
        wrong_total.total = m(1999);
        assert!(matches!(
            wrong_total.validate(),
            Err(ValidationError::Mismatch { .. })
        ));

        assert!(payload(vec![]).validate().is_err());
    }

    #[test]
    fn test_blank_notes_are_dropped() {
        let mut p = payload(vec![NewQuotationItem::new("p-1", 2, m(1000))]);
        p.notes = Some("   ".to_string());
        assert_eq!(p.validate().unwrap().notes, None);
    }

    #[test]
    fn test_merge_recomputes_aggregates_from_new_items() {
        let current = stored(2000, 500);
        let changes = QuotationChanges {
            items: Some(vec![NewQuotationItem::new("p-9", 4, m(1000))]),
            ..Default::default()
        };

        let merged = changes.merge_onto(&current).unwrap();
        assert_eq!(merged.subtotal, m(4000));
        assert_eq!(merged.discount, m(500));
        assert_eq!(merged.total, m(3500));
        assert_eq!(merged.items.unwrap().len(), 1);
        assert_eq!(merged.notes.as_deref(), Some("entrega en obra"));
    }

    #[test]
    fn test_merge_keeps_caller_supplied_subtotal() {
        let current = stored(2000, 0);
        let changes = QuotationChanges {
            subtotal: Some(m(2500)),
            items: Some(vec![NewQuotationItem::new("p-9", 1, m(1000))]),
            ..Default::default()
        };
        let merged = changes.merge_onto(&current).unwrap();
        assert_eq!(merged.subtotal, m(2500));
        assert_eq!(merged.total, m(2500));
    }

    #[test]
    fn test_merge_rejects_inconsistent_total() {
        let current = stored(2000, 0);
        let changes = QuotationChanges {
            discount: Some(m(300)),
            total: Some(m(2000)),
            ..Default::default()
        };
        assert!(changes.merge_onto(&current).is_err());

        let too_much_discount = QuotationChanges {
            discount: Some(m(2500)),
            ..Default::default()
        };
        assert!(too_much_discount.merge_onto(&current).is_err());
    }

    #[test]
    fn test_merge_clears_notes_with_explicit_null() {
        let current = stored(2000, 0);
        let changes: QuotationChanges = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(changes.notes, Some(None));
        assert_eq!(changes.merge_onto(&current).unwrap().notes, None);

        let untouched: QuotationChanges = serde_json::from_str("{}").unwrap();
        assert!(untouched.is_empty());
        assert_eq!(
            untouched.merge_onto(&current).unwrap().notes.as_deref(),
            Some("entrega en obra")
        );
    }

    #[test]
    fn test_merge_rejects_empty_item_set() {
        let current = stored(2000, 0);
        let changes = QuotationChanges {
            items: Some(vec![]),
            ..Default::default()
        };
        assert!(changes.merge_onto(&current).is_err());
    }

    #[test]
    fn test_filter_normalization() {
        let filter = QuotationFilter {
            search: Some("  ".to_string()),
            pagination: Pagination { skip: 5, take: 0 },
            ..Default::default()
        };
        let normalized = filter.normalized().unwrap();
        assert_eq!(normalized.search, None);
        assert_eq!(normalized.pagination.take, 1);
        assert_eq!(normalized.pagination.skip, 5);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&QuotationStatus::Converted).unwrap(),
            "\"converted\""
        );
    }
}
