//! # tienda-core: Pure Ledger Rules for Tienda
//!
//! The commerce ledger of the Tienda multi-tenant sales app, minus the I/O.
//! Every rule that decides what may be written lives here as a pure function.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tienda Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Web app (tenant gateway, route handlers)           │   │
//! │  │    resolves /{tenant}/… ──► TenantId, parses JSON bodies        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tienda-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ numbering │  │ quotation │  │ register  │  │ validation│  │   │
//! │  │   │  Period   │  │ Quotation │  │ CashReg.  │  │   rules   │  │   │
//! │  │   │ DocNumber │  │ Changes   │  │ State     │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tienda-db (Database Layer)                   │   │
//! │  │     sequence counter, transactions, conditional updates         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`numbering`] - Document kinds, periods and `COT-YYYYMM-NNNN` numbers
//! - [`quotation`] - Quotations, items, create/replace payloads
//! - [`register`] - Cash register state machine
//! - [`types`] - Tenant id, reference rows, paging
//! - [`money`] - Integer-cents money
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tienda_core::numbering::{DocumentKind, DocumentNumber, Period};
//!
//! let at = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
//! let number = DocumentNumber::new(DocumentKind::Quotation, Period::containing(at).unwrap(), 1).unwrap();
//! assert_eq!(number.to_string(), "COT-202503-0001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod numbering;
pub mod quotation;
pub mod register;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use numbering::{DocumentKind, DocumentNumber, Period};
pub use quotation::{
    NewQuotation, NewQuotationItem, Quotation, QuotationChanges, QuotationFilter, QuotationItem,
    QuotationStatus,
};
pub use register::{CashRegister, CashRegisterChanges, NewCashRegister, RegisterState};
pub use types::{Branch, Customer, Page, Pagination, TenantId};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest page a listing returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest accepted search term, in characters.
pub const MAX_SEARCH_LEN: usize = 100;

/// Longest register, customer or branch name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Longest quotation notes, in characters.
pub const MAX_NOTES_LEN: usize = 2000;
