//! # tienda-db: Database Layer for the Tienda Ledger
//!
//! SQLite storage for document numbering, quotations and cash registers,
//! using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tienda Data Flow                                 │
//! │                                                                         │
//! │  Route handler (POST /{tenant}/cotizaciones)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tienda-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ SequenceAllocator  │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ QuotationRepo      │  │ 001_init   │  │   │
//! │  │   │ DbConfig      │    │ CashRegisterRepo   │  │            │  │   │
//! │  │   │               │    │ Customer/Branch    │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tienda_db::{Database, DbConfig};
//! use tienda_core::TenantId;
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//! let tenant = TenantId::new("acme")?;
//!
//! let quotation = db.quotations().create(&tenant, new_quotation).await?;
//! println!("{}", quotation.document_number); // COT-202503-0001
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{ConfigError, Database, DbConfig};

pub use repository::branch::BranchRepository;
pub use repository::cash_register::CashRegisterRepository;
pub use repository::customer::CustomerRepository;
pub use repository::quotation::{QuotationRepository, MAX_ALLOCATION_ATTEMPTS};
pub use repository::sequence::SequenceAllocator;
