//! # Repository Module
//!
//! Database repository implementations for the Tienda ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories                                         │
//! │                                                                         │
//! │  Route handler                                                         │
//! │       │                                                                 │
//! │       │  db.quotations().create(&tenant, new)                          │
//! │       ▼                                                                 │
//! │  QuotationRepository ──► SequenceAllocator::next_in (same transaction) │
//! │  CashRegisterRepository                                                │
//! │  CustomerRepository / BranchRepository (reference rows)                │
//! │       │                                                                 │
//! │       │  SQL, always `WHERE tenant_id = ?`                             │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every public method takes `&TenantId` first. A row of another tenant is
//! reported exactly like a missing row.

pub mod branch;
pub mod cash_register;
pub mod customer;
pub mod quotation;
pub mod sequence;
