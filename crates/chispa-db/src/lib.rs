//! # chispa-db: Database Layer
//!
//! All SQLite access for Chispa: connection pooling, embedded migrations
//! and the repositories over the product catalog and the invoice ledger.
//!
//! ## Architecture
//! ```text
//! Database (pool + config)
//!    ├─> ProductRepository   catalog CRUD, search, atomic stock decrement
//!    └─> InvoiceRepository   append-only ledger, number sequence, queries
//! ```
//!
//! Business rules live in `chispa-core`; this crate persists and retrieves.
//! Repositories are cheap to construct (they clone the pool handle), so the
//! [`Database`] accessors hand out fresh instances on every call.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{InvoiceRepository, ProductRepository, SalesSummary};
