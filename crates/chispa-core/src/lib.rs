//! # chispa-core: Pure Business Logic
//!
//! The heart of Chispa: domain types, money arithmetic and validation
//! rules for a retail electrical-supplies shop, as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! UI / form layer (out of this workspace)
//!        │
//!        ▼
//! chispa-sales ── issuance workflow
//!        │
//!        ▼
//! ★ chispa-core (THIS CRATE) ★      chispa-db        chispa-fiscal
//!   types · money · validation      SQLite storage   authorizer boundary
//!
//!   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS
//! ```
//!
//! ## Modules
//! - [`types`] - domain types (Product, Invoice, InvoiceItem, ...)
//! - [`money`] - integer-cents money and basis-point tax rates
//! - [`number`] - fiscal invoice numbers (`PPPP-NNNNNNNN`)
//! - [`validation`] - catalog rules and the tax-id check digit
//! - [`error`] - typed validation errors

pub mod error;
pub mod money;
pub mod number;
pub mod types;
pub mod validation;

pub use error::{CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use number::InvoiceNumber;
pub use types::{
    Invoice, InvoiceItem, InvoiceStatus, NewInvoice, NewInvoiceItem, Product, ProductFields,
    TaxCategory,
};
