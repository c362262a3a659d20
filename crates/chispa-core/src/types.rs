//! # Domain Types
//!
//! Core domain types for the catalog and the invoice ledger.
//!
//! ## Snapshot pattern
//! An [`InvoiceItem`] copies the product's descriptive fields (name, brand,
//! unit price) at the moment of sale instead of pointing at the live catalog
//! row. Historic invoices therefore stay accurate even if the product is
//! later renamed, repriced or deleted.
//!
//! ## Dual identity
//! - products carry a fixed-length numeric business code chosen by the shop
//! - invoices carry a database surrogate id plus the fiscal
//!   `PPPP-NNNNNNNN` number

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
///
/// `quantity` never goes negative; it is mutated only by explicit catalog
/// operations or by the stock decrement that follows an authorized sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Fixed-length numeric business code, immutable once created.
    pub id: String,

    /// Display name shown in the catalog and on invoices.
    pub name: String,

    /// Manufacturer brand, free text.
    pub brand: String,

    /// Purchase cost in cents (may embed tax at the purchase rate).
    pub cost_cents: i64,

    /// Price charged to customers, in cents.
    pub sale_price_cents: i64,

    /// Units on hand.
    pub quantity: i64,
}

impl Product {
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }
}

/// Mutable product fields for catalog updates.
///
/// The id is deliberately absent: it addresses the row and can never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    pub name: String,
    pub brand: String,
    pub cost_cents: i64,
    pub sale_price_cents: i64,
    pub quantity: i64,
}

impl ProductFields {
    /// The fields of an existing product, for read-modify-write updates.
    pub fn from_product(product: &Product) -> Self {
        ProductFields {
            name: product.name.clone(),
            brand: product.brand.clone(),
            cost_cents: product.cost_cents,
            sale_price_cents: product.sale_price_cents,
            quantity: product.quantity,
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Status of a ledger invoice.
///
/// Issuance is all-or-nothing, so in practice only `Authorized` rows are
/// ever written; `Rejected` exists for completeness of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// The fiscal authority granted an authorization code.
    Authorized,
    /// The fiscal authority declined the invoice.
    Rejected,
}

// =============================================================================
// Customer Tax Category
// =============================================================================

/// The customer's standing with the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TaxCategory {
    /// Unregistered end consumer; the default when no tax id is supplied.
    FinalConsumer,
    /// VAT-registered company.
    RegisteredCompany,
    /// Simplified small-taxpayer regime.
    SmallTaxpayer,
    /// Exempt entity.
    Exempt,
}

impl Default for TaxCategory {
    fn default() -> Self {
        TaxCategory::FinalConsumer
    }
}

impl fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaxCategory::FinalConsumer => "Final Consumer",
            TaxCategory::RegisteredCompany => "Registered Company",
            TaxCategory::SmallTaxpayer => "Small Taxpayer",
            TaxCategory::Exempt => "Exempt",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An issued invoice as stored in the ledger.
///
/// Rows are append-only: once written with an authorization code they are
/// never updated or deleted (deleting one administratively cascades to its
/// items, which have no life of their own).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    /// Surrogate key (database rowid).
    pub id: i64,

    /// Fiscal number, `PPPP-NNNNNNNN`, globally unique.
    pub invoice_number: String,

    pub issue_date: NaiveDate,

    /// Authorization code granted by the fiscal authority.
    pub authorization_code: Option<String>,

    /// Date the authorization code expires.
    pub authorization_expiry: Option<NaiveDate>,

    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub customer_address: Option<String>,
    pub customer_tax_category: TaxCategory,

    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,

    pub status: InvoiceStatus,

    pub created_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// An invoice header about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub invoice_number: crate::number::InvoiceNumber,
    pub issue_date: NaiveDate,
    pub authorization_code: Option<String>,
    pub authorization_expiry: Option<NaiveDate>,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub customer_address: Option<String>,
    pub customer_tax_category: TaxCategory,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoice Line Item
// =============================================================================

/// A line item of a stored invoice. Created atomically with its parent
/// invoice and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,

    /// Informational reference to the catalog; survives product deletion.
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Brand at time of sale (frozen).
    pub product_brand: String,

    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// `quantity * unit_price_cents`.
    pub subtotal_cents: i64,
}

impl InvoiceItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A line item about to be written together with its invoice header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoiceItem {
    pub product_id: String,
    pub product_name: String,
    pub product_brand: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl NewInvoiceItem {
    /// Snapshots a product into a line item.
    pub fn snapshot(product: &Product, quantity: i64, unit_price: Money) -> Self {
        NewInvoiceItem {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            product_brand: product.brand.clone(),
            quantity,
            unit_price_cents: unit_price.cents(),
            subtotal_cents: unit_price.multiply_quantity(quantity).cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
