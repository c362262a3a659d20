//! # Invoice Repository
//!
//! Append-only invoice ledger plus the per-point-of-sale number sequence.
//!
//! ## Numbering
//! The next number is derived from the ledger itself: the highest stored
//! sequence for the point of sale, plus one. There is no separate counter
//! table to drift out of sync, and the UNIQUE constraint on
//! `invoice_number` backstops any race.
//!
//! ## Append-only
//! Invoices are written once, header and items in a single transaction, and
//! never updated. Every other method here only reads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use chispa_core::{Invoice, InvoiceItem, InvoiceNumber, NewInvoice, NewInvoiceItem};

// =============================================================================
// Summary DTO
// =============================================================================

/// Aggregate figures over authorized invoices in a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub invoice_count: i64,
    pub total_cents: i64,
    /// Half-up rounded average per invoice; zero when the range is empty.
    pub average_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the invoice ledger.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// The next invoice number for a point of sale.
    ///
    /// Scans stored numbers with the matching prefix and takes the highest
    /// sequence plus one. An empty ledger starts at `PPPP-00000001`.
    pub async fn next_number(&self, point_of_sale: u16) -> DbResult<InvoiceNumber> {
        let prefix = InvoiceNumber::prefix(point_of_sale);
        let pattern = format!("{prefix}%");

        let max_sequence: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(substr(invoice_number, -8) AS INTEGER))
            FROM invoices
            WHERE invoice_number LIKE ?1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let number = match max_sequence {
            Some(max) if max > 0 => InvoiceNumber::new(point_of_sale, max as u64 + 1)
                .map_err(|e| DbError::Internal(e.to_string()))?,
            _ => InvoiceNumber::first(point_of_sale),
        };

        debug!(point_of_sale, number = %number, "next invoice number");
        Ok(number)
    }

    /// Appends an invoice and its items in one transaction.
    ///
    /// Either the header and every item land together or nothing does.
    /// Returns the new invoice's surrogate id.
    pub async fn append(&self, invoice: &NewInvoice, items: &[NewInvoiceItem]) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_number, issue_date,
                authorization_code, authorization_expiry,
                customer_name, customer_tax_id, customer_address, customer_tax_category,
                subtotal_cents, tax_cents, total_cents,
                status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(invoice.invoice_number.to_string())
        .bind(invoice.issue_date)
        .bind(&invoice.authorization_code)
        .bind(invoice.authorization_expiry)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_tax_id)
        .bind(&invoice.customer_address)
        .bind(invoice.customer_tax_category)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.total_cents)
        .bind(invoice.status)
        .bind(invoice.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("invoice number", invoice.invoice_number.to_string())
            }
            other => other,
        })?;

        let invoice_id = result.last_insert_rowid();

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    invoice_id, product_id, product_name, product_brand,
                    quantity, unit_price_cents, subtotal_cents
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(invoice_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(&item.product_brand)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            invoice_id,
            number = %invoice.invoice_number,
            items = items.len(),
            total_cents = invoice.total_cents,
            "invoice appended to ledger"
        );
        Ok(invoice_id)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, invoice_number, issue_date,
                   authorization_code, authorization_expiry,
                   customer_name, customer_tax_id, customer_address, customer_tax_category,
                   subtotal_cents, tax_cents, total_cents,
                   status, created_at
            FROM invoices
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, invoice_number, issue_date,
                   authorization_code, authorization_expiry,
                   customer_name, customer_tax_id, customer_address, customer_tax_category,
                   subtotal_cents, tax_cents, total_cents,
                   status, created_at
            FROM invoices
            WHERE invoice_number = ?1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Line items of an invoice, in insertion order.
    pub async fn get_items(&self, invoice_id: i64) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, product_id, product_name, product_brand,
                   quantity, unit_price_cents, subtotal_cents
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Most recently created invoices first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, invoice_number, issue_date,
                   authorization_code, authorization_expiry,
                   customer_name, customer_tax_id, customer_address, customer_tax_category,
                   subtotal_cents, tax_cents, total_cents,
                   status, created_at
            FROM invoices
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Substring search over invoice number and customer name.
    pub async fn search(&self, term: &str) -> DbResult<Vec<Invoice>> {
        let pattern = format!("%{}%", term.trim());

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, invoice_number, issue_date,
                   authorization_code, authorization_expiry,
                   customer_name, customer_tax_id, customer_address, customer_tax_category,
                   subtotal_cents, tax_cents, total_cents,
                   status, created_at
            FROM invoices
            WHERE invoice_number LIKE ?1 OR customer_name LIKE ?1
            ORDER BY issue_date DESC, id DESC
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        debug!(term = %term, count = invoices.len(), "invoice search");
        Ok(invoices)
    }

    /// Invoices issued within `[start, end]`, both inclusive.
    pub async fn list_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, invoice_number, issue_date,
                   authorization_code, authorization_expiry,
                   customer_name, customer_tax_id, customer_address, customer_tax_category,
                   subtotal_cents, tax_cents, total_cents,
                   status, created_at
            FROM invoices
            WHERE issue_date >= ?1 AND issue_date <= ?2
            ORDER BY issue_date DESC, id DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Count and revenue totals over authorized invoices, optionally
    /// restricted to a date range.
    pub async fn summary(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> DbResult<SalesSummary> {
        let (count, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_cents), 0)
            FROM invoices
            WHERE status = 'authorized'
              AND (?1 IS NULL OR issue_date >= ?1)
              AND (?2 IS NULL OR issue_date <= ?2)
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        // half-up, all values non-negative
        let average_cents = if count > 0 {
            (total + count / 2) / count
        } else {
            0
        };

        Ok(SalesSummary {
            invoice_count: count,
            total_cents: total,
            average_cents,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
