//! # Document Rendering Seam
//!
//! The printable-document boundary. Issuance treats rendering as best
//! effort: the invoice is legally issued once it is in the ledger, and a
//! render failure only means the document must be produced again later.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::CompanyInfo;
use chispa_core::{Invoice, InvoiceItem};

/// File name for an invoice's document, derived from its fiscal number:
/// `0001-00000042` becomes `factura_0001_00000042.pdf`.
pub fn document_file_name(invoice_number: &str) -> String {
    format!("factura_{}.pdf", invoice_number.replace('-', "_"))
}

/// Rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not write document: {0}")]
    Io(#[from] std::io::Error),

    #[error("document rendering failed: {0}")]
    Failed(String),
}

/// Renders an issued invoice into a printable document and returns the
/// path it was written to.
///
/// Implementations receive ledger data only, so a document can always be
/// re-rendered from storage. Rendering is synchronous; it runs after the
/// issuance critical section and never holds the sequence lock.
pub trait InvoiceRenderer: Send + Sync {
    fn render(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
        company: &CompanyInfo,
    ) -> Result<PathBuf, RenderError>;
}
