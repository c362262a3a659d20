//! # chispa-fiscal: Fiscal Authorization Boundary
//!
//! Types and the [`Authorizer`] trait for requesting invoice authorization
//! from the tax authority. An invoice may only be issued once the authority
//! returns an authorization code; a rejection or an unreachable service
//! aborts issuance.
//!
//! The trait is the seam for transports: production wires in an
//! implementation that talks to the authority's web service, tests and
//! development use [`StubAuthorizer`].

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod stub;

pub use stub::StubAuthorizer;

// =============================================================================
// Document Kinds
// =============================================================================

/// Fiscal document kind, with the authority's numeric code.
///
/// The kind determines how tax is broken out on the printed document; a
/// retail shop selling to final consumers issues kind B almost exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Invoice A, between registered companies.
    InvoiceA,
    /// Invoice B, to final consumers. The default for retail.
    InvoiceB,
    /// Invoice C, issued by small taxpayers.
    InvoiceC,
}

impl DocumentKind {
    /// The authority's numeric code for this kind.
    pub fn code(self) -> u16 {
        match self {
            DocumentKind::InvoiceA => 1,
            DocumentKind::InvoiceB => 6,
            DocumentKind::InvoiceC => 11,
        }
    }

    /// The single-letter label printed on the document.
    pub fn letter(self) -> char {
        match self {
            DocumentKind::InvoiceA => 'A',
            DocumentKind::InvoiceB => 'B',
            DocumentKind::InvoiceC => 'C',
        }
    }
}

impl Default for DocumentKind {
    fn default() -> Self {
        DocumentKind::InvoiceB
    }
}

// =============================================================================
// Customer Document
// =============================================================================

/// How the customer is identified towards the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerDocument {
    /// Identified by tax id (digits only, no hyphens).
    TaxId(String),
    /// Anonymous final consumer.
    Unidentified,
}

impl CustomerDocument {
    /// The authority's document-kind code: 80 for a tax id, 99 for an
    /// unidentified consumer.
    pub fn kind_code(&self) -> u16 {
        match self {
            CustomerDocument::TaxId(_) => 80,
            CustomerDocument::Unidentified => 99,
        }
    }

    /// The document number as transmitted; `"0"` when unidentified.
    pub fn number(&self) -> &str {
        match self {
            CustomerDocument::TaxId(id) => id,
            CustomerDocument::Unidentified => "0",
        }
    }
}

// =============================================================================
// Request and Outcome
// =============================================================================

/// A single-invoice authorization request.
///
/// Amounts are integer cents and must satisfy
/// `total_cents == net_cents + tax_cents`; the authority cross-checks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub point_of_sale: u16,
    /// The sequence part of the invoice number being authorized.
    pub sequence: u64,
    pub document_kind: DocumentKind,
    pub issue_date: NaiveDate,
    pub net_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub customer_document: CustomerDocument,
}

/// The authority's verdict on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    /// Authorization granted.
    Approved {
        /// The authorization code to print on the invoice.
        code: String,
        /// Last day the code is valid.
        expires_on: NaiveDate,
    },
    /// Authorization declined; the invoice must not be issued.
    Rejected {
        /// The authority's observation messages, possibly empty.
        reasons: Vec<String>,
    },
}

impl AuthorizationOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, AuthorizationOutcome::Approved { .. })
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A failure to obtain a verdict at all. A rejection is not an error; it is
/// an [`AuthorizationOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum FiscalError {
    /// The service could not be reached or did not answer in time.
    #[error("authorization service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something unintelligible.
    #[error("malformed response from authorization service: {0}")]
    MalformedResponse(String),
}

// =============================================================================
// Authorizer Trait
// =============================================================================

/// The authorization service seam.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Requests authorization for one invoice.
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, FiscalError>;

    /// The highest sequence the authority has on record for a point of
    /// sale and document kind, for implementations that track numbering
    /// on the authority side. The default reports no such tracking.
    async fn last_authorized_sequence(
        &self,
        _point_of_sale: u16,
        _document_kind: DocumentKind,
    ) -> Result<Option<u64>, FiscalError> {
        Ok(None)
    }
}
