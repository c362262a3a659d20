//! # Issuance Error Types
//!
//! The workflow-level error taxonomy. Callers branch on these to decide
//! what to tell the cashier: fix the input, retry later, or stop and check
//! the ledger by hand.

use thiserror::Error;

use chispa_core::ValidationError;
use chispa_db::DbError;

/// Why an issuance attempt produced no invoice.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The request was malformed before any side effect.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A requested product is not in the catalog.
    #[error("product not found: {id}")]
    ProductNotFound { id: String },

    /// Not enough stock for a line, detected before contacting the
    /// authority.
    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The authority declined the invoice. Nothing was persisted.
    #[error("authorization rejected: {}", reasons.join("; "))]
    Rejected { reasons: Vec<String> },

    /// The authority could not be reached or did not answer in time.
    /// Nothing was persisted; the attempt can be retried as-is.
    #[error("authorization service unavailable: {0}")]
    AuthorizerUnavailable(String),

    /// A storage failure.
    #[error(transparent)]
    Persistence(#[from] DbError),

    /// Document rendering failed on an explicit render request. During
    /// issuance rendering is best effort and never surfaces here.
    #[error(transparent)]
    Render(#[from] crate::render::RenderError),

    /// An authorization code was granted but the ledger append failed.
    /// The code exists at the authority without a matching local invoice;
    /// operator reconciliation is required.
    #[error(
        "authorization {authorization_code} granted for {invoice_number} but the ledger write failed: {source}"
    )]
    InconsistentState {
        invoice_number: String,
        authorization_code: String,
        source: DbError,
    },
}

impl IssueError {
    /// True when retrying the same request later may succeed without any
    /// manual intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IssueError::AuthorizerUnavailable(_)
                | IssueError::Persistence(DbError::PoolExhausted)
                | IssueError::Persistence(DbError::ConnectionFailed(_))
        )
    }
}

/// Result type for issuance operations.
pub type IssueResult<T> = Result<T, IssueError>;
