//! # chispa-sales: Invoice Issuance Workflow
//!
//! The orchestration layer tying the catalog, the ledger, the fiscal
//! authority and the document renderer into one issuance operation.
//!
//! ```text
//! IssueInvoiceRequest
//!       │
//!       ▼
//! InvoiceIssuer::issue
//!   ├── validate + price the sale           chispa-core
//!   ├── reserve number, authorize, append   chispa-db / chispa-fiscal
//!   ├── reduce stock (warnings)             chispa-db
//!   └── render document (best effort)       InvoiceRenderer impl
//!       │
//!       ▼
//! IssuedInvoice
//! ```

pub mod config;
pub mod error;
pub mod issue;
pub mod render;

pub use config::{CompanyInfo, IssuanceConfig, Numbering};
pub use error::{IssueError, IssueResult};
pub use issue::{IssueInvoiceRequest, IssuedInvoice, InvoiceIssuer, LineInput, StockShortfall};
pub use render::{document_file_name, InvoiceRenderer, RenderError};
