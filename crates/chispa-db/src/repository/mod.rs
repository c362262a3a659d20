//! Repository modules, one per aggregate.

pub mod invoice;
pub mod product;

pub use invoice::{InvoiceRepository, SalesSummary};
pub use product::ProductRepository;
