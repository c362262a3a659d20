//! # Invoice Issuance
//!
//! The issuance workflow, end to end:
//!
//! ```text
//! validate request
//!   └─> load products, check stock, compute totals     (no side effects)
//!         └─> [lock] reserve number ─> authorize ─> append [unlock]
//!               └─> decrement stock (warnings only)
//!                     └─> render document (best effort)
//! ```
//!
//! ## Atomicity
//! The ledger append is the point of no return. Everything before it can
//! fail without leaving a trace; everything after it (stock, rendering) is
//! best effort and reported as warnings on the result. A failure between
//! authorization and append is the one genuinely bad outcome and gets its
//! own error variant for operator reconciliation.
//!
//! ## Serialization
//! A number is reserved by reading the ledger, then only becomes used when
//! the invoice is appended. The mutex makes reserve-authorize-append
//! mutually exclusive so concurrent sales cannot reserve the same number;
//! the UNIQUE constraint on the stored number backstops the invariant.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use chispa_core::money::Money;
use chispa_core::validation::{self, MAX_LINE_QUANTITY, MAX_NAME_LENGTH, MAX_PRICE_CENTS};
use chispa_core::{
    InvoiceNumber, InvoiceStatus, NewInvoice, NewInvoiceItem, Product, TaxCategory,
    ValidationError,
};
use std::collections::HashMap;
use chispa_db::{Database, DbError};
use chispa_fiscal::{AuthorizationOutcome, AuthorizationRequest, Authorizer, CustomerDocument};

use crate::config::{CompanyInfo, IssuanceConfig, Numbering};
use crate::error::{IssueError, IssueResult};
use crate::render::InvoiceRenderer;

// =============================================================================
// Request DTOs
// =============================================================================

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: String,
    pub quantity: i64,
    /// Price actually charged per unit; the catalog price when absent.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

/// A request to issue an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IssueInvoiceRequest {
    /// Required; a blank name rejects the request before any side effect.
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_tax_id: Option<String>,
    #[serde(default)]
    pub customer_address: Option<String>,
    #[serde(default)]
    pub customer_tax_category: TaxCategory,
    pub lines: Vec<LineInput>,
    /// Today when absent.
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
}

// =============================================================================
// Result DTOs
// =============================================================================

/// A stock decrement that could not be applied after the invoice was
/// already in the ledger. The invoice stands; the catalog needs manual
/// correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product_id: String,
    pub requested: i64,
    /// Units actually on hand, if the product still exists.
    pub available: Option<i64>,
}

/// A successfully issued invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedInvoice {
    pub invoice_id: i64,
    pub invoice_number: String,
    pub authorization_code: String,
    pub authorization_expiry: NaiveDate,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Where the rendered document landed, when rendering succeeded.
    pub document_path: Option<PathBuf>,
    /// Why rendering failed, when it did.
    pub render_error: Option<String>,
    /// Stock decrements that could not be applied.
    pub stock_shortfalls: Vec<StockShortfall>,
}

// =============================================================================
// Issuer
// =============================================================================

/// The issuance orchestrator.
///
/// Holds the database handle, the authorizer and renderer seams, and the
/// mutex serializing number reservation. One instance per process; cheap
/// to share behind an `Arc`.
pub struct InvoiceIssuer {
    db: Database,
    authorizer: Arc<dyn Authorizer>,
    renderer: Arc<dyn InvoiceRenderer>,
    company: CompanyInfo,
    config: IssuanceConfig,
    sequence_lock: Mutex<()>,
}

impl InvoiceIssuer {
    pub fn new(
        db: Database,
        authorizer: Arc<dyn Authorizer>,
        renderer: Arc<dyn InvoiceRenderer>,
        company: CompanyInfo,
        config: IssuanceConfig,
    ) -> Self {
        InvoiceIssuer {
            db,
            authorizer,
            renderer,
            company,
            config,
            sequence_lock: Mutex::new(()),
        }
    }

    /// Issues an invoice for the given sale.
    ///
    /// On success the invoice is in the ledger with its authorization code;
    /// stock and rendering problems are reported on the result, never as
    /// errors. On any error nothing was persisted, except for
    /// [`IssueError::InconsistentState`], which names the authorization
    /// code that exists at the authority without a local invoice.
    pub async fn issue(&self, request: IssueInvoiceRequest) -> IssueResult<IssuedInvoice> {
        let customer = validate_request(&request)?;
        let issue_date = request.issue_date.unwrap_or_else(|| Utc::now().date_naive());

        // Load products and build the line snapshots. Read-only; a stock
        // or catalog problem here aborts before the authority hears of it.
        // Stock is compared against the total requested per product, so a
        // sale split across several lines of one product cannot slip past.
        let products = self.db.products();
        let mut requested_totals: Vec<(String, i64)> = Vec::new();
        for line in &request.lines {
            match requested_totals
                .iter_mut()
                .find(|(id, _)| *id == line.product_id)
            {
                Some((_, total)) => *total += line.quantity,
                None => requested_totals.push((line.product_id.clone(), line.quantity)),
            }
        }

        let mut catalog: HashMap<String, Product> = HashMap::new();
        for (product_id, requested) in &requested_totals {
            let product = products
                .get_by_id(product_id)
                .await?
                .ok_or_else(|| IssueError::ProductNotFound {
                    id: product_id.clone(),
                })?;

            if product.quantity < *requested {
                return Err(IssueError::InsufficientStock {
                    product_id: product.id,
                    available: product.quantity,
                    requested: *requested,
                });
            }
            catalog.insert(product_id.clone(), product);
        }

        let mut items: Vec<NewInvoiceItem> = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = &catalog[&line.product_id];
            let unit_price = match line.unit_price_cents {
                Some(cents) => Money::from_cents(cents),
                None => product.sale_price(),
            };
            items.push(NewInvoiceItem::snapshot(product, line.quantity, unit_price));
        }

        let subtotal: Money = items
            .iter()
            .map(|item| Money::from_cents(item.subtotal_cents))
            .sum();
        let tax = subtotal.calculate_tax(self.config.tax_rate());
        let total = subtotal + tax;

        debug!(
            subtotal_cents = subtotal.cents(),
            tax_cents = tax.cents(),
            total_cents = total.cents(),
            lines = items.len(),
            "sale computed"
        );

        // Critical section: the reserved number stays ours until the
        // append commits or the attempt dies.
        let invoice_id;
        let number;
        let authorization_code;
        let authorization_expiry;
        {
            let _guard = self.sequence_lock.lock().await;

            number = self.reserve_number().await?;

            let outcome = self
                .call_authorizer(&AuthorizationRequest {
                    point_of_sale: number.point_of_sale(),
                    sequence: number.sequence(),
                    document_kind: self.config.document_kind,
                    issue_date,
                    net_cents: subtotal.cents(),
                    tax_cents: tax.cents(),
                    total_cents: total.cents(),
                    customer_document: customer.document.clone(),
                })
                .await?;

            let (code, expires_on) = match outcome {
                AuthorizationOutcome::Approved { code, expires_on } => (code, expires_on),
                AuthorizationOutcome::Rejected { reasons } => {
                    info!(number = %number, ?reasons, "authorization rejected");
                    return Err(IssueError::Rejected { reasons });
                }
            };

            let new_invoice = NewInvoice {
                invoice_number: number,
                issue_date,
                authorization_code: Some(code.clone()),
                authorization_expiry: Some(expires_on),
                customer_name: customer.name.clone(),
                customer_tax_id: customer.formatted_tax_id.clone(),
                customer_address: request.customer_address.clone(),
                customer_tax_category: request.customer_tax_category,
                subtotal_cents: subtotal.cents(),
                tax_cents: tax.cents(),
                total_cents: total.cents(),
                status: InvoiceStatus::Authorized,
                created_at: Utc::now(),
            };

            invoice_id = self
                .db
                .invoices()
                .append(&new_invoice, &items)
                .await
                .map_err(|source| {
                    error!(
                        number = %number,
                        authorization_code = %code,
                        error = %source,
                        "ledger write failed after authorization was granted"
                    );
                    IssueError::InconsistentState {
                        invoice_number: number.to_string(),
                        authorization_code: code.clone(),
                        source,
                    }
                })?;

            authorization_code = code;
            authorization_expiry = expires_on;
        }

        info!(
            invoice_id,
            number = %number,
            total_cents = total.cents(),
            "invoice issued"
        );

        // Stock reduction after the point of no return, one decrement per
        // product with its aggregated quantity. Failures do not touch the
        // invoice.
        let mut stock_shortfalls = Vec::new();
        for (product_id, quantity) in &requested_totals {
            match products.decrement_quantity(product_id, *quantity).await {
                Ok(()) => {}
                Err(DbError::InsufficientStock {
                    product_id,
                    available,
                    requested,
                }) => {
                    warn!(product_id = %product_id, available, requested, "stock shortfall after issuance");
                    stock_shortfalls.push(StockShortfall {
                        product_id,
                        requested,
                        available: Some(available),
                    });
                }
                Err(err) => {
                    warn!(product_id = %product_id, error = %err, "stock decrement failed after issuance");
                    stock_shortfalls.push(StockShortfall {
                        product_id: product_id.clone(),
                        requested: *quantity,
                        available: None,
                    });
                }
            }
        }

        // Best-effort rendering, from ledger data so a retry needs nothing
        // from this request.
        let (document_path, render_error) = match self.render_from_ledger(invoice_id).await {
            Ok(path) => (Some(path), None),
            Err(err) => {
                warn!(invoice_id, error = %err, "document rendering failed");
                (None, Some(err.to_string()))
            }
        };

        Ok(IssuedInvoice {
            invoice_id,
            invoice_number: number.to_string(),
            authorization_code,
            authorization_expiry,
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
            document_path,
            render_error,
            stock_shortfalls,
        })
    }

    /// The number the next issued invoice will carry. Informational; the
    /// reservation proper happens inside [`issue`](Self::issue).
    pub async fn next_invoice_number(&self) -> IssueResult<InvoiceNumber> {
        let _guard = self.sequence_lock.lock().await;
        self.reserve_number().await
    }

    /// Renders (or re-renders) the document for a stored invoice.
    pub async fn render_document(&self, invoice_id: i64) -> IssueResult<PathBuf> {
        self.render_from_ledger(invoice_id).await
    }

    async fn reserve_number(&self) -> IssueResult<InvoiceNumber> {
        match self.config.numbering {
            Numbering::Local => Ok(self
                .db
                .invoices()
                .next_number(self.config.point_of_sale)
                .await?),
            Numbering::Authority => {
                let last = self
                    .authorizer
                    .last_authorized_sequence(self.config.point_of_sale, self.config.document_kind)
                    .await
                    .map_err(|e| IssueError::AuthorizerUnavailable(e.to_string()))?;
                match last {
                    Some(sequence) => {
                        InvoiceNumber::new(self.config.point_of_sale, sequence + 1)
                            .map_err(IssueError::Validation)
                    }
                    None => Err(IssueError::AuthorizerUnavailable(
                        "authority does not track invoice numbering".to_string(),
                    )),
                }
            }
        }
    }

    async fn call_authorizer(
        &self,
        request: &AuthorizationRequest,
    ) -> IssueResult<AuthorizationOutcome> {
        let call = self.authorizer.authorize(request);
        match tokio::time::timeout(self.config.authorizer_timeout, call).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(IssueError::AuthorizerUnavailable(err.to_string())),
            Err(_) => Err(IssueError::AuthorizerUnavailable(format!(
                "no answer within {:?}",
                self.config.authorizer_timeout
            ))),
        }
    }

    async fn render_from_ledger(&self, invoice_id: i64) -> IssueResult<PathBuf> {
        let invoices = self.db.invoices();
        let invoice = invoices
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("invoice", invoice_id.to_string()))?;
        let items = invoices.get_items(invoice_id).await?;

        Ok(self.renderer.render(&invoice, &items, &self.company)?)
    }
}

// =============================================================================
// Validation
// =============================================================================

struct NormalizedCustomer {
    name: String,
    /// `XX-XXXXXXXX-X` for storage.
    formatted_tax_id: Option<String>,
    document: CustomerDocument,
}

fn validate_request(request: &IssueInvoiceRequest) -> Result<NormalizedCustomer, IssueError> {
    if request.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }

    for line in &request.lines {
        validation::validate_product_id(&line.product_id)?;

        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }

        if let Some(cents) = line.unit_price_cents {
            if cents <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "unit_price".to_string(),
                }
                .into());
            }
            if cents > MAX_PRICE_CENTS {
                return Err(ValidationError::OutOfRange {
                    field: "unit_price".to_string(),
                    min: 1,
                    max: MAX_PRICE_CENTS,
                }
                .into());
            }
        }
    }

    let name = request.customer_name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "customer_name".to_string(),
        }
        .into());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "customer_name".to_string(),
            max: MAX_NAME_LENGTH,
        }
        .into());
    }
    let name = name.to_string();

    let raw_tax_id = request.customer_tax_id.as_deref().unwrap_or("");
    if !validation::is_valid_tax_id(raw_tax_id) {
        return Err(ValidationError::InvalidFormat {
            field: "customer_tax_id".to_string(),
            reason: "check digit mismatch".to_string(),
        }
        .into());
    }

    let digits: String = raw_tax_id.chars().filter(|c| c.is_ascii_digit()).collect();
    let (formatted_tax_id, document) = if digits.is_empty() {
        (None, CustomerDocument::Unidentified)
    } else {
        (
            Some(validation::format_tax_id(&digits)),
            CustomerDocument::TaxId(digits),
        )
    };

    Ok(NormalizedCustomer {
        name,
        formatted_tax_id,
        document,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{document_file_name, RenderError};
    use async_trait::async_trait;
    use chispa_core::{Invoice, InvoiceItem, Product};
    use chispa_db::DbConfig;
    use chispa_fiscal::{DocumentKind, FiscalError, StubAuthorizer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // -------------------------------------------------------------------------
    // Test doubles
    // -------------------------------------------------------------------------

    /// Renderer that pretends to write and returns the would-be path.
    struct PathRenderer;

    impl InvoiceRenderer for PathRenderer {
        fn render(
            &self,
            invoice: &Invoice,
            _items: &[InvoiceItem],
            _company: &CompanyInfo,
        ) -> Result<PathBuf, RenderError> {
            Ok(PathBuf::from("/tmp").join(document_file_name(&invoice.invoice_number)))
        }
    }

    /// Renderer that always fails.
    struct BrokenRenderer;

    impl InvoiceRenderer for BrokenRenderer {
        fn render(
            &self,
            _invoice: &Invoice,
            _items: &[InvoiceItem],
            _company: &CompanyInfo,
        ) -> Result<PathBuf, RenderError> {
            Err(RenderError::Failed("printer on fire".to_string()))
        }
    }

    /// Counts authorize calls, then delegates to the approving stub.
    struct CountingAuthorizer {
        calls: AtomicUsize,
        inner: StubAuthorizer,
    }

    impl CountingAuthorizer {
        fn new() -> Arc<Self> {
            Arc::new(CountingAuthorizer {
                calls: AtomicUsize::new(0),
                inner: StubAuthorizer::approving(),
            })
        }
    }

    #[async_trait]
    impl Authorizer for CountingAuthorizer {
        async fn authorize(
            &self,
            request: &AuthorizationRequest,
        ) -> Result<AuthorizationOutcome, FiscalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.authorize(request).await
        }
    }

    /// Approves, but only after a long pause.
    struct SlowAuthorizer;

    #[async_trait]
    impl Authorizer for SlowAuthorizer {
        async fn authorize(
            &self,
            request: &AuthorizationRequest,
        ) -> Result<AuthorizationOutcome, FiscalError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StubAuthorizer::approving().authorize(request).await
        }
    }

    /// Authority that tracks numbering on its side.
    struct TrackingAuthorizer {
        last: Option<u64>,
    }

    #[async_trait]
    impl Authorizer for TrackingAuthorizer {
        async fn authorize(
            &self,
            request: &AuthorizationRequest,
        ) -> Result<AuthorizationOutcome, FiscalError> {
            StubAuthorizer::approving().authorize(request).await
        }

        async fn last_authorized_sequence(
            &self,
            _point_of_sale: u16,
            _document_kind: DocumentKind,
        ) -> Result<Option<u64>, FiscalError> {
            Ok(self.last)
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn led_panel() -> Product {
        Product {
            id: "1001".to_string(),
            name: "LED panel 18W".to_string(),
            brand: "Sica".to_string(),
            cost_cents: 40_000,
            sale_price_cents: 65_000,
            quantity: 5,
        }
    }

    async fn seeded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&led_panel()).await.unwrap();
        db
    }

    fn issuer_with(db: Database, authorizer: Arc<dyn Authorizer>) -> InvoiceIssuer {
        issuer_with_renderer(db, authorizer, Arc::new(PathRenderer))
    }

    fn issuer_with_renderer(
        db: Database,
        authorizer: Arc<dyn Authorizer>,
        renderer: Arc<dyn InvoiceRenderer>,
    ) -> InvoiceIssuer {
        InvoiceIssuer::new(
            db,
            authorizer,
            renderer,
            CompanyInfo::default(),
            IssuanceConfig::default(),
        )
    }

    fn sale_of(quantity: i64) -> IssueInvoiceRequest {
        IssueInvoiceRequest {
            customer_name: "Consumidor Final".to_string(),
            lines: vec![LineInput {
                product_id: "1001".to_string(),
                quantity,
                unit_price_cents: None,
            }],
            ..Default::default()
        }
    }

    fn split_sale(quantities: &[i64]) -> IssueInvoiceRequest {
        IssueInvoiceRequest {
            customer_name: "Consumidor Final".to_string(),
            lines: quantities
                .iter()
                .map(|&quantity| LineInput {
                    product_id: "1001".to_string(),
                    quantity,
                    unit_price_cents: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    // -------------------------------------------------------------------------
    // Happy path
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn issues_invoice_and_reduces_stock() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::approving()));

        let issued = issuer.issue(sale_of(3)).await.unwrap();

        assert_eq!(issued.invoice_number, "0001-00000001");
        assert_eq!(issued.authorization_code, "75319266109747");
        assert_eq!(issued.subtotal_cents, 195_000);
        assert_eq!(issued.tax_cents, 40_950);
        assert_eq!(issued.total_cents, 235_950);
        assert!(issued.stock_shortfalls.is_empty());
        assert!(issued.render_error.is_none());
        assert_eq!(
            issued.document_path.as_deref(),
            Some(std::path::Path::new("/tmp/factura_0001_00000001.pdf"))
        );

        // ledger row and items
        let stored = db.invoices().get_by_id(issued.invoice_id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Authorized);
        assert_eq!(stored.customer_name, "Consumidor Final");
        let items = db.invoices().get_items(issued.invoice_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "LED panel 18W");

        // stock went 5 -> 2
        let product = db.products().get_by_id("1001").await.unwrap().unwrap();
        assert_eq!(product.quantity, 2);
    }

    #[tokio::test]
    async fn identified_customer_is_stored_formatted() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::approving()));

        let mut request = sale_of(1);
        request.customer_name = "Electricidad Norte".to_string();
        request.customer_tax_id = Some("20445515559".to_string());
        request.customer_tax_category = TaxCategory::RegisteredCompany;

        let issued = issuer.issue(request).await.unwrap();

        let stored = db.invoices().get_by_id(issued.invoice_id).await.unwrap().unwrap();
        assert_eq!(stored.customer_name, "Electricidad Norte");
        assert_eq!(stored.customer_tax_id.as_deref(), Some("20-44551555-9"));
        assert_eq!(stored.customer_tax_category, TaxCategory::RegisteredCompany);
    }

    #[tokio::test]
    async fn unit_price_override_is_honored() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::approving()));

        let mut request = sale_of(2);
        request.lines[0].unit_price_cents = Some(60_000);

        let issued = issuer.issue(request).await.unwrap();
        assert_eq!(issued.subtotal_cents, 120_000);

        let items = db.invoices().get_items(issued.invoice_id).await.unwrap();
        assert_eq!(items[0].unit_price_cents, 60_000);
    }

    #[tokio::test]
    async fn sequential_numbers() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::approving()));

        for expected in ["0001-00000001", "0001-00000002", "0001-00000003"] {
            let issued = issuer.issue(sale_of(1)).await.unwrap();
            assert_eq!(issued.invoice_number, expected);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_issuance_gets_distinct_numbers() {
        let db = seeded_db().await;
        let issuer = Arc::new(issuer_with(db, Arc::new(StubAuthorizer::approving())));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let issuer = issuer.clone();
            handles.push(tokio::spawn(async move {
                issuer.issue(sale_of(1)).await.unwrap().invoice_number
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort();
        assert_eq!(numbers, vec!["0001-00000001", "0001-00000002", "0001-00000003"]);
    }

    // -------------------------------------------------------------------------
    // Failure before the authority
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn insufficient_stock_fails_before_authorizer() {
        let db = seeded_db().await;
        let authorizer = CountingAuthorizer::new();
        let issuer = issuer_with(db.clone(), authorizer.clone());

        let err = issuer.issue(sale_of(6)).await.unwrap_err();
        match err {
            IssueError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other}"),
        }

        // the authority never heard about it and nothing was written
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());
        assert_eq!(db.products().get_by_id("1001").await.unwrap().unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn split_lines_of_one_product_fail_before_authorizer() {
        let db = seeded_db().await;
        let authorizer = CountingAuthorizer::new();
        let issuer = issuer_with(db.clone(), authorizer.clone());

        // 3 + 3 of the same product against stock 5: the totals per
        // product are what counts, not each line on its own
        let err = issuer.issue(split_sale(&[3, 3])).await.unwrap_err();
        match err {
            IssueError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, "1001");
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());
        assert_eq!(db.products().get_by_id("1001").await.unwrap().unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn split_lines_within_stock_decrement_the_total() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::approving()));

        let issued = issuer.issue(split_sale(&[2, 2])).await.unwrap();
        assert!(issued.stock_shortfalls.is_empty());

        // two line items on the invoice, one aggregated decrement
        let items = db.invoices().get_items(issued.invoice_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(db.products().get_by_id("1001").await.unwrap().unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn unknown_product_fails() {
        let db = seeded_db().await;
        let issuer = issuer_with(db, Arc::new(StubAuthorizer::approving()));

        let mut request = sale_of(1);
        request.lines[0].product_id = "9999".to_string();

        let err = issuer.issue(request).await.unwrap_err();
        assert!(matches!(err, IssueError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn validation_failures() {
        let db = seeded_db().await;
        let issuer = issuer_with(db, Arc::new(StubAuthorizer::approving()));

        // no lines
        let err = issuer.issue(IssueInvoiceRequest::default()).await.unwrap_err();
        assert!(matches!(
            err,
            IssueError::Validation(ValidationError::Required { .. })
        ));

        // zero quantity
        let err = issuer.issue(sale_of(0)).await.unwrap_err();
        assert!(matches!(
            err,
            IssueError::Validation(ValidationError::MustBePositive { .. })
        ));

        // absurd quantity, rejected before any multiplication
        let err = issuer.issue(sale_of(i64::MAX / 100)).await.unwrap_err();
        assert!(matches!(
            err,
            IssueError::Validation(ValidationError::OutOfRange { .. })
        ));

        // bad tax id check digit
        let mut request = sale_of(1);
        request.customer_tax_id = Some("20445515550".to_string());
        let err = issuer.issue(request).await.unwrap_err();
        assert!(matches!(
            err,
            IssueError::Validation(ValidationError::InvalidFormat { .. })
        ));

        // negative price override
        let mut request = sale_of(1);
        request.lines[0].unit_price_cents = Some(-100);
        let err = issuer.issue(request).await.unwrap_err();
        assert!(matches!(
            err,
            IssueError::Validation(ValidationError::MustBePositive { .. })
        ));
    }

    #[tokio::test]
    async fn blank_customer_name_is_rejected() {
        let db = seeded_db().await;
        let authorizer = CountingAuthorizer::new();
        let issuer = issuer_with(db.clone(), authorizer.clone());

        for blank in ["", "   "] {
            let mut request = sale_of(1);
            request.customer_name = blank.to_string();
            let err = issuer.issue(request).await.unwrap_err();
            match err {
                IssueError::Validation(ValidationError::Required { field }) => {
                    assert_eq!(field, "customer_name");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        // nothing happened: no authorizer call, no ledger entry, no stock
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());
        assert_eq!(db.products().get_by_id("1001").await.unwrap().unwrap().quantity, 5);
    }

    // -------------------------------------------------------------------------
    // Authority failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn rejection_persists_nothing_and_keeps_the_number() {
        let db = seeded_db().await;
        let issuer = issuer_with(
            db.clone(),
            Arc::new(StubAuthorizer::rejecting(vec!["totals mismatch".to_string()])),
        );

        let err = issuer.issue(sale_of(1)).await.unwrap_err();
        match err {
            IssueError::Rejected { reasons } => {
                assert_eq!(reasons, vec!["totals mismatch".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());
        assert_eq!(db.products().get_by_id("1001").await.unwrap().unwrap().quantity, 5);

        // the un-issued number is reused by the next attempt
        let retry = issuer_with(db, Arc::new(StubAuthorizer::approving()));
        let issued = retry.issue(sale_of(1)).await.unwrap();
        assert_eq!(issued.invoice_number, "0001-00000001");
    }

    #[tokio::test]
    async fn unavailable_authority_is_retryable() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::unavailable()));

        let err = issuer.issue(sale_of(1)).await.unwrap_err();
        assert!(matches!(err, IssueError::AuthorizerUnavailable(_)));
        assert!(err.is_retryable());
        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_authority_times_out() {
        let db = seeded_db().await;
        let mut config = IssuanceConfig::default();
        config.authorizer_timeout = Duration::from_millis(20);

        let issuer = InvoiceIssuer::new(
            db,
            Arc::new(SlowAuthorizer),
            Arc::new(PathRenderer),
            CompanyInfo::default(),
            config,
        );

        let err = issuer.issue(sale_of(1)).await.unwrap_err();
        assert!(matches!(err, IssueError::AuthorizerUnavailable(_)));
    }

    // -------------------------------------------------------------------------
    // Numbering from the authority
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn authority_numbering_continues_their_sequence() {
        let db = seeded_db().await;
        let mut config = IssuanceConfig::default();
        config.numbering = Numbering::Authority;

        let issuer = InvoiceIssuer::new(
            db,
            Arc::new(TrackingAuthorizer { last: Some(41) }),
            Arc::new(PathRenderer),
            CompanyInfo::default(),
            config,
        );

        let issued = issuer.issue(sale_of(1)).await.unwrap();
        assert_eq!(issued.invoice_number, "0001-00000042");
    }

    #[tokio::test]
    async fn authority_numbering_without_tracking_fails() {
        let db = seeded_db().await;
        let mut config = IssuanceConfig::default();
        config.numbering = Numbering::Authority;

        let issuer = InvoiceIssuer::new(
            db.clone(),
            Arc::new(TrackingAuthorizer { last: None }),
            Arc::new(PathRenderer),
            CompanyInfo::default(),
            config,
        );

        let err = issuer.issue(sale_of(1)).await.unwrap_err();
        assert!(matches!(err, IssueError::AuthorizerUnavailable(_)));
        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());
    }

    // -------------------------------------------------------------------------
    // After the point of no return
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn render_failure_does_not_fail_issuance() {
        let db = seeded_db().await;
        let issuer = issuer_with_renderer(
            db.clone(),
            Arc::new(StubAuthorizer::approving()),
            Arc::new(BrokenRenderer),
        );

        let issued = issuer.issue(sale_of(1)).await.unwrap();
        assert!(issued.document_path.is_none());
        assert!(issued.render_error.as_deref().unwrap().contains("printer on fire"));

        // the invoice stands regardless
        assert!(db.invoices().get_by_id(issued.invoice_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ledger_failure_after_authorization_is_inconsistent_state() {
        let db = seeded_db().await;
        let issuer = issuer_with(db.clone(), Arc::new(StubAuthorizer::approving()));

        // break the ledger between authorization and append
        sqlx::query("DROP TABLE invoice_items")
            .execute(db.pool())
            .await
            .unwrap();

        let err = issuer.issue(sale_of(1)).await.unwrap_err();
        match err {
            IssueError::InconsistentState {
                invoice_number,
                authorization_code,
                ..
            } => {
                assert_eq!(invoice_number, "0001-00000001");
                assert_eq!(authorization_code, "75319266109747");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // -------------------------------------------------------------------------
    // DTOs
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn issued_invoice_serializes() {
        let db = seeded_db().await;
        let issuer = issuer_with(db, Arc::new(StubAuthorizer::approving()));

        let issued = issuer.issue(sale_of(3)).await.unwrap();
        let json = serde_json::to_value(&issued).unwrap();

        assert_eq!(json["invoice_number"], "0001-00000001");
        assert_eq!(json["total_cents"], 235_950);
        assert_eq!(json["authorization_code"], "75319266109747");
    }

    #[tokio::test]
    async fn next_number_peek() {
        let db = seeded_db().await;
        let issuer = issuer_with(db, Arc::new(StubAuthorizer::approving()));

        let peeked = issuer.next_invoice_number().await.unwrap();
        assert_eq!(peeked.to_string(), "0001-00000001");

        issuer.issue(sale_of(1)).await.unwrap();
        let peeked = issuer.next_invoice_number().await.unwrap();
        assert_eq!(peeked.to_string(), "0001-00000002");
    }
}
