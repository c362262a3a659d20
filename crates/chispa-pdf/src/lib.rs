//! # chispa-pdf: PDF Document Renderer
//!
//! Renders a ledger invoice into a single-page A4 PDF with the built-in
//! Helvetica fonts, so no font files ship with the binary. Layout is a
//! plain top-to-bottom flow: company header, invoice identification,
//! customer block, item table, totals and the authorization footer.
//!
//! Everything printed comes from the stored invoice and its item
//! snapshots, so a document can be reproduced at any time, even after the
//! catalog changed.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use chispa_core::{Invoice, InvoiceItem};
use chispa_sales::{document_file_name, CompanyInfo, InvoiceRenderer, RenderError};

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_MM: f64 = 15.0;
const LINE_HEIGHT_MM: f64 = 6.0;

/// The printpdf-backed renderer. Writes documents into a fixed output
/// directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    output_dir: PathBuf,
}

impl PdfRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        PdfRenderer {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl InvoiceRenderer for PdfRenderer {
    fn render(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
        company: &CompanyInfo,
    ) -> Result<PathBuf, RenderError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(document_file_name(&invoice.invoice_number));

        debug!(number = %invoice.invoice_number, path = %path.display(), "rendering invoice document");

        let (doc, page, layer) = PdfDocument::new(
            format!("Factura {}", invoice.invoice_number),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "contenido",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Failed(e.to_string()))?;

        let layer = doc.get_page(page).get_layer(layer);
        let mut cursor = Cursor::new(&layer, &regular, &bold);

        // company header
        cursor.heading(&company.name, 16.0);
        cursor.line(&company.address);
        cursor.line(&format!("CUIT: {}", company.tax_id));
        cursor.line(&company.tax_standing);
        cursor.gap();

        // invoice identification
        cursor.heading(&format!("FACTURA {}", invoice.invoice_number), 14.0);
        cursor.line(&format!("Fecha: {}", invoice.issue_date.format("%d/%m/%Y")));
        cursor.gap();

        // customer block
        cursor.bold_line(&format!("Cliente: {}", invoice.customer_name));
        if let Some(tax_id) = &invoice.customer_tax_id {
            cursor.line(&format!("CUIT: {tax_id}"));
        }
        if let Some(address) = &invoice.customer_address {
            cursor.line(&format!("Domicilio: {address}"));
        }
        cursor.line(&format!("Condicion IVA: {}", invoice.customer_tax_category));
        cursor.gap();

        // item table
        cursor.bold_line("Cant.  Descripcion                              P.Unit.       Importe");
        for item in items {
            cursor.line(&format!(
                "{:<6} {:<40} {:>12} {:>13}",
                item.quantity,
                truncated(&item.product_name, 40),
                item.unit_price().to_string(),
                item.subtotal().to_string(),
            ));
        }
        cursor.gap();

        // totals
        cursor.line(&format!("Subtotal: {}", invoice.subtotal()));
        cursor.line(&format!("IVA: {}", invoice.tax()));
        cursor.bold_line(&format!("TOTAL: {}", invoice.total()));
        cursor.gap();

        // authorization footer
        if let Some(code) = &invoice.authorization_code {
            cursor.line(&format!("CAE: {code}"));
        }
        if let Some(expiry) = &invoice.authorization_expiry {
            cursor.line(&format!("Vencimiento CAE: {}", expiry.format("%d/%m/%Y")));
        }

        let file = fs::File::create(&path)?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| RenderError::Failed(e.to_string()))?;

        info!(path = %path.display(), "invoice document written");
        Ok(path)
    }
}

fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Text cursor flowing down the page from the top margin.
struct Cursor<'a> {
    layer: &'a PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    y: f64,
}

impl<'a> Cursor<'a> {
    fn new(
        layer: &'a PdfLayerReference,
        regular: &'a IndirectFontRef,
        bold: &'a IndirectFontRef,
    ) -> Self {
        Cursor {
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn heading(&mut self, text: &str, size: f64) {
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), self.bold);
        self.y -= LINE_HEIGHT_MM * 1.5;
    }

    fn line(&mut self, text: &str) {
        self.layer
            .use_text(text, 10.0, Mm(MARGIN_MM), Mm(self.y), self.regular);
        self.y -= LINE_HEIGHT_MM;
    }

    fn bold_line(&mut self, text: &str) {
        self.layer
            .use_text(text, 10.0, Mm(MARGIN_MM), Mm(self.y), self.bold);
        self.y -= LINE_HEIGHT_MM;
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT_MM;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_preserves_short_names() {
        assert_eq!(truncated("LED panel", 40), "LED panel");
        assert_eq!(truncated("abcdef", 4), "abcd");
    }
}
