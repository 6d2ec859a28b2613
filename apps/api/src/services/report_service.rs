//! Downloadable report documents.
//!
//! A report is first assembled as a [`ReportDocument`] (titled tables with
//! an optional totals row), then rendered to an A4 PDF with `printpdf`,
//! written under `<upload_dir>/reports/` and recorded in the `reports` table
//! so it shows up in the history.
//!
//! ```text
//!   rows from the db ──► ReportDocument ──► render_pdf() ──► publish()
//!                         (pure, tested)     (printpdf)       (disk + row)
//! ```

use chrono::Utc;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::upload_service::write_file;
use crate::AppState;
use stockline_core::{Money, Report, ReportType};
use stockline_db::repository::inventory::TransactionDetail;
use stockline_db::repository::report::{DailySales, TopSeller};
use stockline_db::DateRange;

// A4 portrait, in millimetres
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const LINE_HEIGHT: f32 = 5.5;

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 9.0;

/// Approximate Helvetica advance at [`BODY_SIZE`], used to clip cells.
const BODY_CHAR_WIDTH: f32 = 1.75;

// =============================================================================
// Document Model
// =============================================================================

/// One table of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub heading: String,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    /// Printed bold under the rows.
    pub total: Option<Vec<String>>,
}

impl ReportSection {
    fn new(heading: &str, columns: Vec<&'static str>) -> Self {
        ReportSection {
            heading: heading.to_string(),
            columns,
            rows: Vec::new(),
            total: None,
        }
    }
}

/// A report ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub period: String,
    pub generated_at: String,
    pub sections: Vec<ReportSection>,
}

impl ReportDocument {
    fn new(title: &str, period: &str) -> Self {
        ReportDocument {
            title: title.to_string(),
            period: period.to_string(),
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            sections: Vec::new(),
        }
    }
}

/// Human label for the date range of a report, e.g. `2024-01-01 - End`.
pub fn range_label(range: &DateRange) -> String {
    let start = range
        .start
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Start".to_string());
    let end = range
        .end
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "End".to_string());
    format!("{start} - {end}")
}

/// Daily sales followed by the stock movements of the same period.
pub fn sales_report(days: &[DailySales], movements: &[TransactionDetail], label: &str) -> ReportDocument {
    let mut doc = ReportDocument::new("Sales Report", label);

    let mut sales = ReportSection::new("Sales by day", vec!["Date", "Orders", "Total sales", "Profit"]);
    sales.rows = days
        .iter()
        .map(|day| {
            vec![
                day.date.to_string(),
                day.order_count.to_string(),
                Money::from_cents(day.total_sales_cents).to_decimal_string(),
                Money::from_cents(day.profit_cents).to_decimal_string(),
            ]
        })
        .collect();

    let total: Money = days.iter().map(|d| Money::from_cents(d.total_sales_cents)).sum();
    let profit: Money = days.iter().map(|d| Money::from_cents(d.profit_cents)).sum();
    let orders: i64 = days.iter().map(|d| d.order_count).sum();
    sales.total = Some(vec![
        "TOTAL".to_string(),
        orders.to_string(),
        total.to_decimal_string(),
        profit.to_decimal_string(),
    ]);

    doc.sections.push(sales);
    doc.sections.push(movements_section(movements));
    doc
}

/// Best selling products by revenue.
pub fn top_products_report(products: &[TopSeller], label: &str) -> ReportDocument {
    let mut doc = ReportDocument::new("Top Products Report", label);

    let mut section = ReportSection::new(
        "Best sellers by revenue",
        vec!["Rank", "SKU", "Product", "Sold", "Revenue"],
    );
    section.rows = products
        .iter()
        .enumerate()
        .map(|(rank, p)| {
            vec![
                (rank + 1).to_string(),
                p.sku.clone(),
                p.product_name.clone(),
                p.quantity_sold.to_string(),
                Money::from_cents(p.revenue_cents).to_decimal_string(),
            ]
        })
        .collect();

    let revenue: Money = products.iter().map(|p| Money::from_cents(p.revenue_cents)).sum();
    let sold: i64 = products.iter().map(|p| p.quantity_sold).sum();
    section.total = Some(vec![
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        sold.to_string(),
        revenue.to_decimal_string(),
    ]);

    doc.sections.push(section);
    doc
}

/// Every stock movement of the period, newest first.
pub fn movements_report(movements: &[TransactionDetail], label: &str) -> ReportDocument {
    let mut doc = ReportDocument::new("Inventory Movements Report", label);
    doc.sections.push(movements_section(movements));
    doc
}

fn movements_section(movements: &[TransactionDetail]) -> ReportSection {
    let mut section = ReportSection::new(
        "Stock movements",
        vec!["Date", "Type", "SKU", "Product", "Qty", "Reason", "User"],
    );
    section.rows = movements
        .iter()
        .map(|m| {
            vec![
                m.transaction.created_at.format("%Y-%m-%d %H:%M").to_string(),
                m.transaction.transaction_type.to_string(),
                m.product_sku.clone(),
                m.product_name.clone(),
                m.transaction.quantity.to_string(),
                m.transaction.reason.clone().unwrap_or_default(),
                m.user_full_name.clone().unwrap_or_default(),
            ]
        })
        .collect();
    section.total = Some(vec![
        "TOTAL".to_string(),
        format!("{} movements", movements.len()),
    ]);
    section
}

// =============================================================================
// PDF Rendering
// =============================================================================

/// Writes text top-down, starting a new page when the current one is full.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl PageCursor<'_> {
    fn ensure_room(&mut self, lines: f32) {
        if self.y - lines * LINE_HEIGHT < MARGIN {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, lines: f32) {
        self.y -= lines * LINE_HEIGHT;
    }
}

/// Cuts `text` to what fits in `width` millimetres of body text.
fn clip(text: &str, width: f32) -> String {
    let max = (width / BODY_CHAR_WIDTH).floor().max(1.0) as usize;
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(2)).collect();
    format!("{kept}..")
}

fn pdf_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::internal(format!("Failed to render report: {e}"))
}

/// Renders a report to PDF bytes.
pub fn render_pdf(report: &ReportDocument) -> Result<Vec<u8>, ApiError> {
    let (doc, page, layer) = PdfDocument::new(&report.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    let mut cursor = PageCursor {
        layer: doc.get_page(page).get_layer(layer),
        doc: &doc,
        y: PAGE_HEIGHT - MARGIN,
        pages: 1,
    };

    cursor.text(&report.title, TITLE_SIZE, MARGIN, &bold);
    cursor.advance(1.6);
    cursor.text(&format!("Period: {}", report.period), BODY_SIZE, MARGIN, &regular);
    cursor.advance(1.0);
    cursor.text(&format!("Generated: {}", report.generated_at), BODY_SIZE, MARGIN, &regular);
    cursor.advance(2.0);

    let usable = PAGE_WIDTH - 2.0 * MARGIN;
    for section in &report.sections {
        let width = usable / section.columns.len().max(1) as f32;
        let draw_row = |cursor: &PageCursor<'_>, cells: &[String], font: &IndirectFontRef| {
            for (i, cell) in cells.iter().enumerate() {
                cursor.text(&clip(cell, width), BODY_SIZE, MARGIN + i as f32 * width, font);
            }
        };
        let header: Vec<String> = section.columns.iter().map(|c| c.to_string()).collect();

        cursor.ensure_room(3.0);
        cursor.text(&section.heading, HEADING_SIZE, MARGIN, &bold);
        cursor.advance(1.4);
        draw_row(&cursor, &header, &bold);
        cursor.advance(1.0);

        if section.rows.is_empty() {
            cursor.text("No data for this period", BODY_SIZE, MARGIN, &regular);
            cursor.advance(1.0);
        }
        for row in &section.rows {
            let before = cursor.pages;
            cursor.ensure_room(1.0);
            if cursor.pages != before {
                draw_row(&cursor, &header, &bold);
                cursor.advance(1.0);
            }
            draw_row(&cursor, row, &regular);
            cursor.advance(1.0);
        }
        if let Some(total) = &section.total {
            cursor.ensure_room(1.0);
            draw_row(&cursor, total, &bold);
            cursor.advance(1.0);
        }
        cursor.advance(1.0);
    }

    let pages = cursor.pages;
    drop(cursor);
    let bytes = doc.save_to_bytes().map_err(pdf_error)?;
    info!(title = %report.title, pages, size = bytes.len(), "Report rendered");
    Ok(bytes)
}

// =============================================================================
// Publishing
// =============================================================================

/// Renders a report, writes it to disk and records it.
pub async fn publish(
    state: &AppState,
    tenant_id: &str,
    user_id: &str,
    report_type: ReportType,
    report: &ReportDocument,
) -> Result<Report, ApiError> {
    let bytes = render_pdf(report)?;
    let file_name = format!(
        "report-{}-{}-{}.pdf",
        report_type.as_str().to_ascii_uppercase(),
        Utc::now().timestamp_millis(),
        Uuid::new_v4()
    );

    let url = write_file(&state.config.upload_dir, "reports", &file_name, &bytes).await?;
    let record = state
        .db
        .reports()
        .record(tenant_id, user_id, report_type, &url)
        .await?;

    info!(tenant_id = %tenant_id, report_type = %report_type, url = %url, "Report generated");
    Ok(record)
}
