//! Report export as JSON or PDF.

use crate::models::BiasReport;
use crate::services::database::ChatStore;
use chrono::{DateTime, Utc};
use metrics::counter;
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use serde::Serialize;
use service_core::error::AppError;
use std::io::BufWriter;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Pdf,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ReportFormat::Json),
            "pdf" => Ok(ReportFormat::Pdf),
            other => Err(AppError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Bytes of an exported report plus the metadata needed to serve it.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

/// Look up a report for its owner and render it.
///
/// Existence and ownership are checked before the format, so a foreign
/// report never reveals whether the requested format is valid.
pub async fn export_report(
    store: &dyn ChatStore,
    user_id: &str,
    report_id: &str,
    format: &str,
) -> Result<RenderedReport, AppError> {
    let report = store
        .find_report(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Report not found")))?;

    if !report.is_owned_by(user_id) {
        tracing::warn!(report_id = %report_id, "Download of a report owned by another user");
        return Err(AppError::Forbidden(anyhow::anyhow!("Unauthorized")));
    }

    let format: ReportFormat = format.parse()?;
    let rendered = render(&report, format)?;

    counter!("report_downloads_total", "format" => format.extension()).increment(1);
    tracing::info!(
        report_id = %report_id,
        format = format.extension(),
        bytes = rendered.bytes.len(),
        "Report exported"
    );

    Ok(rendered)
}

pub fn render(report: &BiasReport, format: ReportFormat) -> Result<RenderedReport, AppError> {
    let bytes = match format {
        ReportFormat::Json => render_json(report)?,
        ReportFormat::Pdf => render_pdf(report)?,
    };

    Ok(RenderedReport {
        bytes,
        content_type: format.content_type(),
        file_name: format!("bias_report_{}.{}", report.id, format.extension()),
    })
}

fn format_date(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

#[derive(Serialize)]
struct ReportExport<'a> {
    report_id: &'a str,
    created_at: String,
    bias_detected: bool,
    reasons: &'a [String],
    fixes: &'a [String],
}

fn render_json(report: &BiasReport) -> Result<Vec<u8>, AppError> {
    let export = ReportExport {
        report_id: &report.id,
        created_at: format_date(&report.created_at),
        bias_detected: report.bias_detected,
        reasons: &report.reasons,
        fixes: &report.fixes,
    };

    serde_json::to_vec_pretty(&export)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("JSON export failed: {}", e)))
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const MARGIN: f32 = 20.0;
const WRAP_CHARS: usize = 90;

/// Cursor over a growing PDF document that starts a new page whenever the
/// next line would fall below the bottom margin.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    /// Baseline of the next line, in millimetres from the page bottom.
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Self {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        Self {
            doc,
            layer,
            y: TOP,
            pages: 1,
        }
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
            self.pages += 1;
        }
    }

    fn line(&mut self, text: &str, size: f32, indent: f32, font: &IndirectFontRef) {
        let height = size * 0.5;
        self.ensure_room(height);
        self.layer
            .use_text(text, size, Mm(MARGIN + indent), Mm(self.y), font);
        self.y -= height;
    }

    fn paragraph(&mut self, text: &str, size: f32, indent: f32, font: &IndirectFontRef) {
        for line in wrap_text(text, WRAP_CHARS) {
            self.line(&line, size, indent, font);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn finish(self) -> Result<Vec<u8>, AppError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF save error: {}", e)))?;
        buf.into_inner()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF buffer error: {}", e)))
    }
}

fn render_pdf(report: &BiasReport) -> Result<Vec<u8>, AppError> {
    layout_pdf(report)?.finish()
}

fn layout_pdf(report: &BiasReport) -> Result<PageWriter, AppError> {
    let mut writer = PageWriter::new("Bias Detection Report");

    let font = writer
        .doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF font error: {}", e)))?;
    let bold = writer
        .doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("PDF font error: {}", e)))?;

    writer.line("Bias Detection Report", 18.0, 0.0, &bold);
    writer.gap(4.0);

    writer.paragraph(&format!("Report ID: {}", report.id), 10.0, 0.0, &font);
    writer.paragraph(
        &format!("Date: {}", format_date(&report.created_at)),
        10.0,
        0.0,
        &font,
    );
    writer.gap(4.0);

    let status = if report.bias_detected {
        "Bias Detected"
    } else {
        "No Bias Detected"
    };
    writer.line(&format!("Status: {}", status), 14.0, 0.0, &bold);
    writer.gap(4.0);

    if !report.reasons.is_empty() {
        writer.line("Reasons:", 12.0, 0.0, &bold);
        for reason in &report.reasons {
            writer.paragraph(&format!("- {}", reason), 10.0, 5.0, &font);
        }
        writer.gap(4.0);
    }

    if !report.fixes.is_empty() {
        writer.line("Recommended Fixes:", 12.0, 0.0, &bold);
        for fix in &report.fixes {
            writer.paragraph(&format!("- {}", fix), 10.0, 5.0, &font);
        }
    }

    Ok(writer)
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let len = current.chars().count();
        if len + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
