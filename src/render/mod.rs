//! Document renderer: final report → paginated PDF.
//!
//! ```text
//! ReportInput ─▶ prepare image ─▶ layout_report ─▶ write_pdf ─▶ bytes / file
//!  (report,       (decode, JPEG,    (pure, mm,       (lopdf)
//!   text, image)   lossy)            paginated)
//! ```
//!
//! Image decoding and PDF serialisation are CPU-bound, so both run inside
//! `spawn_blocking`. A broken image never fails the render; it is logged and
//! the document is produced without it.

pub mod embed;
pub mod layout;
pub mod markup;
pub mod metrics;
pub mod pdf;

pub use layout::{layout_report, ImageSize, LaidOutDocument, LaidOutPage, ReportContent};
pub use markup::{strip_markup, RichText, Span, SpanStyle};

use crate::config::ReportLayout;
use crate::error::RenderError;
use crate::report::AnalysisReport;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything the renderer consumes.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub report: AnalysisReport,
    pub extracted_text: Option<String>,
    /// Raw bytes of the submitted image, any format `image` can decode.
    pub image: Option<Vec<u8>>,
}

impl ReportInput {
    /// At least one text section would be printed.
    pub fn has_content(&self) -> bool {
        !ReportContent {
            report: &self.report,
            extracted_text: self.extracted_text.as_deref(),
            image: None,
        }
        .sections()
        .is_empty()
    }
}

/// Render to PDF bytes, stamping today's date in the footer.
pub async fn render_report(
    input: &ReportInput,
    layout: &ReportLayout,
) -> Result<Vec<u8>, RenderError> {
    let generated_on = today(&layout.date_format);
    render_report_dated(input, layout, &generated_on).await
}

/// Render to PDF bytes with an explicit footer date.
pub async fn render_report_dated(
    input: &ReportInput,
    layout: &ReportLayout,
    generated_on: &str,
) -> Result<Vec<u8>, RenderError> {
    if !input.has_content() {
        return Err(RenderError::EmptyReport);
    }

    let input = input.clone();
    let layout = layout.clone();
    let generated_on = generated_on.to_string();

    tokio::task::spawn_blocking(move || render_blocking(&input, &layout, &generated_on))
        .await
        .map_err(|e| RenderError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_blocking(
    input: &ReportInput,
    layout: &ReportLayout,
    generated_on: &str,
) -> Result<Vec<u8>, RenderError> {
    // ── Step 1: Prepare image ────────────────────────────────────────────
    let embedded = input.image.as_deref().and_then(embed::prepare_image_lossy);

    // ── Step 2: Lay out pages ────────────────────────────────────────────
    let content = ReportContent {
        report: &input.report,
        extracted_text: input.extracted_text.as_deref(),
        image: embedded.as_ref().map(|img| img.size),
    };
    let doc = layout_report(&content, layout, generated_on);

    // ── Step 3: Serialise ────────────────────────────────────────────────
    let bytes = pdf::write_pdf(&doc, embedded.as_ref())?;
    info!(
        "Rendered report: {} page(s), {} bytes{}",
        doc.page_count(),
        bytes.len(),
        if embedded.is_some() { ", with image" } else { "" }
    );
    Ok(bytes)
}

/// Render and write to `output_path`.
///
/// Uses atomic write (temp file + rename): on any failure no file appears at
/// `output_path` and an existing file there is left untouched.
pub async fn render_to_file(
    input: &ReportInput,
    layout: &ReportLayout,
    output_path: impl AsRef<Path>,
) -> Result<PathBuf, RenderError> {
    let path = output_path.as_ref();
    let bytes = render_report(input, layout).await?;
    write_atomic(path, &bytes).await?;
    info!("Report written to {}", path.display());
    Ok(path.to_path_buf())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let fail = |e: std::io::Error| RenderError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    debug!("Renamed {} → {}", tmp_path.display(), path.display());
    Ok(())
}

/// Today's date in `format`, falling back to ISO if the format is invalid.
pub fn today(format: &str) -> String {
    let now = chrono::Local::now();
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_err() {
        out = now.format("%Y-%m-%d").to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content_ignores_blank_sections() {
        let mut input = ReportInput::default();
        assert!(!input.has_content());
        input.report.overview = Some("  **  ** ".into());
        assert!(!input.has_content());
        input.extracted_text = Some("text".into());
        assert!(input.has_content());
    }

    #[test]
    fn test_today_falls_back_on_bad_format() {
        let iso = today("%Y-%m-%d");
        assert_eq!(iso.len(), 10);
        assert_eq!(today("%Q"), iso);
    }

    #[tokio::test]
    async fn test_empty_report_is_rejected() {
        let err = render_report(&ReportInput::default(), &ReportLayout::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyReport));
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("report.pdf");
        let input = ReportInput {
            extracted_text: Some("Hello".into()),
            ..Default::default()
        };
        let written = render_to_file(&input, &ReportLayout::default(), &out)
            .await
            .unwrap();
        assert_eq!(written, out);
        assert!(out.exists());
        assert!(!out.with_extension("pdf.tmp").exists());
    }
}
