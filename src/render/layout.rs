//! Pagination: place the report's blocks on pages, without touching PDF.
//!
//! Coordinates are millimetres from the top-left page corner. Text runs are
//! positioned by baseline, images by their top edge.
//!
//! ## Flow
//!
//! ```text
//! title (centred, once) ─▶ image ─▶ extracted text ─▶ linguistic ─▶ argumentative
//!                                                                         │
//!                          footer pass over every page ◀──────────────────┘
//! ```
//!
//! Before each text line the cursor checks `y + line_height` against the
//! bottom margin and starts a new page if the line would cross it. The image
//! is never split; if it does not fit below the cursor it moves to the next
//! page, and if it is taller than a whole page's content area it is scaled
//! down first.

use super::markup::strip_markup;
use super::metrics::{text_width_mm, wrap_text, Font};
use crate::config::ReportLayout;
use crate::report::AnalysisReport;
use tracing::debug;

pub const EXTRACTED_TEXT_HEADING: &str = "Extracted Text from Image";
pub const LINGUISTIC_HEADING: &str = "Linguistic Analysis";
pub const ARGUMENTATIVE_HEADING: &str = "Argumentative Analysis";

/// Pixel dimensions of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width_px: u32,
    pub height_px: u32,
}

/// What goes into the document.
#[derive(Debug, Clone, Copy)]
pub struct ReportContent<'a> {
    pub report: &'a AnalysisReport,
    pub extracted_text: Option<&'a str>,
    pub image: Option<ImageSize>,
}

impl ReportContent<'_> {
    /// Text sections in document order, markup stripped, empty ones dropped.
    pub fn sections(&self) -> Vec<(&'static str, String)> {
        [
            (EXTRACTED_TEXT_HEADING, self.extracted_text),
            (LINGUISTIC_HEADING, self.report.overview.as_deref()),
            (ARGUMENTATIVE_HEADING, self.report.recommendations.as_deref()),
        ]
        .into_iter()
        .filter_map(|(heading, body)| {
            let body = strip_markup(body?);
            (!body.trim().is_empty()).then_some((heading, body))
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x_mm: f32,
    pub baseline_mm: f32,
    pub text: String,
    pub font: Font,
    pub size_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedImage {
    pub x_mm: f32,
    pub top_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// One page of positioned content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaidOutPage {
    /// Title, headings and body lines.
    pub lines: Vec<TextRun>,
    pub image: Option<PlacedImage>,
    /// Stamped by the footer pass.
    pub footer: Option<TextRun>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutDocument {
    pub width_mm: f32,
    pub height_mm: f32,
    pub pages: Vec<LaidOutPage>,
}

impl LaidOutDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All non-footer lines, in order.
    pub fn lines(&self) -> impl Iterator<Item = &TextRun> {
        self.pages.iter().flat_map(|p| p.lines.iter())
    }
}

/// Lay out a report. Pure: same input, same pages.
pub fn layout_report(
    content: &ReportContent<'_>,
    layout: &ReportLayout,
    generated_on: &str,
) -> LaidOutDocument {
    let mut cursor = Cursor::new(layout);

    // ── Title ────────────────────────────────────────────────────────────────
    cursor.centered(&content.report.title, Font::Bold, layout.title_size_pt);
    cursor.advance(layout.title_spacing_mm);

    // ── Image ────────────────────────────────────────────────────────────────
    if let Some(size) = content.image {
        match fit_image(size, layout) {
            Some((width, height)) => cursor.image(width, height),
            None => debug!("Skipping image with zero dimension {:?}", size),
        }
    }

    // ── Sections ─────────────────────────────────────────────────────────────
    for (heading, body) in content.sections() {
        cursor.paragraph(heading, Font::Bold, layout.heading_size_pt);
        cursor.advance(layout.heading_spacing_mm);
        cursor.paragraph(&body, Font::Regular, layout.body_size_pt);
        cursor.advance(layout.section_spacing_mm);
    }

    let mut doc = cursor.finish();
    stamp_footers(&mut doc, layout, generated_on);
    debug!("Laid out report on {} page(s)", doc.page_count());
    doc
}

/// Target size in mm: configured width, aspect-preserving height, shrunk to
/// one page of content if needed.
fn fit_image(size: ImageSize, layout: &ReportLayout) -> Option<(f32, f32)> {
    if size.width_px == 0 || size.height_px == 0 {
        return None;
    }
    let aspect = size.height_px as f32 / size.width_px as f32;
    let mut width = layout.image_width_mm;
    let mut height = width * aspect;
    let max_height = layout.bottom_limit_mm() - layout.margin_mm;
    if height > max_height {
        height = max_height;
        width = height / aspect;
    }
    Some((width, height))
}

fn stamp_footers(doc: &mut LaidOutDocument, layout: &ReportLayout, generated_on: &str) {
    let total = doc.pages.len();
    for (i, page) in doc.pages.iter_mut().enumerate() {
        let text = format!("Generated on {} - Page {} of {}", generated_on, i + 1, total);
        let width = text_width_mm(&text, Font::Regular, layout.footer_size_pt);
        page.footer = Some(TextRun {
            x_mm: (layout.page_width_mm - width) / 2.0,
            baseline_mm: layout.page_height_mm - layout.footer_offset_mm,
            text,
            font: Font::Regular,
            size_pt: layout.footer_size_pt,
        });
    }
}

/// Vertical cursor over a growing list of pages.
struct Cursor<'l> {
    layout: &'l ReportLayout,
    pages: Vec<LaidOutPage>,
    y: f32,
}

impl<'l> Cursor<'l> {
    fn new(layout: &'l ReportLayout) -> Self {
        Self {
            layout,
            pages: vec![LaidOutPage::default()],
            y: layout.margin_mm,
        }
    }

    fn page(&mut self) -> &mut LaidOutPage {
        if self.pages.is_empty() {
            self.pages.push(LaidOutPage::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(LaidOutPage::default());
        self.y = self.layout.margin_mm;
    }

    fn advance(&mut self, mm: f32) {
        self.y += mm;
    }

    fn centered(&mut self, text: &str, font: Font, size_pt: f32) {
        let width = text_width_mm(text, font, size_pt);
        let run = TextRun {
            x_mm: (self.layout.page_width_mm - width) / 2.0,
            baseline_mm: self.y,
            text: text.to_string(),
            font,
            size_pt,
        };
        self.page().lines.push(run);
    }

    /// Wrapped text, one line-height per line, breaking pages as needed.
    fn paragraph(&mut self, text: &str, font: Font, size_pt: f32) {
        let lines = wrap_text(text, font, size_pt, self.layout.content_width_mm());
        for line in lines {
            if self.y + self.layout.line_height_mm > self.layout.bottom_limit_mm() {
                self.new_page();
            }
            let run = TextRun {
                x_mm: self.layout.margin_mm,
                baseline_mm: self.y,
                text: line,
                font,
                size_pt,
            };
            self.page().lines.push(run);
            self.y += self.layout.line_height_mm;
        }
    }

    fn image(&mut self, width_mm: f32, height_mm: f32) {
        if self.y + height_mm > self.layout.bottom_limit_mm() {
            self.new_page();
        }
        let placed = PlacedImage {
            x_mm: (self.layout.page_width_mm - width_mm) / 2.0,
            top_mm: self.y,
            width_mm,
            height_mm,
        };
        self.page().image = Some(placed);
        self.y += height_mm + self.layout.section_spacing_mm;
    }

    fn finish(self) -> LaidOutDocument {
        LaidOutDocument {
            width_mm: self.layout.page_width_mm,
            height_mm: self.layout.page_height_mm,
            pages: self.pages,
        }
    }
}
