//! Configuration types for submission, tracking and report rendering.
//!
//! Two structs cover the two halves of the crate:
//!
//! * [`ClientConfig`]: where the gateway lives and how the poller talks to it.
//! * [`ReportLayout`]: page geometry and typography for the PDF report.
//!
//! Both follow the same pattern: a `Default` that matches the reference
//! behaviour, and a builder whose `build()` validates the result.

use crate::error::EvalumeError;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default gateway base URL (the analysis backend's development address).
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000";

/// Largest image accepted for upload: 100 MB.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Configuration for talking to the analysis gateway.
///
/// # Example
/// ```rust
/// use evalume::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://analysis.internal:8000")
///     .poll_interval_ms(1500)
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_interval().as_millis(), 1500);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway base URL, without trailing slash. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Cadence of status queries in milliseconds. Default: 2000.
    ///
    /// The first query fires one full interval after tracking starts. Ticks
    /// that come due while a query is still outstanding are skipped.
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds for both submit and status. Default: 120.
    ///
    /// Submission waits for text extraction to finish server-side, which can
    /// take a while on large images, so this is generous.
    pub request_timeout_secs: u64,

    /// Upload limit in bytes. Default: 100 MB.
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            poll_interval_ms: 2000,
            request_timeout_secs: 120,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, EvalumeError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(EvalumeError::InvalidConfig(format!(
                "gateway URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.poll_interval_ms == 0 {
            return Err(EvalumeError::InvalidConfig(
                "poll interval must be > 0 ms".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(EvalumeError::InvalidConfig(
                "request timeout must be > 0 s".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Page geometry and typography for the PDF report. All lengths in millimetres.
///
/// Defaults reproduce the reference report: A4 portrait, 15 mm margins,
/// 7 mm text lines, 18 pt title, 14 pt headings, 10 pt body, 8 pt footer,
/// and an 80 mm wide embedded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    /// Same margin on all four sides.
    pub margin_mm: f32,
    /// Vertical advance per text line, independent of font size.
    pub line_height_mm: f32,
    pub title_size_pt: f32,
    pub heading_size_pt: f32,
    pub body_size_pt: f32,
    pub footer_size_pt: f32,
    /// Space after the title.
    pub title_spacing_mm: f32,
    /// Space between a section heading and its body.
    pub heading_spacing_mm: f32,
    /// Space after each section (and after the image).
    pub section_spacing_mm: f32,
    /// Width the embedded image is scaled to.
    pub image_width_mm: f32,
    /// Footer baseline distance from the bottom page edge.
    pub footer_offset_mm: f32,
    /// `chrono` format string for the footer date.
    pub date_format: String,
    /// Suggested artifact name.
    pub file_name: String,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 15.0,
            line_height_mm: 7.0,
            title_size_pt: 18.0,
            heading_size_pt: 14.0,
            body_size_pt: 10.0,
            footer_size_pt: 8.0,
            title_spacing_mm: 10.0,
            heading_spacing_mm: 5.0,
            section_spacing_mm: 10.0,
            image_width_mm: 80.0,
            footer_offset_mm: 10.0,
            date_format: "%Y-%m-%d".to_string(),
            file_name: "image-analysis-report.pdf".to_string(),
        }
    }
}

impl ReportLayout {
    pub fn builder() -> ReportLayoutBuilder {
        ReportLayoutBuilder {
            layout: Self::default(),
        }
    }

    /// Usable width between left and right margins.
    pub fn content_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    /// Lowest y a line may reach (`page_height - bottom margin`).
    pub fn bottom_limit_mm(&self) -> f32 {
        self.page_height_mm - self.margin_mm
    }

    /// Full text lines that fit on one page starting from the top margin.
    pub fn lines_per_page(&self) -> usize {
        ((self.bottom_limit_mm() - self.margin_mm) / self.line_height_mm).floor() as usize
    }
}

/// Builder for [`ReportLayout`].
#[derive(Debug)]
pub struct ReportLayoutBuilder {
    layout: ReportLayout,
}

impl ReportLayoutBuilder {
    pub fn page_size_mm(mut self, width: f32, height: f32) -> Self {
        self.layout.page_width_mm = width;
        self.layout.page_height_mm = height;
        self
    }

    pub fn margin_mm(mut self, mm: f32) -> Self {
        self.layout.margin_mm = mm;
        self
    }

    pub fn line_height_mm(mut self, mm: f32) -> Self {
        self.layout.line_height_mm = mm;
        self
    }

    pub fn body_size_pt(mut self, pt: f32) -> Self {
        self.layout.body_size_pt = pt;
        self
    }

    pub fn heading_size_pt(mut self, pt: f32) -> Self {
        self.layout.heading_size_pt = pt;
        self
    }

    pub fn image_width_mm(mut self, mm: f32) -> Self {
        self.layout.image_width_mm = mm;
        self
    }

    pub fn date_format(mut self, fmt: impl Into<String>) -> Self {
        self.layout.date_format = fmt.into();
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.layout.file_name = name.into();
        self
    }

    /// Build the layout, validating that a page can hold at least one line.
    pub fn build(self) -> Result<ReportLayout, EvalumeError> {
        let l = &self.layout;
        if l.page_width_mm <= 0.0 || l.page_height_mm <= 0.0 {
            return Err(EvalumeError::InvalidConfig("page size must be positive".into()));
        }
        if l.content_width_mm() <= 0.0 {
            return Err(EvalumeError::InvalidConfig(format!(
                "margins of {} mm leave no content width",
                l.margin_mm
            )));
        }
        if l.line_height_mm <= 0.0 {
            return Err(EvalumeError::InvalidConfig("line height must be > 0".into()));
        }
        if l.lines_per_page() == 0 {
            return Err(EvalumeError::InvalidConfig(
                "page content height is smaller than one line".into(),
            ));
        }
        if l.image_width_mm <= 0.0 || l.image_width_mm > l.content_width_mm() {
            return Err(EvalumeError::InvalidConfig(format!(
                "image width must be within (0, {}] mm",
                l.content_width_mm()
            )));
        }
        if [l.title_size_pt, l.heading_size_pt, l.body_size_pt, l.footer_size_pt]
            .iter()
            .any(|s| *s <= 0.0)
        {
            return Err(EvalumeError::InvalidConfig("font sizes must be > 0".into()));
        }
        if StrftimeItems::new(&l.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(EvalumeError::InvalidConfig(format!(
                "invalid date format '{}'",
                l.date_format
            )));
        }
        Ok(self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.poll_interval(), Duration::from_millis(2000));
        assert_eq!(c.max_upload_bytes, 104_857_600);
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let c = ClientConfig::builder()
            .base_url("https://api.example.org/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "https://api.example.org");
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        assert!(ClientConfig::builder().poll_interval_ms(0).build().is_err());
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        assert!(ClientConfig::builder().base_url("ftp://x").build().is_err());
    }

    #[test]
    fn test_a4_geometry() {
        let l = ReportLayout::default();
        assert_eq!(l.content_width_mm(), 180.0);
        assert_eq!(l.bottom_limit_mm(), 282.0);
        // (282 - 15) / 7 = 38.14
        assert_eq!(l.lines_per_page(), 38);
    }

    #[test]
    fn test_layout_rejects_huge_margins() {
        assert!(ReportLayout::builder().margin_mm(120.0).build().is_err());
    }

    #[test]
    fn test_layout_rejects_bad_date_format() {
        assert!(ReportLayout::builder().date_format("%Q").build().is_err());
        assert!(ReportLayout::builder().date_format("%d/%m/%Y").build().is_ok());
    }
}
