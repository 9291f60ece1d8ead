//! # evalume
//!
//! Submit an image to an asynchronous analysis backend, track its multi-stage
//! job to completion, and export the result as a paginated PDF report.
//!
//! ## Why this crate?
//!
//! The backend answers a submission immediately with the text it extracted
//! from the image, then keeps working on two slower analyses (linguistic and
//! argumentative) in the background. Getting from "submitted" to "report on
//! disk" means polling without overlapping requests, stopping at exactly the
//! right moment, surfacing a failed stage without hiding the other one, and
//! laying the result out on paper. This crate does all of that behind a
//! small, testable API.
//!
//! ## Flow Overview
//!
//! ```text
//! image + topic
//!  │
//!  ├─ 1. Submit   validate, multipart POST, get run id + extracted text
//!  ├─ 2. Track    one status query per tick, never overlapping
//!  ├─ 3. Apply    monotonic merge into the job snapshot
//!  ├─ 4. Report   pure aggregation: sections present + stage failures
//!  └─ 5. Render   markup stripped, wrapped, paginated, footer-stamped PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evalume::{
//!     AnalysisSession, ClientConfig, HttpGateway, ImageUpload, ReportLayout, SubmissionRequest,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let gateway = Arc::new(HttpGateway::new(&config)?);
//!     let mut session = AnalysisSession::new(gateway, config, ReportLayout::default());
//!
//!     let image = ImageUpload::from_path("essay.jpg").await?;
//!     session
//!         .start(SubmissionRequest::new(image, "Climate policy"))
//!         .await?;
//!     session.wait().await;
//!
//!     for error in &session.view().aggregated.errors {
//!         eprintln!("{error}");
//!     }
//!     session.export_to_file("image-analysis-report.pdf").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `evalume` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! evalume = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod gateway;
pub mod job;
pub mod progress;
pub mod render;
pub mod report;
pub mod session;
pub mod stream;
pub mod tracker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, ReportLayout, ReportLayoutBuilder};
pub use error::{
    EvalumeError, RenderError, StageFailure, SubmissionError, TrackingError,
    TRACKING_FAILED_MESSAGE,
};
pub use gateway::{Gateway, HttpGateway, ImageUpload, Submission, SubmissionRequest};
pub use job::{AnalysisJob, ApplyOutcome, Stage, StageStatus, StatusUpdate};
pub use progress::{NoopObserver, ObserverRef, TrackingObserver};
pub use render::{render_report, render_to_file, ReportInput, RichText, Span, SpanStyle};
pub use report::{aggregate, AggregatedReport, AnalysisReport, REPORT_TITLE};
pub use session::{AnalysisSession, Phase, SessionView};
pub use stream::{ReportStream, SnapshotStream};
pub use tracker::{JobPoller, TrackingOutcome, TrackingState};
