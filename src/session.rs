//! Analysis session: one user-facing workflow from upload to PDF.
//!
//! An [`AnalysisSession`] owns everything a single analysis needs and
//! releases it deterministically:
//!
//! | Resource            | Acquired            | Released                                  |
//! |---------------------|---------------------|-------------------------------------------|
//! | tracking task       | successful `start`  | settle, tracking error, `cancel`, `clear`, new `start`, drop |
//! | image preview file  | successful `start`  | `clear`, new `start`, submission failure, tracking failure (in `wait`), drop |
//!
//! The preview is a `tempfile` copy of the uploaded image. It backs the
//! image embedded in the exported PDF and is deleted when released.

use crate::config::{ClientConfig, ReportLayout};
use crate::error::{EvalumeError, SubmissionError};
use crate::gateway::{Gateway, ImageUpload, Submission, SubmissionRequest};
use crate::job::AnalysisJob;
use crate::progress::ObserverRef;
use crate::render::{self, ReportInput};
use crate::report::{aggregate, AggregatedReport};
use crate::stream::SnapshotStream;
use crate::tracker::{JobPoller, TrackingOutcome, TrackingState};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// Status queries are running.
    Tracking,
    /// Both analyses are terminal; export is available.
    Settled,
    /// Submission or tracking failed; see [`SessionView::error`].
    Failed,
    Cancelled,
}

/// Everything a front end needs to draw the current state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub run_id: Option<String>,
    pub extracted_text: Option<String>,
    pub aggregated: AggregatedReport,
    /// Submission or tracking error, user-facing. Stage failures live in
    /// `aggregated.errors` instead.
    pub error: Option<String>,
}

impl SessionView {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Tracking
    }

    pub fn can_export(&self) -> bool {
        self.phase == Phase::Settled
    }
}

/// Temporary on-disk copy of the submitted image.
#[derive(Debug)]
pub struct ImagePreview {
    file: NamedTempFile,
    mime_type: String,
}

impl ImagePreview {
    fn create(upload: &ImageUpload) -> std::io::Result<Self> {
        let suffix = Path::new(&upload.file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("evalume-preview-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&upload.bytes)?;
        file.flush()?;
        Ok(Self {
            file,
            mime_type: upload.mime_type.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }
}

/// One analysis workflow: submit, track, view, export.
pub struct AnalysisSession {
    poller: JobPoller,
    layout: ReportLayout,
    preview: Option<ImagePreview>,
    view: SessionView,
}

impl AnalysisSession {
    pub fn new(gateway: Arc<dyn Gateway>, config: ClientConfig, layout: ReportLayout) -> Self {
        Self {
            poller: JobPoller::new(gateway, config),
            layout,
            preview: None,
            view: SessionView::default(),
        }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.poller = self.poller.with_observer(observer);
        self
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// Submit an image and start tracking it.
    ///
    /// Invalid input only sets [`SessionView::error`]; a job already in
    /// flight keeps running. A valid request replaces the previous job and
    /// its preview.
    pub async fn start(
        &mut self,
        request: SubmissionRequest,
    ) -> Result<Submission, SubmissionError> {
        if let Err(e) = request.validate(self.poller.config().max_upload_bytes) {
            debug!("Rejected before submission: {}", e);
            self.view.error = Some(e.to_string());
            return Err(e);
        }

        self.release_preview();
        self.view = SessionView::default();

        let submission = match self.poller.submit(&request).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Submission failed: {}", e);
                self.view.phase = Phase::Failed;
                self.view.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.preview = match ImagePreview::create(&request.image) {
            Ok(preview) => Some(preview),
            Err(e) => {
                warn!("Could not keep a preview of the image, PDF will omit it: {}", e);
                None
            }
        };

        self.poller
            .start_tracking(submission.run_id.clone(), submission.extracted_text.clone());
        self.view.phase = Phase::Tracking;
        self.view.run_id = Some(submission.run_id.clone());
        self.view.extracted_text = Some(submission.extracted_text.clone());
        Ok(submission)
    }

    /// Current view, including the latest snapshot.
    ///
    /// Reflects a settled job or a failed status query as soon as the
    /// tracking task records it; no need to [`Self::wait`] first.
    pub fn view(&self) -> SessionView {
        let mut view = self.view.clone();
        if let Some(job) = self.poller.snapshot() {
            view.aggregated = aggregate(&job);
            if view.phase == Phase::Tracking && job.is_settled() {
                view.phase = Phase::Settled;
            }
        }
        if view.phase == Phase::Tracking {
            if let Some(TrackingState::Failed(error)) = self.poller.state() {
                view.phase = Phase::Failed;
                view.error = Some(error.to_string());
            }
        }
        view
    }

    pub fn snapshot(&self) -> Option<AnalysisJob> {
        self.poller.snapshot()
    }

    pub fn updates(&self) -> Option<SnapshotStream> {
        self.poller.updates()
    }

    pub fn preview(&self) -> Option<&ImagePreview> {
        self.preview.as_ref()
    }

    /// Wait until tracking ends and fold the outcome into the view.
    pub async fn wait(&mut self) -> Option<TrackingOutcome> {
        let outcome = self.poller.wait().await?;
        self.view.aggregated = aggregate(outcome.job());
        match &outcome {
            TrackingOutcome::Settled(_) => self.view.phase = Phase::Settled,
            TrackingOutcome::Failed { error, .. } => {
                self.view.phase = Phase::Failed;
                self.view.error = Some(error.to_string());
                self.release_preview();
            }
            TrackingOutcome::Cancelled(_) => {
                if self.view.phase == Phase::Tracking {
                    self.view.phase = Phase::Cancelled;
                }
            }
        }
        Some(outcome)
    }

    /// Stop tracking; what was received so far stays visible.
    pub fn cancel(&mut self) {
        self.poller.cancel();
        if self.view.phase != Phase::Tracking {
            return;
        }
        // A job that already settled or failed keeps that outcome.
        let current = self.view();
        if current.phase == Phase::Tracking {
            info!("Session cancelled");
            self.view.phase = Phase::Cancelled;
        } else {
            self.view.phase = current.phase;
            self.view.error = current.error;
        }
    }

    /// Back to idle: stop tracking, drop the preview, forget everything.
    pub fn clear(&mut self) {
        self.poller.clear();
        self.release_preview();
        self.view = SessionView::default();
    }

    /// Render the PDF report. Requires both analyses to be terminal.
    pub async fn export(&self) -> Result<Vec<u8>, EvalumeError> {
        let input = self.report_input().await?;
        Ok(render::render_report(&input, &self.layout).await?)
    }

    /// Render the PDF report to `path` (atomic write).
    pub async fn export_to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf, EvalumeError> {
        let input = self.report_input().await?;
        Ok(render::render_to_file(&input, &self.layout, path).await?)
    }

    async fn report_input(&self) -> Result<ReportInput, EvalumeError> {
        let view = self.view();
        if !view.can_export() {
            return Err(EvalumeError::NotReady(
                "Report is not ready: both analyses must finish before export.".into(),
            ));
        }

        let image = match &self.preview {
            Some(preview) => match preview.read().await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Could not read image preview, PDF will omit it: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(ReportInput {
            report: view.aggregated.report,
            extracted_text: view.extracted_text,
            image,
        })
    }

    fn release_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            debug!("Releasing image preview {}", preview.path().display());
        }
    }
}
