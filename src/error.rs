//! Error types for the evalume library.
//!
//! Each failure domain gets its own type because each one ends a different
//! operation:
//!
//! * [`SubmissionError`]: the submission never produced a job. The user
//!   fixes the input (or the network) and submits again.
//!
//! * [`TrackingError`]: a status query failed at the transport level. The
//!   whole tracking session stops; nothing is retried.
//!
//! * [`StageFailure`]: **not** a transport error: the backend finished a
//!   stage with a FAILED outcome. It is data carried inside the aggregated
//!   report, and it never hides the other stage's result.
//!
//! * [`RenderError`]: the PDF could not be produced. Prior session state is
//!   left untouched and no partial file is written.
//!
//! [`EvalumeError`] wraps all of them for callers that just want `?`.

use crate::job::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Generic message shown to the user when tracking breaks down.
///
/// The underlying cause is logged, never displayed.
pub const TRACKING_FAILED_MESSAGE: &str = "Failed to get analysis status.";

/// Errors raised while submitting an image for analysis.
#[derive(Debug, Error)]
pub enum SubmissionError {
    // ── Validation (no network call was made) ────────────────────────────
    /// Topic was empty or whitespace only.
    #[error("Please provide a topic for analysis.")]
    MissingTopic,

    /// The file does not look like an image.
    #[error("Invalid file type{}. Please select an image.", .mime.as_deref().map(|m| format!(" '{m}'")).unwrap_or_default())]
    NotAnImage { mime: Option<String> },

    /// The image exceeds the upload limit.
    #[error("File size exceeds the {limit_mb} MB limit ({size} bytes).")]
    FileTooLarge { size: u64, limit_mb: u64 },

    /// The image file could not be read from disk.
    #[error("Failed to read image '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Gateway ──────────────────────────────────────────────────────────
    /// Gateway answered with something other than `202 Accepted`.
    ///
    /// `message` is the body's `detail`/`message` field, verbatim.
    #[error("Failed to upload image. {message}")]
    Rejected { status: u16, message: String },

    /// The request never reached the gateway or the connection broke.
    #[error("Failed to upload image. {0}")]
    Network(String),

    /// Gateway accepted the submission but the body was not understood.
    #[error("Failed to upload image. Unexpected response: {0}")]
    MalformedResponse(String),
}

impl SubmissionError {
    /// `true` when the error was raised before any network traffic.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingTopic
                | Self::NotAnImage { .. }
                | Self::FileTooLarge { .. }
                | Self::ReadFailed { .. }
        )
    }
}

/// Errors that end a tracking session.
///
/// `Display` always yields [`TRACKING_FAILED_MESSAGE`]; use
/// [`TrackingError::detail`] for the underlying cause.
#[derive(Debug, Clone, Error)]
pub enum TrackingError {
    /// Transport-level failure (connect, timeout, broken body).
    #[error("{}", TRACKING_FAILED_MESSAGE)]
    Network { run_id: String, detail: String },

    /// Gateway answered with a non-success status.
    #[error("{}", TRACKING_FAILED_MESSAGE)]
    Status {
        run_id: String,
        status: u16,
        message: String,
    },

    /// Gateway answered 2xx but the body could not be decoded.
    #[error("{}", TRACKING_FAILED_MESSAGE)]
    Decode { run_id: String, detail: String },
}

impl TrackingError {
    /// The run the failing query belonged to.
    pub fn run_id(&self) -> &str {
        match self {
            Self::Network { run_id, .. } | Self::Status { run_id, .. } | Self::Decode { run_id, .. } => {
                run_id
            }
        }
    }

    /// Underlying cause, for logs.
    pub fn detail(&self) -> String {
        match self {
            Self::Network { detail, .. } => format!("network: {detail}"),
            Self::Status {
                status, message, ..
            } => format!("HTTP {status}: {message}"),
            Self::Decode { detail, .. } => format!("decode: {detail}"),
        }
    }
}

/// A stage that legitimately finished with a FAILED outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} failed: {message}", .stage.label())]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Errors raised while producing the PDF report.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The PDF object graph could not be serialised.
    #[error("Could not generate PDF: {0}")]
    Pdf(String),

    /// The embedded image could not be re-encoded for the PDF.
    #[error("Could not encode image for PDF: {0}")]
    ImageEncode(String),

    /// Nothing to render: the report has no sections at all.
    #[error("Nothing to render: report is empty")]
    EmptyReport,

    /// Could not create or write the output file.
    #[error("Failed to write report '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking render task died.
    #[error("Render task failed: {0}")]
    Internal(String),
}

/// Umbrella error for the library.
#[derive(Debug, Error)]
pub enum EvalumeError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation requires state the session does not have yet.
    #[error("{0}")]
    NotReady(String),
}
