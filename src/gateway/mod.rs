//! The backend gateway seam.
//!
//! The analysis backend is an opaque collaborator reached over HTTP. The
//! [`Gateway`] trait is the only thing the poller knows about it, so tests
//! can drive the whole tracking state machine with a scripted in-process
//! gateway and the CLI can use [`HttpGateway`].
//!
//! ```text
//! SubmissionRequest ──submit──▶ Submission { run_id, extracted_text }
//! run_id            ──status──▶ StatusUpdate { per-stage StageStatus }
//! ```
//!
//! Futures are boxed (`BoxFuture`) so the trait stays object-safe and can be
//! shared as `Arc<dyn Gateway>` across the spawned tracking task.

pub mod http;
pub mod wire;

pub use http::HttpGateway;

use crate::error::{SubmissionError, TrackingError};
use crate::job::StatusUpdate;
use futures::future::BoxFuture;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Backend operations the poller depends on.
pub trait Gateway: Send + Sync {
    /// Start an analysis run. Resolves once text extraction is done.
    fn submit<'a>(
        &'a self,
        request: &'a SubmissionRequest,
    ) -> BoxFuture<'a, Result<Submission, SubmissionError>>;

    /// Query per-stage status for a run.
    fn status<'a>(&'a self, run_id: &'a str) -> BoxFuture<'a, Result<StatusUpdate, TrackingError>>;
}

/// An image ready for upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    /// Declared MIME type, sniffed from content when not given explicitly.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Wrap in-memory bytes, sniffing the MIME type from the content and
    /// falling back to the file extension.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = sniff_mime(&file_name, &bytes);
        debug!("Image '{}' → {} ({} bytes)", file_name, mime_type, bytes.len());
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Read an image from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SubmissionError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }

    /// Override the sniffed MIME type.
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

fn sniff_mime(file_name: &str, bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .or_else(|_| ImageFormat::from_path(file_name))
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Everything needed for one submission.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub image: ImageUpload,
    /// Topic the writing should address. Required.
    pub topic: String,
    /// Optional motivational/context texts sent alongside the topic.
    pub context: Option<String>,
}

impl SubmissionRequest {
    pub fn new(image: ImageUpload, topic: impl Into<String>) -> Self {
        Self {
            image,
            topic: topic.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Client-side checks, run before any network traffic: topic first, then
    /// MIME type, then size.
    pub fn validate(&self, max_upload_bytes: u64) -> Result<(), SubmissionError> {
        if self.topic.trim().is_empty() {
            return Err(SubmissionError::MissingTopic);
        }
        if !self.image.is_image() {
            return Err(SubmissionError::NotAnImage {
                mime: Some(self.image.mime_type.clone()),
            });
        }
        if self.image.len() > max_upload_bytes {
            return Err(SubmissionError::FileTooLarge {
                size: self.image.len(),
                limit_mb: max_upload_bytes / (1024 * 1024),
            });
        }
        Ok(())
    }

    /// Context text if it carries anything besides whitespace.
    pub fn context_text(&self) -> Option<&str> {
        self.context.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Gateway answer to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub run_id: String,
    /// Server-side status string, e.g. `"ACCEPTED"`.
    pub status: String,
    pub extracted_text: String,
}
