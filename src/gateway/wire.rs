//! JSON bodies exchanged with the gateway and their conversion into the
//! job model.
//!
//! The backend is loose about types: `result` may be a string, `null`, or
//! (in principle) any JSON value, and stages can be reported as `RUNNING`.
//! Everything is normalised here so the rest of the crate only ever sees
//! [`StageStatus`].

use crate::job::{StageStatus, StatusUpdate};
use serde::Deserialize;
use serde_json::Value;

/// `202 Accepted` body of `POST /analyze-image/`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponseBody {
    pub run_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub extracted_text: String,
}

/// Stage state as spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireStageState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// `{status, result?}` for one stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StageStatusBody {
    pub status: WireStageState,
    #[serde(default)]
    pub result: Value,
}

impl From<StageStatusBody> for StageStatus {
    fn from(body: StageStatusBody) -> Self {
        let result = value_to_text(body.result);
        match body.status {
            WireStageState::Pending | WireStageState::Running => StageStatus::Pending,
            WireStageState::Completed => StageStatus::Completed(result),
            WireStageState::Failed => {
                StageStatus::Failed(result.unwrap_or_else(|| "unknown error".to_string()))
            }
        }
    }
}

/// 2xx body of `GET /status/{run_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponseBody {
    #[serde(default)]
    pub text_extraction: Option<StageStatusBody>,
    pub linguistic_analysis: StageStatusBody,
    pub argumentative_analysis: StageStatusBody,
}

impl From<StatusResponseBody> for StatusUpdate {
    fn from(body: StatusResponseBody) -> Self {
        StatusUpdate {
            text_extraction: body.text_extraction.map(Into::into).unwrap_or_default(),
            linguistic_analysis: body.linguistic_analysis.into(),
            argumentative_analysis: body.argumentative_analysis.into(),
        }
    }
}

/// Error body. FastAPI puts the reason in `detail` (string, or a list of
/// validation problems); other layers use `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Value,
    #[serde(default)]
    pub message: Value,
}

impl ErrorBody {
    /// Parse an error body, tolerating non-JSON.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// `detail`, else `message`.
    pub fn detail_or_message(&self) -> Option<String> {
        value_to_text(self.detail.clone()).or_else(|| value_to_text(self.message.clone()))
    }

    /// `message`, else `detail`.
    pub fn message_or_detail(&self) -> Option<String> {
        value_to_text(self.message.clone()).or_else(|| value_to_text(self.detail.clone()))
    }
}

/// Strings verbatim, `null` as absent, anything else as compact JSON.
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
