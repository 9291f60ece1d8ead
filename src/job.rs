//! Job data model: stages, per-stage status and the tracked job snapshot.
//!
//! An [`AnalysisJob`] is created when a submission succeeds and is mutated
//! only through [`AnalysisJob::apply`]. `apply` enforces monotonic
//! terminality: once a stage is COMPLETED or FAILED, later responses that
//! report it as PENDING are ignored for that stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// One unit of backend analysis work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TextExtraction,
    LinguisticAnalysis,
    ArgumentativeAnalysis,
}

impl Stage {
    /// The two stages the poller watches. Text extraction is answered at
    /// submission time and never polled.
    pub const POLLED: [Stage; 2] = [Stage::LinguisticAnalysis, Stage::ArgumentativeAnalysis];

    /// Human-readable label used in messages, e.g. `"Linguistic analysis"`.
    pub fn label(self) -> &'static str {
        match self {
            Stage::TextExtraction => "Text extraction",
            Stage::LinguisticAnalysis => "Linguistic analysis",
            Stage::ArgumentativeAnalysis => "Argumentative analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    /// Not finished yet (the backend's RUNNING maps here too).
    #[default]
    Pending,
    /// Finished; payload is free text, absent if the backend sent none.
    Completed(Option<String>),
    /// Finished with an error message.
    Failed(String),
}

impl StageStatus {
    /// COMPLETED or FAILED.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending)
    }

    /// Short uppercase name, as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "PENDING",
            StageStatus::Completed(_) => "COMPLETED",
            StageStatus::Failed(_) => "FAILED",
        }
    }

    /// Result text of a COMPLETED stage.
    pub fn completed_result(&self) -> Option<&str> {
        match self {
            StageStatus::Completed(result) => Some(result.as_deref().unwrap_or("")),
            _ => None,
        }
    }
}

/// One status response, decoded from the gateway.
///
/// `text_extraction` is informational only; the job keeps the value it got
/// at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub text_extraction: StageStatus,
    pub linguistic_analysis: StageStatus,
    pub argumentative_analysis: StageStatus,
}

/// What [`AnalysisJob::apply`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// At least one stage changed.
    pub changed: bool,
    /// Number of stages whose regression to PENDING was ignored.
    pub ignored_regressions: usize,
}

/// Snapshot of one submitted image-analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub run_id: String,
    pub text_extraction: StageStatus,
    pub linguistic_analysis: StageStatus,
    pub argumentative_analysis: StageStatus,
}

impl AnalysisJob {
    /// A fresh job: text extraction done, both analyses pending.
    pub fn new(run_id: impl Into<String>, extracted_text: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            text_extraction: StageStatus::Completed(Some(extracted_text.into())),
            linguistic_analysis: StageStatus::Pending,
            argumentative_analysis: StageStatus::Pending,
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageStatus {
        match stage {
            Stage::TextExtraction => &self.text_extraction,
            Stage::LinguisticAnalysis => &self.linguistic_analysis,
            Stage::ArgumentativeAnalysis => &self.argumentative_analysis,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut StageStatus {
        match stage {
            Stage::TextExtraction => &mut self.text_extraction,
            Stage::LinguisticAnalysis => &mut self.linguistic_analysis,
            Stage::ArgumentativeAnalysis => &mut self.argumentative_analysis,
        }
    }

    /// Text returned by the extraction stage at submission time.
    pub fn extracted_text(&self) -> Option<&str> {
        self.text_extraction.completed_result()
    }

    /// Both polled stages are terminal; tracking must stop.
    pub fn is_settled(&self) -> bool {
        Stage::POLLED.iter().all(|s| self.stage(*s).is_terminal())
    }

    /// Merge a status response into the snapshot.
    ///
    /// A terminal stage never goes back to PENDING. A terminal stage may
    /// still be replaced by a different terminal value; the backend is the
    /// authority on results.
    pub fn apply(&mut self, update: StatusUpdate) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        let StatusUpdate {
            linguistic_analysis,
            argumentative_analysis,
            ..
        } = update;

        for (stage, incoming) in [
            (Stage::LinguisticAnalysis, linguistic_analysis),
            (Stage::ArgumentativeAnalysis, argumentative_analysis),
        ] {
            let run_id = self.run_id.clone();
            let current = self.stage_mut(stage);
            if current.is_terminal() && !incoming.is_terminal() {
                warn!(
                    "Run {}: ignoring {} regression {} -> {}",
                    run_id,
                    stage,
                    current.as_str(),
                    incoming.as_str()
                );
                outcome.ignored_regressions += 1;
                continue;
            }
            if *current != incoming {
                *current = incoming;
                outcome.changed = true;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(ling: StageStatus, arg: StageStatus) -> StatusUpdate {
        StatusUpdate {
            text_extraction: StageStatus::Completed(None),
            linguistic_analysis: ling,
            argumentative_analysis: arg,
        }
    }

    #[test]
    fn test_new_job_is_not_settled() {
        let job = AnalysisJob::new("abc123", "A mountain landscape.");
        assert!(!job.is_settled());
        assert_eq!(job.extracted_text(), Some("A mountain landscape."));
    }

    #[test]
    fn test_settles_only_when_both_polled_stages_terminal() {
        let mut job = AnalysisJob::new("r", "t");
        job.apply(update(
            StageStatus::Completed(Some("ok".into())),
            StageStatus::Pending,
        ));
        assert!(!job.is_settled());

        job.apply(update(
            StageStatus::Completed(Some("ok".into())),
            StageStatus::Failed("boom".into()),
        ));
        assert!(job.is_settled());
    }

    #[test]
    fn test_text_extraction_alone_does_not_settle() {
        let mut job = AnalysisJob::new("r", "t");
        let outcome = job.apply(StatusUpdate {
            text_extraction: StageStatus::Completed(Some("t".into())),
            ..Default::default()
        });
        assert!(!outcome.changed);
        assert!(!job.is_settled());
    }

    #[test]
    fn test_terminal_stage_never_reverts_to_pending() {
        let mut job = AnalysisJob::new("r", "t");
        job.apply(update(
            StageStatus::Completed(Some("Clear prose.".into())),
            StageStatus::Failed("x".into()),
        ));

        let outcome = job.apply(update(StageStatus::Pending, StageStatus::Pending));
        assert_eq!(outcome.ignored_regressions, 2);
        assert!(!outcome.changed);
        assert_eq!(
            job.linguistic_analysis,
            StageStatus::Completed(Some("Clear prose.".into()))
        );
        assert_eq!(job.argumentative_analysis, StageStatus::Failed("x".into()));
    }

    #[test]
    fn test_monotonic_over_arbitrary_sequences() {
        let states = [
            StageStatus::Pending,
            StageStatus::Completed(Some("a".into())),
            StageStatus::Failed("f".into()),
        ];
        // Every length-3 sequence of updates for both stages.
        for a in &states {
            for b in &states {
                for c in &states {
                    let mut job = AnalysisJob::new("r", "t");
                    let mut seen_terminal = false;
                    for s in [a, b, c] {
                        job.apply(update(s.clone(), s.clone()));
                        if seen_terminal {
                            assert!(job.linguistic_analysis.is_terminal());
                            assert!(job.argumentative_analysis.is_terminal());
                        }
                        seen_terminal |= job.linguistic_analysis.is_terminal();
                    }
                }
            }
        }
    }

    #[test]
    fn test_stage_status_serde_shape() {
        let json = serde_json::to_value(StageStatus::Failed("nope".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "FAILED", "result": "nope"}));
    }
}
