//! Report aggregation: derive the user-facing report from a job snapshot.
//!
//! [`aggregate`] is a pure function. It holds no state and performs no I/O,
//! so calling it twice on the same snapshot always gives the same answer and
//! the session can re-run it on every update without bookkeeping.

use crate::error::StageFailure;
use crate::job::{AnalysisJob, Stage, StageStatus};
use serde::{Deserialize, Serialize};

/// Title of every report.
pub const REPORT_TITLE: &str = "Image Analysis Report";

/// Display-ready report. Sections are present only for COMPLETED stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub title: String,
    /// Linguistic analysis result.
    pub overview: Option<String>,
    /// Argumentative analysis result.
    pub recommendations: Option<String>,
}

impl AnalysisReport {
    /// Neither section is available yet.
    pub fn is_empty(&self) -> bool {
        self.overview.is_none() && self.recommendations.is_none()
    }

    /// Both sections are available.
    pub fn is_complete(&self) -> bool {
        self.overview.is_some() && self.recommendations.is_some()
    }
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            overview: None,
            recommendations: None,
        }
    }
}

/// Output of [`aggregate`]: the partial report plus stage-failure messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub report: AnalysisReport,
    /// One `"<Stage name> failed: <message>"` entry per FAILED polled stage.
    pub errors: Vec<String>,
}

/// Derive the report for a job snapshot.
pub fn aggregate(job: &AnalysisJob) -> AggregatedReport {
    let report = AnalysisReport {
        title: REPORT_TITLE.to_string(),
        overview: job.linguistic_analysis.completed_result().map(str::to_string),
        recommendations: job
            .argumentative_analysis
            .completed_result()
            .map(str::to_string),
    };

    let errors = Stage::POLLED
        .iter()
        .filter_map(|&stage| match job.stage(stage) {
            StageStatus::Failed(message) => Some(
                StageFailure {
                    stage,
                    message: message.clone(),
                }
                .to_string(),
            ),
            _ => None,
        })
        .collect();

    AggregatedReport { report, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(ling: StageStatus, arg: StageStatus) -> AnalysisJob {
        AnalysisJob {
            run_id: "abc123".into(),
            text_extraction: StageStatus::Completed(Some("A mountain landscape.".into())),
            linguistic_analysis: ling,
            argumentative_analysis: arg,
        }
    }

    #[test]
    fn test_both_pending_yields_empty_report() {
        let out = aggregate(&job(StageStatus::Pending, StageStatus::Pending));
        assert!(out.report.is_empty());
        assert!(out.errors.is_empty());
        assert_eq!(out.report.title, REPORT_TITLE);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let j = job(
            StageStatus::Completed(Some("Clear, vivid prose.".into())),
            StageStatus::Failed("timeout".into()),
        );
        assert_eq!(aggregate(&j), aggregate(&j));
    }

    #[test]
    fn test_failure_does_not_suppress_other_stage() {
        let out = aggregate(&job(
            StageStatus::Completed(Some("Clear, vivid prose.".into())),
            StageStatus::Failed("model overloaded".into()),
        ));
        assert_eq!(out.report.overview.as_deref(), Some("Clear, vivid prose."));
        assert_eq!(out.report.recommendations, None);
        assert_eq!(
            out.errors,
            vec!["Argumentative analysis failed: model overloaded".to_string()]
        );
    }

    #[test]
    fn test_both_failed_lists_linguistic_first() {
        let out = aggregate(&job(
            StageStatus::Failed("a".into()),
            StageStatus::Failed("b".into()),
        ));
        assert!(out.report.is_empty());
        assert_eq!(
            out.errors,
            vec![
                "Linguistic analysis failed: a".to_string(),
                "Argumentative analysis failed: b".to_string()
            ]
        );
    }

    #[test]
    fn test_both_completed_is_complete() {
        let out = aggregate(&job(
            StageStatus::Completed(Some("Clear, vivid prose.".into())),
            StageStatus::Completed(Some("Consider adding a counterargument.".into())),
        ));
        assert!(out.report.is_complete());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_completed_without_payload_is_present_but_empty() {
        let out = aggregate(&job(StageStatus::Completed(None), StageStatus::Pending));
        assert_eq!(out.report.overview.as_deref(), Some(""));
    }
}
