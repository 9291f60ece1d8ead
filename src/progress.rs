//! Observer trait for tracking events.
//!
//! Inject an [`Arc<dyn TrackingObserver>`] via
//! [`crate::tracker::JobPoller::with_observer`] to be told about each poll
//! and each snapshot change as the job progresses. The CLI uses this to drive
//! its live status line; tests use it to count polls.
//!
//! # Example
//!
//! ```rust
//! use evalume::TrackingObserver;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct PollCounter(AtomicUsize);
//!
//! impl TrackingObserver for PollCounter {
//!     fn on_poll(&self, _run_id: &str, _attempt: u32) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::TrackingError;
use crate::job::AnalysisJob;
use crate::report::AggregatedReport;
use std::sync::Arc;

/// Called by the tracking task as a job progresses.
///
/// All methods have default no-op implementations. Calls for one job are
/// strictly sequential (one status query in flight at a time), but they come
/// from the spawned tracking task, hence `Send + Sync`.
pub trait TrackingObserver: Send + Sync {
    /// Tracking started for `run_id`.
    fn on_tracking_start(&self, run_id: &str) {
        let _ = run_id;
    }

    /// A status query is about to be issued. `attempt` is 1-based.
    fn on_poll(&self, run_id: &str, attempt: u32) {
        let _ = (run_id, attempt);
    }

    /// A status response changed the snapshot.
    fn on_update(&self, job: &AnalysisJob, aggregated: &AggregatedReport) {
        let _ = (job, aggregated);
    }

    /// Both watched stages are terminal; polling has stopped.
    fn on_settled(&self, job: &AnalysisJob, aggregated: &AggregatedReport) {
        let _ = (job, aggregated);
    }

    /// A status query failed; polling has stopped.
    fn on_tracking_error(&self, run_id: &str, error: &TrackingError) {
        let _ = (run_id, error);
    }
}

/// Observer that ignores everything. Default when none is configured.
pub struct NoopObserver;

impl TrackingObserver for NoopObserver {}

/// Shared observer handle.
pub type ObserverRef = Arc<dyn TrackingObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        polls: AtomicUsize,
        updates: AtomicUsize,
        errors: AtomicUsize,
    }

    impl TrackingObserver for Counting {
        fn on_poll(&self, _run_id: &str, _attempt: u32) {
            self.polls.fetch_add(1, Ordering::SeqCst);
        }

        fn on_update(&self, _job: &AnalysisJob, _aggregated: &AggregatedReport) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tracking_error(&self, _run_id: &str, _error: &TrackingError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_observer_does_not_panic() {
        let job = AnalysisJob::new("r", "t");
        let agg = aggregate(&job);
        let obs = NoopObserver;
        obs.on_tracking_start("r");
        obs.on_poll("r", 1);
        obs.on_update(&job, &agg);
        obs.on_settled(&job, &agg);
    }

    #[test]
    fn test_arc_dyn_observer_dispatches() {
        let counting = Arc::new(Counting::default());
        let obs: ObserverRef = counting.clone();
        let job = AnalysisJob::new("r", "t");
        obs.on_poll("r", 1);
        obs.on_poll("r", 2);
        obs.on_update(&job, &aggregate(&job));
        obs.on_tracking_error(
            "r",
            &TrackingError::Network {
                run_id: "r".into(),
                detail: "reset".into(),
            },
        );
        assert_eq!(counting.polls.load(Ordering::SeqCst), 2);
        assert_eq!(counting.updates.load(Ordering::SeqCst), 1);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    }
}
