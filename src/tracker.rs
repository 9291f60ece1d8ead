//! Job poller: submit, track on a fixed cadence, stop on terminal state.
//!
//! ## Lifecycle
//!
//! ```text
//! submit ──▶ start_tracking ──▶ tick ─▶ status ─▶ apply ─▶ settled? ──yes──▶ Settled
//!                                 ▲                           │
//!                                 └────────────no─────────────┘
//!            cancel() / new submit ───────────────────────────────────────▶ Cancelled
//!            status query error ──────────────────────────────────────────▶ Failed
//! ```
//!
//! ## Ordering
//!
//! The tracking task awaits every status response before waiting for the
//! next tick, so at most one query is in flight per job and responses are
//! applied in issue order. Ticks that come due while a query is outstanding
//! are skipped, never queued.
//!
//! ## Cancellation
//!
//! Each tracking session gets a [`CancellationToken`] and a generation
//! number. `cancel()` advances the generation under a lock before firing the
//! token; the task publishes snapshots and observer events only while holding
//! the same lock with its own generation still current. A response that
//! lands after `cancel()` (or after a newer job started) is therefore dropped
//! without touching any visible state.

use crate::config::ClientConfig;
use crate::error::{SubmissionError, TrackingError};
use crate::gateway::{Gateway, Submission, SubmissionRequest};
use crate::job::AnalysisJob;
use crate::progress::{NoopObserver, ObserverRef};
use crate::report::aggregate;
use crate::stream::{report_stream, snapshot_stream, ReportStream, SnapshotStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a tracking session ended.
#[derive(Debug, Clone)]
pub enum TrackingOutcome {
    /// Both watched stages reached a terminal status.
    Settled(AnalysisJob),
    /// A status query failed; `last` is the snapshot before the failure.
    Failed {
        error: TrackingError,
        last: AnalysisJob,
    },
    /// Stopped by `cancel()` or by a newer submission.
    Cancelled(AnalysisJob),
}

impl TrackingOutcome {
    /// Last snapshot the session published.
    pub fn job(&self) -> &AnalysisJob {
        match self {
            TrackingOutcome::Settled(job) | TrackingOutcome::Cancelled(job) => job,
            TrackingOutcome::Failed { last, .. } => last,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, TrackingOutcome::Settled(_))
    }
}

/// Where a tracking session stands, readable without awaiting it.
#[derive(Debug, Clone, Default)]
pub enum TrackingState {
    #[default]
    Running,
    Settled,
    Failed(TrackingError),
    Cancelled,
}

impl TrackingState {
    pub fn is_running(&self) -> bool {
        matches!(self, TrackingState::Running)
    }
}

/// Generation counter guarding everything a tracking task makes visible.
#[derive(Debug, Clone, Default)]
struct Generation(Arc<Mutex<u64>>);

impl Generation {
    fn advance(&self) -> u64 {
        let mut g = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *g += 1;
        *g
    }

    /// Run `f` only if `generation` is still current, holding the lock so
    /// `advance` cannot interleave.
    fn run_if_current<R>(&self, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let g = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if *g == generation {
            Some(f())
        } else {
            None
        }
    }
}

struct ActiveTracking {
    run_id: String,
    token: CancellationToken,
    snapshot: watch::Receiver<AnalysisJob>,
    state: watch::Receiver<TrackingState>,
    handle: Option<JoinHandle<TrackingOutcome>>,
}

/// Owns the lifecycle of one in-flight analysis job.
///
/// At most one job is tracked at a time: starting a new submission or a new
/// tracking session discards the previous one.
pub struct JobPoller {
    gateway: Arc<dyn Gateway>,
    config: ClientConfig,
    observer: ObserverRef,
    generation: Generation,
    active: Option<ActiveTracking>,
}

impl JobPoller {
    pub fn new(gateway: Arc<dyn Gateway>, config: ClientConfig) -> Self {
        Self {
            gateway,
            config,
            observer: Arc::new(NoopObserver),
            generation: Generation::default(),
            active: None,
        }
    }

    /// Receive tracking events.
    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit an image for analysis.
    ///
    /// Validation (topic, MIME type, size) runs first and fails without any
    /// network call. A valid submission discards any job in flight before
    /// contacting the gateway.
    pub async fn submit(
        &mut self,
        request: &SubmissionRequest,
    ) -> Result<Submission, SubmissionError> {
        request.validate(self.config.max_upload_bytes)?;
        self.cancel();
        self.active = None;
        self.gateway.submit(request).await
    }

    /// Submit and, on success, start tracking the new run.
    pub async fn submit_and_track(
        &mut self,
        request: &SubmissionRequest,
    ) -> Result<Submission, SubmissionError> {
        let submission = self.submit(request).await?;
        self.start_tracking(
            submission.run_id.clone(),
            submission.extracted_text.clone(),
        );
        Ok(submission)
    }

    /// Begin polling `run_id` every `poll_interval`.
    ///
    /// The first query fires one interval from now. Any previous session is
    /// cancelled first.
    pub fn start_tracking(&mut self, run_id: impl Into<String>, extracted_text: impl Into<String>) {
        self.track(AnalysisJob::new(run_id, extracted_text));
    }

    /// Begin polling an existing snapshot.
    pub fn track(&mut self, job: AnalysisJob) {
        self.cancel();

        let generation = self.generation.advance();
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(job.clone());
        let (state_tx, state_rx) = watch::channel(TrackingState::Running);
        let run_id = job.run_id.clone();

        info!(
            "Tracking run {} every {}ms",
            run_id, self.config.poll_interval_ms
        );

        let task = TrackingTask {
            gateway: Arc::clone(&self.gateway),
            observer: Arc::clone(&self.observer),
            period: self.config.poll_interval(),
            token: token.clone(),
            gate: self.generation.clone(),
            generation,
            tx,
            state: state_tx,
            job,
        };

        self.active = Some(ActiveTracking {
            run_id,
            token,
            snapshot: rx,
            state: state_rx,
            handle: Some(tokio::spawn(task.run())),
        });
    }

    /// Stop polling now. Idempotent; safe with nothing tracked.
    ///
    /// The last published snapshot stays readable through [`Self::snapshot`].
    pub fn cancel(&mut self) {
        // Advance before firing the token so a response racing with us can
        // no longer publish.
        self.generation.advance();
        if let Some(active) = &self.active {
            if !active.token.is_cancelled() {
                debug!("Cancelling tracking of run {}", active.run_id);
                active.token.cancel();
            }
        }
    }

    /// Forget the current job entirely (cancels it first).
    pub fn clear(&mut self) {
        self.cancel();
        self.active = None;
    }

    /// A tracking task is still running.
    pub fn is_tracking(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|a| a.handle.as_ref())
            .is_some_and(|h| !h.is_finished())
    }

    /// Run id of the current (or last) tracked job.
    pub fn run_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.run_id.as_str())
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Option<AnalysisJob> {
        self.active.as_ref().map(|a| a.snapshot.borrow().clone())
    }

    /// How the current (or last) tracking session stands.
    ///
    /// Becomes `Failed` as soon as a status query fails, before anyone
    /// awaits [`Self::wait`].
    pub fn state(&self) -> Option<TrackingState> {
        self.active.as_ref().map(|a| a.state.borrow().clone())
    }

    /// Watch receiver for the current job's snapshots.
    pub fn subscribe(&self) -> Option<watch::Receiver<AnalysisJob>> {
        self.active.as_ref().map(|a| a.snapshot.clone())
    }

    /// Stream of snapshots: the current one, then every change.
    pub fn updates(&self) -> Option<SnapshotStream> {
        self.subscribe().map(snapshot_stream)
    }

    /// Stream of aggregated reports derived from [`Self::updates`].
    pub fn reports(&self) -> Option<ReportStream> {
        self.subscribe().map(report_stream)
    }

    /// Wait for the current tracking session to end.
    ///
    /// Returns `None` if nothing was tracked or the outcome was already taken.
    pub async fn wait(&mut self) -> Option<TrackingOutcome> {
        let active = self.active.as_mut()?;
        let handle = active.handle.take()?;
        let fallback = active.snapshot.borrow().clone();
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Tracking task for run {} died: {}", fallback.run_id, e);
                Some(TrackingOutcome::Cancelled(fallback))
            }
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State moved into the spawned tracking task.
struct TrackingTask {
    gateway: Arc<dyn Gateway>,
    observer: ObserverRef,
    period: Duration,
    token: CancellationToken,
    gate: Generation,
    generation: u64,
    tx: watch::Sender<AnalysisJob>,
    state: watch::Sender<TrackingState>,
    job: AnalysisJob,
}

impl TrackingTask {
    async fn run(self) -> TrackingOutcome {
        let TrackingTask {
            gateway,
            observer,
            period,
            token,
            gate,
            generation,
            tx,
            state,
            mut job,
        } = self;
        let run_id = job.run_id.clone();

        if gate
            .run_if_current(generation, || observer.on_tracking_start(&run_id))
            .is_none()
        {
            return cancelled(&state, job);
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Tracking of run {} cancelled", run_id);
                    return cancelled(&state, job);
                }
                _ = ticker.tick() => {}
            }

            attempt += 1;
            observer.on_poll(&run_id, attempt);
            debug!("Run {}: status query #{}", run_id, attempt);

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Run {}: dropping in-flight status query #{}", run_id, attempt);
                    return cancelled(&state, job);
                }
                r = gateway.status(&run_id) => r,
            };

            match result {
                Err(err) => {
                    let surfaced = gate.run_if_current(generation, || {
                        error!(
                            "Run {}: status query #{} failed, stopping: {}",
                            run_id,
                            attempt,
                            err.detail()
                        );
                        observer.on_tracking_error(&run_id, &err);
                        state.send_replace(TrackingState::Failed(err.clone()));
                    });
                    return match surfaced {
                        Some(()) => TrackingOutcome::Failed {
                            error: err,
                            last: job,
                        },
                        None => {
                            debug!("Run {}: late failure dropped", run_id);
                            cancelled(&state, job)
                        }
                    };
                }
                Ok(update) => {
                    let mut next = job.clone();
                    let applied = next.apply(update);
                    if applied.ignored_regressions > 0 {
                        warn!(
                            "Run {}: {} stage regression(s) ignored on query #{}",
                            run_id, applied.ignored_regressions, attempt
                        );
                    }
                    let settled = next.is_settled();

                    let published = gate.run_if_current(generation, || {
                        let aggregated = aggregate(&next);
                        if applied.changed {
                            tx.send_replace(next.clone());
                            observer.on_update(&next, &aggregated);
                        }
                        if settled {
                            info!("Run {}: both analyses terminal after {} queries", run_id, attempt);
                            observer.on_settled(&next, &aggregated);
                            state.send_replace(TrackingState::Settled);
                        }
                    });
                    if published.is_none() {
                        debug!("Run {}: stale response #{} discarded", run_id, attempt);
                        return cancelled(&state, job);
                    }

                    job = next;
                    if settled {
                        return TrackingOutcome::Settled(job);
                    }
                }
            }
        }
    }
}

fn cancelled(state: &watch::Sender<TrackingState>, job: AnalysisJob) -> TrackingOutcome {
    state.send_replace(TrackingState::Cancelled);
    TrackingOutcome::Cancelled(job)
}
