//! Shared fixtures for integration tests: a scripted in-process gateway and
//! a recording observer.

#![allow(dead_code)]

use evalume::{
    AggregatedReport, AnalysisJob, Gateway, ImageUpload, StageStatus, StatusUpdate, Submission,
    SubmissionError, SubmissionRequest, TrackingError, TrackingObserver,
};
use futures::future::{BoxFuture, FutureExt};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

// ── Logging ──────────────────────────────────────────────────────────────────

/// Route crate logs through the test harness; `RUST_LOG` overrides the
/// default `warn` level. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ── Status helpers ───────────────────────────────────────────────────────────

pub fn pending() -> StageStatus {
    StageStatus::Pending
}

pub fn completed(text: &str) -> StageStatus {
    StageStatus::Completed(Some(text.to_string()))
}

pub fn failed(text: &str) -> StageStatus {
    StageStatus::Failed(text.to_string())
}

pub fn update(linguistic: StageStatus, argumentative: StageStatus) -> StatusUpdate {
    StatusUpdate {
        text_extraction: completed("extracted"),
        linguistic_analysis: linguistic,
        argumentative_analysis: argumentative,
    }
}

pub fn network_error(run_id: &str) -> TrackingError {
    TrackingError::Network {
        run_id: run_id.to_string(),
        detail: "connection reset by peer".to_string(),
    }
}

// ── Images ───────────────────────────────────────────────────────────────────

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 120, 40])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

pub fn png_upload() -> ImageUpload {
    ImageUpload::from_bytes("essay.png", png_bytes(64, 48))
}

pub fn request(topic: &str) -> SubmissionRequest {
    SubmissionRequest::new(png_upload(), topic)
}

// ── Scripted gateway ─────────────────────────────────────────────────────────

/// One scripted answer to a status query.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(StatusUpdate),
    Fail(TrackingError),
}

#[derive(Debug, Clone)]
enum SubmitBehaviour {
    Accept { run_id: String, extracted_text: String },
    Reject { status: u16, message: String },
}

/// In-process gateway that plays back a fixed script of status answers.
///
/// Once the script runs out the last `Reply` is repeated. Every status call
/// is timestamped and in-flight calls are counted so tests can check
/// cadence and overlap.
pub struct ScriptedGateway {
    submit: Mutex<SubmitBehaviour>,
    script: Mutex<VecDeque<Step>>,
    last_reply: Mutex<StatusUpdate>,
    latency: Duration,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    queried_runs: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(run_id: &str, steps: Vec<Step>) -> Self {
        init_tracing();
        Self {
            submit: Mutex::new(SubmitBehaviour::Accept {
                run_id: run_id.to_string(),
                extracted_text: "A mountain landscape.".to_string(),
            }),
            script: Mutex::new(steps.into()),
            last_reply: Mutex::new(update(pending(), pending())),
            latency: Duration::ZERO,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            queried_runs: Mutex::new(Vec::new()),
        }
    }

    /// Each status call takes `latency` to answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn rejecting(self, status: u16, message: &str) -> Self {
        *self.submit.lock().unwrap() = SubmitBehaviour::Reject {
            status,
            message: message.to_string(),
        };
        self
    }

    /// Change the run id handed out by the next submission.
    pub fn next_run_id(&self, run_id: &str) {
        *self.submit.lock().unwrap() = SubmitBehaviour::Accept {
            run_id: run_id.to_string(),
            extracted_text: format!("text for {run_id}"),
        };
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn queried_runs(&self) -> Vec<String> {
        self.queried_runs.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even if the query future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Gateway for ScriptedGateway {
    fn submit<'a>(
        &'a self,
        _request: &'a SubmissionRequest,
    ) -> BoxFuture<'a, Result<Submission, SubmissionError>> {
        async move {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            let behaviour = self.submit.lock().unwrap().clone();
            match behaviour {
                SubmitBehaviour::Accept {
                    run_id,
                    extracted_text,
                } => Ok(Submission {
                    run_id,
                    status: "ACCEPTED".to_string(),
                    extracted_text,
                }),
                SubmitBehaviour::Reject { status, message } => {
                    Err(SubmissionError::Rejected { status, message })
                }
            }
        }
        .boxed()
    }

    fn status<'a>(&'a self, run_id: &'a str) -> BoxFuture<'a, Result<StatusUpdate, TrackingError>> {
        async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            self.queried_runs.lock().unwrap().push(run_id.to_string());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(update)) => {
                    *self.last_reply.lock().unwrap() = update.clone();
                    Ok(update)
                }
                Some(Step::Fail(error)) => Err(error),
                None => Ok(self.last_reply.lock().unwrap().clone()),
            }
        }
        .boxed()
    }
}

// ── Recording observer ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    pub polls: AtomicUsize,
    pub updates: Mutex<Vec<AnalysisJob>>,
    pub settled: AtomicUsize,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn updates(&self) -> Vec<AnalysisJob> {
        self.updates.lock().unwrap().clone()
    }
}

impl TrackingObserver for RecordingObserver {
    fn on_poll(&self, _run_id: &str, _attempt: u32) {
        self.polls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_update(&self, job: &AnalysisJob, _aggregated: &AggregatedReport) {
        self.updates.lock().unwrap().push(job.clone());
    }

    fn on_settled(&self, _job: &AnalysisJob, _aggregated: &AggregatedReport) {
        self.settled.fetch_add(1, Ordering::SeqCst);
    }

    fn on_tracking_error(&self, _run_id: &str, error: &TrackingError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

pub fn shared(gateway: ScriptedGateway) -> Arc<ScriptedGateway> {
    Arc::new(gateway)
}
