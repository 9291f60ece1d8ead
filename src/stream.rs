//! Streaming view of a tracked job.
//!
//! The tracking task is the only writer of the job snapshot and publishes it
//! through a `tokio::sync::watch` channel. These helpers turn the receiving
//! side into a `Stream` so callers can `while let Some(..) = s.next().await`
//! instead of juggling `changed()` themselves. Intermediate snapshots may be
//! coalesced if the consumer is slow; the latest one is always delivered.

use crate::job::AnalysisJob;
use crate::report::{aggregate, AggregatedReport};
use std::pin::Pin;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

/// A boxed stream of job snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = AnalysisJob> + Send>>;

/// A boxed stream of aggregated reports.
pub type ReportStream = Pin<Box<dyn Stream<Item = AggregatedReport> + Send>>;

/// Current snapshot first, then each change. Ends when tracking stops.
pub fn snapshot_stream(rx: watch::Receiver<AnalysisJob>) -> SnapshotStream {
    Box::pin(WatchStream::new(rx))
}

/// Like [`snapshot_stream`], mapped through [`aggregate`].
pub fn report_stream(rx: watch::Receiver<AnalysisJob>) -> ReportStream {
    Box::pin(WatchStream::new(rx).map(|job| aggregate(&job)))
}
