//! Fixed-interval scheduler that never runs two cycles at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::IngestResult;
use crate::source::{CycleOutcome, UpdateJob};
use crate::status::CycleTracker;

/// Shortest interval the loop will run at.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Runs an [`UpdateJob`] now and then at every multiple of `interval`.
///
/// Cycles are awaited inline, so a long cycle delays the loop instead of
/// overlapping with the next one. Due times that pass while a cycle is still
/// running are dropped.
pub struct Scheduler {
    job: Arc<dyn UpdateJob>,
    interval: Duration,
    tracker: Arc<CycleTracker>,
}

impl Scheduler {
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(job: Arc<dyn UpdateJob>, interval: Duration, tracker: Arc<CycleTracker>) -> Self {
        let interval = if interval < MIN_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Scheduler interval too short, using minimum"
            );
            MIN_INTERVAL
        } else {
            interval
        };
        Self {
            job,
            interval,
            tracker,
        }
    }

    pub fn tracker(&self) -> Arc<CycleTracker> {
        self.tracker.clone()
    }

    /// Run a single cycle, logging and recording its result.
    pub async fn run_once(&self) -> IngestResult<CycleOutcome> {
        let result = self.job.run_cycle().await;
        match &result {
            Ok(outcome) => {
                info!(job = %self.job.name(), outcome = %outcome, "Cycle finished");
                self.tracker.record_outcome(outcome);
            }
            Err(e) => {
                error!(
                    job = %self.job.name(),
                    error = %e,
                    error_kind = %e.kind(),
                    "Cycle failed"
                );
                self.tracker.record_failure(e);
            }
        }
        result
    }

    /// Run cycles until `shutdown` fires. A cycle already in flight is allowed
    /// to finish; the signal is only observed while waiting.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            job = %self.job.name(),
            interval_secs = self.interval.as_secs(),
            "Starting scheduler"
        );

        let mut due = Instant::now();

        loop {
            // Failures are already logged and counted.
            let _ = self.run_once().await;

            let (next, skipped) = next_due(due, self.interval, Instant::now());
            if skipped > 0 {
                warn!(
                    job = %self.job.name(),
                    skipped,
                    "Cycle overran its interval, dropping missed ticks"
                );
                self.tracker.record_skipped(skipped);
            }
            due = next;

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep_until(due) => {}
            }
        }
    }
}

/// The first multiple of `period` after `last_due` that is not already in the
/// past, and how many due times were passed over to reach it.
///
/// A zero `period` is due immediately.
pub fn next_due(last_due: Instant, period: Duration, now: Instant) -> (Instant, u64) {
    if period.is_zero() {
        return (now.max(last_due), 0);
    }
    let mut due = last_due + period;
    let mut skipped = 0;
    while due < now {
        due += period;
        skipped += 1;
    }
    (due, skipped)
}
