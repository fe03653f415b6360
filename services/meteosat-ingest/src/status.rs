//! Record of recent cycles, shared with the status server.
//!
//! Counters are kept in memory for `/status` and also emitted through the
//! `metrics` facade for `/metrics`.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::error::IngestError;
use crate::source::CycleOutcome;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycles_run: u64,
    pub processed: u64,
    pub not_available: u64,
    pub failures: u64,
    pub skipped_ticks: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct CycleTracker {
    report: RwLock<CycleReport>,
}

impl CycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: &CycleOutcome) {
        let label = match outcome {
            CycleOutcome::Processed { .. } => "processed",
            CycleOutcome::NotAvailable { .. } => "not_available",
        };
        counter!("meteosat_cycles_total", "outcome" => label).increment(1);

        let mut report = self.write();
        report.cycles_run += 1;
        match outcome {
            CycleOutcome::Processed { .. } => report.processed += 1,
            CycleOutcome::NotAvailable { .. } => report.not_available += 1,
        }
        report.last_cycle_at = Some(Utc::now());
        report.last_outcome = Some(outcome.to_string());
        report.last_error = None;
    }

    pub fn record_failure(&self, error: &IngestError) {
        counter!("meteosat_cycles_total", "outcome" => "failed").increment(1);
        counter!("meteosat_cycle_failures_total", "error_kind" => error.kind().as_str())
            .increment(1);

        let mut report = self.write();
        report.cycles_run += 1;
        report.failures += 1;
        report.last_cycle_at = Some(Utc::now());
        report.last_outcome = Some(format!("failed ({})", error.kind()));
        report.last_error = Some(error.to_string());
    }

    pub fn record_skipped(&self, ticks: u64) {
        counter!("meteosat_skipped_ticks_total").increment(ticks);
        self.write().skipped_ticks += ticks;
    }

    pub fn snapshot(&self) -> CycleReport {
        match self.report.read() {
            Ok(report) => report.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CycleReport> {
        self.report
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use chrono::TimeZone;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_counts_outcomes_and_failures() {
        let tracker = CycleTracker::new();
        let target = Utc.with_ymd_and_hms(2024, 1, 15, 13, 15, 0).unwrap();

        tracker.record_outcome(&CycleOutcome::NotAvailable { target });
        tracker.record_failure(&IngestError::Archive("no native file".to_string()));
        tracker.record_outcome(&CycleOutcome::Processed {
            target,
            product_id: "scene".to_string(),
        });
        tracker.record_skipped(2);

        let report = tracker.snapshot();
        assert_eq!(report.cycles_run, 3);
        assert_eq!(report.not_available, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped_ticks, 2);
        assert_eq!(
            report.last_outcome.as_deref(),
            Some("processed 2024-01-15T13:15:00Z (scene)")
        );
        assert!(report.last_error.is_none());
    }

    #[test]
    fn test_counters_reach_metrics_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let tracker = CycleTracker::new();
        let target = Utc.with_ymd_and_hms(2024, 1, 15, 13, 15, 0).unwrap();

        metrics::with_local_recorder(&recorder, || {
            tracker.record_outcome(&CycleOutcome::NotAvailable { target });
            tracker.record_failure(&IngestError::Archive("no native file".to_string()));
            tracker.record_skipped(3);
        });

        let rendered = handle.render();
        assert!(
            rendered.contains(r#"meteosat_cycles_total{outcome="not_available"} 1"#),
            "{}",
            rendered
        );
        assert!(
            rendered.contains(r#"meteosat_cycle_failures_total{error_kind="processing"} 1"#),
            "{}",
            rendered
        );
        assert!(rendered.contains("meteosat_skipped_ticks_total 3"), "{}", rendered);
    }

    #[test]
    fn test_failure_keeps_error_text() {
        let tracker = CycleTracker::new();
        tracker.record_failure(&IngestError::Archive("no native file".to_string()));
        let report = tracker.snapshot();
        assert_eq!(report.last_outcome.as_deref(), Some("failed (processing)"));
        assert_eq!(
            report.last_error.as_deref(),
            Some("Archive error: no native file")
        );
    }
}
