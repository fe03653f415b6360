//! End-to-end update cycles against the in-memory catalog and toolchain.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use eumdac_client::Credentials;
use meteosat_ingest::{
    CycleOutcome, CycleTracker, Dataset, ErrorKind, IngestConfig, MeteosatSource, Scheduler,
};
use test_utils::{
    entry_count, files_under, native_archive, product_at, product_id_for, utc, FailurePlan,
    FakeCatalog, FakeTools, Stage, TestDirs,
};

struct Harness {
    dirs: TestDirs,
    plan: FailurePlan,
    catalog: Arc<FakeCatalog>,
    tools: FakeTools,
    source: Arc<MeteosatSource>,
}

impl Harness {
    fn new() -> Self {
        let dirs = TestDirs::new();
        let plan = FailurePlan::new();
        let catalog = Arc::new(FakeCatalog::new(plan.clone()));
        let tools = FakeTools::new(plan.clone());

        let mut config = IngestConfig::new(
            Credentials::new("key", "secret"),
            dirs.state_dir.clone(),
            dirs.output_dir.clone(),
        );
        config.temp_dir = Some(dirs.work_dir.clone());

        let source = MeteosatSource::new(
            &config,
            Dataset::meteosat(),
            catalog.clone(),
            tools.toolchain(),
        )
        .unwrap();

        Self {
            dirs,
            plan,
            catalog,
            tools,
            source: Arc::new(source),
        }
    }

    fn publish(&self, date: DateTime<Utc>) {
        let product = product_at(date);
        let payload = format!("native:{}", product.identifier);
        self.catalog
            .publish(product.clone(), native_archive(&product.identifier, payload.as_bytes()));
    }

    fn state_bytes(&self) -> Vec<u8> {
        std::fs::read(self.source.store().path()).unwrap()
    }

    fn cursor(&self) -> Option<DateTime<Utc>> {
        self.source.store().read().unwrap().date
    }

    fn outputs(&self) -> Vec<PathBuf> {
        files_under(&self.dirs.output_dir)
    }

    /// Output paths with their contents.
    fn output_contents(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.outputs()
            .into_iter()
            .map(|p| {
                let bytes = std::fs::read(self.dirs.output_dir.join(&p)).unwrap();
                (p, bytes)
            })
            .collect()
    }
}

/// 14:37:12 on the test day.
fn wall_clock() -> DateTime<Utc> {
    utc(2024, 1, 15, 14, 37) + Duration::seconds(12)
}

fn expected_outputs(stamp: &str) -> Vec<PathBuf> {
    vec![
        PathBuf::from(format!("ir108_3d/band1_ir108_3d_{}.tif", stamp)),
        PathBuf::from(format!(
            "natural_color_with_night_ir_hires/band1_natural_color_with_night_ir_hires_{}.tif",
            stamp
        )),
        PathBuf::from(format!(
            "natural_color_with_night_ir_hires/band2_natural_color_with_night_ir_hires_{}.tif",
            stamp
        )),
        PathBuf::from(format!(
            "natural_color_with_night_ir_hires/band3_natural_color_with_night_ir_hires_{}.tif",
            stamp
        )),
    ]
}

#[tokio::test]
async fn test_first_cycle_processes_bootstrap_scene() {
    let h = Harness::new();
    let target = utc(2024, 1, 15, 13, 15);
    h.publish(target);

    let outcome = h.source.update_at(wall_clock()).await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Processed {
            target,
            product_id: product_id_for(target),
        }
    );
    assert_eq!(h.outputs(), expected_outputs("2024-01-15T13:15:00.000Z"));
    assert_eq!(h.cursor(), Some(target));

    let state: serde_json::Value = serde_json::from_slice(&h.state_bytes()).unwrap();
    assert_eq!(state["date"], "2024-01-15T13:15:00Z");
    assert!(state["last_updated"].is_string());

    // Working area removed, no stray temp files next to the state
    assert_eq!(entry_count(&h.dirs.work_dir), 0);
    assert_eq!(files_under(&h.dirs.state_dir), vec![PathBuf::from("meteosat.json")]);
}

#[tokio::test]
async fn test_exported_band_carries_clip_and_decode() {
    let h = Harness::new();
    let target = utc(2024, 1, 15, 13, 15);
    h.publish(target);

    h.source.update_at(wall_clock()).await.unwrap();

    let band = std::fs::read_to_string(
        h.dirs
            .output_dir
            .join("ir108_3d/band1_ir108_3d_2024-01-15T13:15:00.000Z.tif"),
    )
    .unwrap();
    assert!(band.starts_with("band1:clip[-25.36"), "{}", band);
    assert!(
        band.ends_with(&format!("ir108_3d:native:{}", product_id_for(target))),
        "{}",
        band
    );
}

#[tokio::test]
async fn test_not_available_leaves_everything_untouched() {
    let h = Harness::new();
    let before = h.state_bytes();

    let outcome = h.source.update_at(wall_clock()).await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::NotAvailable {
            target: utc(2024, 1, 15, 13, 15)
        }
    );
    assert_eq!(h.state_bytes(), before);
    assert!(h.outputs().is_empty());
    assert_eq!(h.catalog.download_count(), 0);
    assert_eq!(
        h.catalog.search_windows(),
        vec![(utc(2024, 1, 15, 12, 45), utc(2024, 1, 15, 13, 45))]
    );
}

#[tokio::test]
async fn test_neighbouring_scenes_do_not_match() {
    let h = Harness::new();
    h.publish(utc(2024, 1, 15, 13, 13));
    h.publish(utc(2024, 1, 15, 13, 17));

    let outcome = h.source.update_at(wall_clock()).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::NotAvailable { .. }));
    assert_eq!(h.catalog.download_count(), 0);
    assert_eq!(h.cursor(), None);
}

#[tokio::test]
async fn test_cursor_advances_one_step_per_cycle() {
    let h = Harness::new();
    for minute in [15, 30, 45] {
        h.publish(utc(2024, 1, 15, 13, minute));
    }

    let mut seen = Vec::new();
    for _ in 0..5 {
        h.source.update_at(wall_clock()).await.unwrap();
        seen.push(h.cursor());
    }

    assert_eq!(
        seen,
        vec![
            Some(utc(2024, 1, 15, 13, 15)),
            Some(utc(2024, 1, 15, 13, 30)),
            Some(utc(2024, 1, 15, 13, 45)),
            Some(utc(2024, 1, 15, 13, 45)),
            Some(utc(2024, 1, 15, 13, 45)),
        ]
    );
    assert_eq!(h.catalog.download_count(), 3);
    assert_eq!(h.outputs().len(), 12);
}

#[tokio::test]
async fn test_resumes_from_persisted_cursor() {
    let h = Harness::new();
    h.source.store().commit(utc(2024, 1, 14, 23, 45)).unwrap();
    h.publish(utc(2024, 1, 15, 0, 0));

    let outcome = h.source.update_at(wall_clock()).await.unwrap();

    // History wins over the wall clock, including across midnight
    assert_eq!(outcome.target(), utc(2024, 1, 15, 0, 0));
    assert_eq!(h.cursor(), Some(utc(2024, 1, 15, 0, 0)));
}

#[tokio::test]
async fn test_stage_failures_never_commit() {
    let cases = [
        (Stage::Download, ErrorKind::Remote),
        (Stage::Decode, ErrorKind::Processing),
        (Stage::Clip, ErrorKind::Processing),
        (Stage::Export, ErrorKind::Processing),
    ];

    for (stage, kind) in cases {
        let h = Harness::new();
        let target = utc(2024, 1, 15, 13, 15);
        h.publish(target);
        let before = h.state_bytes();

        h.plan.fail(stage);
        let err = h.source.update_at(wall_clock()).await.unwrap_err();

        assert_eq!(err.kind(), kind, "{:?}: {}", stage, err);
        assert_eq!(h.state_bytes(), before, "{:?} changed the state", stage);
        assert_eq!(entry_count(&h.dirs.work_dir), 0, "{:?} left a working area", stage);

        // The next cycle retries the same scene and succeeds
        h.plan.clear();
        let outcome = h.source.update_at(wall_clock()).await.unwrap();
        assert_eq!(outcome.target(), target, "{:?}", stage);
        assert_eq!(h.outputs(), expected_outputs("2024-01-15T13:15:00.000Z"));
    }
}

#[tokio::test]
async fn test_retry_after_lost_commit_is_idempotent() {
    let h = Harness::new();
    let target = utc(2024, 1, 15, 13, 15);
    h.publish(target);
    let before = h.state_bytes();

    h.source.update_at(wall_clock()).await.unwrap();
    let first = h.output_contents();

    // Roll the cursor back as if the commit had never landed
    std::fs::write(h.source.store().path(), &before).unwrap();
    h.source.update_at(wall_clock()).await.unwrap();

    let second = h.output_contents();

    assert_eq!(first, second);
    assert_eq!(h.cursor(), Some(target));
    assert_eq!(h.tools.export_calls(), 8);
}

#[tokio::test]
async fn test_leftover_working_area_does_not_leak_into_retry() {
    let target = utc(2024, 1, 15, 13, 15);

    let clean = Harness::new();
    clean.publish(target);
    clean.source.update_at(wall_clock()).await.unwrap();

    // A crashed earlier attempt left its working area behind
    let h = Harness::new();
    h.publish(target);
    let leftover = h.dirs.work_dir.join("meteosat-leftover");
    std::fs::create_dir_all(&leftover).unwrap();
    let half_native = leftover.join(format!("{}.nat", product_id_for(target)));
    std::fs::write(&half_native, b"native:trunc").unwrap();
    let stale_raster = leftover.join("ir108_3d.tif");
    std::fs::write(&stale_raster, b"stale decode").unwrap();

    let outcome = h.source.update_at(wall_clock()).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Processed { .. }));
    assert_eq!(h.output_contents(), clean.output_contents());
    assert_eq!(h.cursor(), Some(target));

    // The old area is neither reused nor cleaned up; only it remains
    assert_eq!(std::fs::read(&half_native).unwrap(), b"native:trunc");
    assert_eq!(std::fs::read(&stale_raster).unwrap(), b"stale decode");
    assert_eq!(entry_count(&h.dirs.work_dir), 1);
}

#[tokio::test]
async fn test_search_failure_is_remote() {
    let h = Harness::new();
    h.publish(utc(2024, 1, 15, 13, 15));
    let before = h.state_bytes();

    h.plan.fail(Stage::Search);
    let err = h.source.update_at(wall_clock()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(h.state_bytes(), before);
    assert_eq!(h.catalog.download_count(), 0);
}

#[tokio::test]
async fn test_listed_but_missing_archive_is_remote() {
    let h = Harness::new();
    h.catalog.list_only(product_at(utc(2024, 1, 15, 13, 15)));

    let err = h.source.update_at(wall_clock()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(h.cursor(), None);
    assert_eq!(entry_count(&h.dirs.work_dir), 0);
}

#[tokio::test]
async fn test_corrupt_state_stops_before_search() {
    let h = Harness::new();
    std::fs::write(h.source.store().path(), b"{\"date\": 12").unwrap();

    let err = h.source.update_at(wall_clock()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(h.catalog.search_windows().is_empty());
}

#[tokio::test]
async fn test_scheduler_records_source_outcomes() {
    let h = Harness::new();
    let tracker = Arc::new(CycleTracker::new());
    let scheduler = Scheduler::new(
        h.source.clone(),
        std::time::Duration::from_secs(900),
        tracker.clone(),
    );

    // Runs against the real clock; nothing is published so the scene is missing
    let outcome = scheduler.run_once().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::NotAvailable { .. }));
    let report = tracker.snapshot();
    assert_eq!(report.cycles_run, 1);
    assert_eq!(report.not_available, 1);
}
