//! Batch runs against an in-memory `SqliteStore`.

use std::sync::Arc;

use carewatch_core::{
  category::Category,
  engine::RiskEngine,
  fact::Facility,
  profile::ScoringProfile,
  quality::{NEUTRAL_FACTOR, QualitySignals},
};
use carewatch_store_sqlite::SqliteStore;
use chrono::{NaiveDate, TimeZone as _};

use super::*;
use crate::{cancellation, testing::FlakyStore};

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(y, m, d, 2, 0, 0).unwrap() }

/// `count` facilities `IL000..`, each cited once for infection control and
/// every third one also for an IJ pharmacy finding.
async fn seeded(count: usize) -> SqliteStore {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let mut facts = Vec::new();
  for i in 0..count {
    let id = format!("IL{i:03}");
    store
      .upsert_facility(&Facility::new(&id, format!("Facility {i}"), "IL", 80 + i as u32))
      .await
      .unwrap();
    facts.push(Deficiency::standard(&id, date(2024, 1, 15), "F880", "E"));
    if i % 3 == 0 {
      facts.push(Deficiency::standard(&id, date(2024, 1, 15), "F760", "K"));
    }
  }
  store
    .upsert_facility(&Facility::new("WI001", "Lakeshore", "WI", 100))
    .await
    .unwrap();
  store.insert_deficiencies(facts).await.unwrap();
  store
}

fn options(workers: usize, flush_size: usize) -> BatchOptions {
  BatchOptions {
    filter: FacilityFilter::default(),
    calculated_at: at(2024, 6, 1),
    workers,
    flush_size,
  }
}

async fn stored_count<S: RiskStore>(store: &S, ids: &[Facility]) -> usize {
  let mut n = 0;
  for f in ids {
    if store.latest_snapshot(&f.facility_id).await.unwrap().is_some() {
      n += 1;
    }
  }
  n
}

// ─── Runs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scores_and_persists_every_facility() {
  let store = Arc::new(seeded(12).await);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let report = svc.run_batch(options(4, 5), CancelToken::never()).await.unwrap();
  assert_eq!(report.processed, 13);
  assert_eq!(report.errors, 0);
  assert_eq!(report.skipped, 0);
  assert!(!report.cancelled);
  assert_eq!(report.calculated_at, at(2024, 6, 1));

  let all = store.list_facilities(&FacilityFilter::default()).await.unwrap();
  assert_eq!(stored_count(store.as_ref(), &all).await, 13);

  let rows = store.category_rows("IL000", at(2024, 6, 1)).await.unwrap();
  assert_eq!(rows.len(), Category::COUNT);
  assert_eq!(rows[0].category, Category::Pharmacy);
  assert!(rows[0].had_immediate_jeopardy);

  let quiet = store.latest_snapshot("WI001").await.unwrap().unwrap();
  assert_eq!(quiet.overall_score, 0);
  assert_eq!(quiet.data_as_of, None);
}

#[tokio::test]
async fn flushes_in_bounded_batches() {
  let store = Arc::new(FlakyStore::new(seeded(11).await));
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let report = svc.run_batch(options(3, 5), CancelToken::never()).await.unwrap();
  assert_eq!(report.processed, 12);
  assert_eq!(report.flushes, 3);

  assert_eq!(store.flush_sizes(), [5, 5, 2]);
}

#[tokio::test]
async fn filter_limits_the_run() {
  let store = Arc::new(seeded(6).await);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let opts = options(2, 100).with_filter(FacilityFilter {
    state:       Some("WI".into()),
    facility_id: None,
  });
  let report = svc.run_batch(opts, CancelToken::never()).await.unwrap();
  assert_eq!(report.processed, 1);
  assert!(store.latest_snapshot("IL000").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_facility_does_not_abort_the_run() {
  let mut flaky = FlakyStore::new(seeded(8).await);
  flaky.poisoned = Some("IL004".into());
  let store = Arc::new(flaky);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let report = svc.run_batch(options(3, 4), CancelToken::never()).await.unwrap();
  assert_eq!(report.processed, 8);
  assert_eq!(report.errors, 1);
  assert!(store.latest_snapshot("IL004").await.unwrap().is_none());
  assert!(store.latest_snapshot("IL005").await.unwrap().is_some());
}

#[tokio::test]
async fn rerun_with_same_timestamp_is_idempotent() {
  let store = Arc::new(seeded(5).await);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  svc.run_batch(options(2, 3), CancelToken::never()).await.unwrap();
  let first = store.category_rows("IL003", at(2024, 6, 1)).await.unwrap();
  svc.run_batch(options(2, 3), CancelToken::never()).await.unwrap();
  let second = store.category_rows("IL003", at(2024, 6, 1)).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(second.len(), Category::COUNT);
  assert_eq!(store.list_snapshots("IL003", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
  let store = Arc::new(seeded(4).await);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let (handle, token) = cancellation();
  handle.cancel();
  let report = svc.run_batch(options(2, 10), token).await.unwrap();

  assert!(report.cancelled);
  assert_eq!(report.processed, 0);
  assert_eq!(report.skipped, 5);
  assert_eq!(report.flushes, 0);
}

#[tokio::test]
async fn cancellation_still_flushes_dispatched_work() {
  let (handle, token) = cancellation();
  let mut flaky = FlakyStore::new(seeded(60).await);
  flaky.cancel_after = Some(handle);
  let store = Arc::new(flaky);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let report = svc.run_batch(options(1, 1), token).await.unwrap();
  assert!(report.cancelled);
  assert!(report.processed >= 1);
  assert!(report.skipped > 0);
  assert_eq!(report.errors, 0);
  assert_eq!(report.processed + report.skipped, 61);

  let all = store.list_facilities(&FacilityFilter::default()).await.unwrap();
  assert_eq!(stored_count(store.as_ref(), &all).await, report.processed);
}

// ─── Failures ────────────────────────────────────────────────────────────────

/// Neutral signals that panic when asked about one facility.
struct PanicsFor(&'static str);

impl PanicsFor {
  fn check(&self, facility: &Facility) -> f64 {
    assert_ne!(facility.facility_id, self.0, "quality feed crashed");
    NEUTRAL_FACTOR
  }
}

impl QualitySignals for PanicsFor {
  fn quality_level(&self, facility: &Facility, _: Category) -> f64 { self.check(facility) }

  fn quality_trend(&self, facility: &Facility, _: Category) -> f64 { self.check(facility) }

  fn staffing(&self, facility: &Facility, _: Category) -> f64 { self.check(facility) }
}

#[tokio::test]
async fn listing_failure_aborts_before_any_write() {
  let mut flaky = FlakyStore::new(seeded(4).await);
  flaky.fail_listing = true;
  let store = Arc::new(flaky);
  let svc = RiskService::new(Arc::clone(&store), RiskEngine::default());

  let err = svc
    .run_batch(options(2, 2), CancelToken::never())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  assert!(store.flush_sizes().is_empty());

  let all = store.inner.list_facilities(&FacilityFilter::default()).await.unwrap();
  assert_eq!(all.len(), 5);
  assert_eq!(stored_count(&store.inner, &all).await, 0);
}

#[tokio::test]
async fn compute_failure_is_counted_and_the_run_completes() {
  let store = Arc::new(seeded(6).await);
  let engine = RiskEngine::with_quality(ScoringProfile::default(), PanicsFor("IL002"));
  let svc = RiskService::new(Arc::clone(&store), engine);

  let report = svc.run_batch(options(3, 2), CancelToken::never()).await.unwrap();
  assert_eq!(report.errors, 1);
  assert_eq!(report.processed, 6);
  assert_eq!(report.skipped, 0);
  assert!(!report.cancelled);

  assert!(store.latest_snapshot("IL002").await.unwrap().is_none());
  assert!(store.latest_snapshot("IL003").await.unwrap().is_some());
  assert!(store.latest_snapshot("WI001").await.unwrap().is_some());
}
