//! Test double shared by the engine's unit tests.

use std::sync::{
  Mutex,
  atomic::{AtomicUsize, Ordering},
};

use carewatch_core::{
  benchmark::{CitationAggregate, StateAggregate},
  fact::{AuditItem, Deficiency, Facility, FacilityFilter},
  history::LookbackWindow,
  snapshot::{BatchWrite, CategoryScoreRow, FacilityRiskSnapshot, SnapshotRecord},
  store::RiskStore,
};
use carewatch_store_sqlite::{Error, SqliteStore};
use chrono::{DateTime, Utc};

use crate::CancelHandle;

/// Delegates to a `SqliteStore`, with switches to make individual reads
/// fail, refuse writes for one facility, or trip a cancel handle after the
/// first flush.
pub(crate) struct FlakyStore {
  pub inner:           SqliteStore,
  /// Snapshot writes for this facility are reported as failures.
  pub poisoned:        Option<String>,
  pub cancel_after:    Option<CancelHandle>,
  /// Peer and state aggregate reads fail.
  pub fail_benchmarks: bool,
  /// Facility listing fails.
  pub fail_listing:    bool,
  flush_sizes:         Mutex<Vec<usize>>,
  flush_counter:       AtomicUsize,
}

impl FlakyStore {
  pub fn new(inner: SqliteStore) -> Self {
    Self {
      inner,
      poisoned: None,
      cancel_after: None,
      fail_benchmarks: false,
      fail_listing: false,
      flush_sizes: Mutex::new(Vec::new()),
      flush_counter: AtomicUsize::new(0),
    }
  }

  pub fn flush_sizes(&self) -> Vec<usize> { self.flush_sizes.lock().unwrap().clone() }
}

fn unavailable(what: &str) -> Error { Error::Decode(format!("{what} unavailable")) }

impl RiskStore for FlakyStore {
  type Error = Error;

  async fn get_facility(&self, facility_id: &str) -> Result<Option<Facility>, Self::Error> {
    self.inner.get_facility(facility_id).await
  }

  async fn list_facilities(&self, filter: &FacilityFilter) -> Result<Vec<Facility>, Self::Error> {
    if self.fail_listing {
      return Err(unavailable("facility listing"));
    }
    self.inner.list_facilities(filter).await
  }

  async fn facility_deficiencies(
    &self,
    facility_id: &str,
    window: LookbackWindow,
  ) -> Result<Vec<Deficiency>, Self::Error> {
    self.inner.facility_deficiencies(facility_id, window).await
  }

  async fn deficiencies_within(
    &self,
    window: LookbackWindow,
    filter: &FacilityFilter,
  ) -> Result<Vec<Deficiency>, Self::Error> {
    self.inner.deficiencies_within(window, filter).await
  }

  async fn peer_aggregate(
    &self,
    facility: &Facility,
    window: LookbackWindow,
  ) -> Result<CitationAggregate, Self::Error> {
    if self.fail_benchmarks {
      return Err(unavailable("peer aggregate"));
    }
    self.inner.peer_aggregate(facility, window).await
  }

  async fn state_aggregates(
    &self,
    window: LookbackWindow,
    state: Option<&str>,
  ) -> Result<Vec<StateAggregate>, Self::Error> {
    if self.fail_benchmarks {
      return Err(unavailable("state aggregates"));
    }
    self.inner.state_aggregates(window, state).await
  }

  async fn audit_items(&self, facility_id: &str) -> Result<Vec<AuditItem>, Self::Error> {
    self.inner.audit_items(facility_id).await
  }

  async fn upsert_snapshots(
    &self,
    records: Vec<SnapshotRecord>,
  ) -> Result<BatchWrite, Self::Error> {
    self.flush_sizes.lock().unwrap().push(records.len());
    let (refused, accepted): (Vec<_>, Vec<_>) = records
      .into_iter()
      .partition(|r| Some(r.facility_id()) == self.poisoned.as_deref());

    let mut write = self.inner.upsert_snapshots(accepted).await?;
    write
      .failures
      .extend(refused.iter().map(|r| (r.facility_id().to_owned(), "refused".to_owned())));

    if self.flush_counter.fetch_add(1, Ordering::SeqCst) == 0 {
      if let Some(handle) = &self.cancel_after {
        handle.cancel();
      }
    }
    Ok(write)
  }

  async fn latest_snapshot(
    &self,
    facility_id: &str,
  ) -> Result<Option<FacilityRiskSnapshot>, Self::Error> {
    self.inner.latest_snapshot(facility_id).await
  }

  async fn list_snapshots(
    &self,
    facility_id: &str,
    limit: usize,
  ) -> Result<Vec<FacilityRiskSnapshot>, Self::Error> {
    self.inner.list_snapshots(facility_id, limit).await
  }

  async fn category_rows(
    &self,
    facility_id: &str,
    calculated_at: DateTime<Utc>,
  ) -> Result<Vec<CategoryScoreRow>, Self::Error> {
    self.inner.category_rows(facility_id, calculated_at).await
  }
}
