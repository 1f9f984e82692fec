//! The `RiskStore` trait: read contracts over facility and deficiency facts,
//! and write contracts for risk snapshots.
//!
//! The trait is implemented by storage backends (e.g.
//! `carewatch-store-sqlite`). The engine and HTTP layers depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  benchmark::{CitationAggregate, StateAggregate},
  fact::{AuditItem, Deficiency, Facility, FacilityFilter},
  history::LookbackWindow,
  snapshot::{BatchWrite, CategoryScoreRow, FacilityRiskSnapshot, SnapshotRecord},
};

/// Abstraction over a facility risk store backend.
///
/// Fact reads never mutate. Snapshot writes are upserts on their natural
/// keys, so re-running a calculation with the same `calculated_at` replaces
/// rather than duplicates.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks in multi-threaded runtimes.
pub trait RiskStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Facility facts ────────────────────────────────────────────────────

  /// Retrieve a facility by id. Returns `None` if not found.
  fn get_facility<'a>(
    &'a self,
    facility_id: &'a str,
  ) -> impl Future<Output = Result<Option<Facility>, Self::Error>> + Send + 'a;

  /// List facilities matching `filter`, ordered by id.
  fn list_facilities<'a>(
    &'a self,
    filter: &'a FacilityFilter,
  ) -> impl Future<Output = Result<Vec<Facility>, Self::Error>> + Send + 'a;

  // ── Deficiency facts ──────────────────────────────────────────────────

  /// All deficiencies of one facility surveyed within `window`.
  fn facility_deficiencies<'a>(
    &'a self,
    facility_id: &'a str,
    window: LookbackWindow,
  ) -> impl Future<Output = Result<Vec<Deficiency>, Self::Error>> + Send + 'a;

  /// Bulk load: every deficiency surveyed within `window` for the
  /// facilities matching `filter`, in one pass.
  fn deficiencies_within<'a>(
    &'a self,
    window: LookbackWindow,
    filter: &'a FacilityFilter,
  ) -> impl Future<Output = Result<Vec<Deficiency>, Self::Error>> + Send + 'a;

  // ── Benchmarks ────────────────────────────────────────────────────────

  /// Standard-citation counts of the facility's peer group: same state,
  /// certified beds within ±25%, excluding the facility itself. Only
  /// citations within `window` count.
  fn peer_aggregate<'a>(
    &'a self,
    facility: &'a Facility,
    window: LookbackWindow,
  ) -> impl Future<Output = Result<CitationAggregate, Self::Error>> + Send + 'a;

  /// Standard-citation counts per state, over every facility of the state.
  /// Only citations within `window` count. `state = None` returns all
  /// states.
  fn state_aggregates<'a>(
    &'a self,
    window: LookbackWindow,
    state: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<StateAggregate>, Self::Error>> + Send + 'a;

  // ── Internal audit ────────────────────────────────────────────────────

  /// Internal audit scorecard items for a facility.
  fn audit_items<'a>(
    &'a self,
    facility_id: &'a str,
  ) -> impl Future<Output = Result<Vec<AuditItem>, Self::Error>> + Send + 'a;

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// Upsert a batch of records. Each record is written in its own
  /// transaction; per-record failures are reported in the returned
  /// [`BatchWrite`] rather than failing the call.
  fn upsert_snapshots(
    &self,
    records: Vec<SnapshotRecord>,
  ) -> impl Future<Output = Result<BatchWrite, Self::Error>> + Send + '_;

  /// The most recent snapshot of a facility by `calculated_at`.
  fn latest_snapshot<'a>(
    &'a self,
    facility_id: &'a str,
  ) -> impl Future<Output = Result<Option<FacilityRiskSnapshot>, Self::Error>> + Send + 'a;

  /// Snapshots of a facility, newest first.
  fn list_snapshots<'a>(
    &'a self,
    facility_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<FacilityRiskSnapshot>, Self::Error>> + Send + 'a;

  /// Category rows of one snapshot, in rank order.
  fn category_rows<'a>(
    &'a self,
    facility_id: &'a str,
    calculated_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<CategoryScoreRow>, Self::Error>> + Send + 'a;
}
