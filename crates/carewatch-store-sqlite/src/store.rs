//! [`SqliteStore`]: the SQLite implementation of [`RiskStore`].

use std::{collections::BTreeMap, path::Path};

use carewatch_core::{
  benchmark::{CitationAggregate, StateAggregate},
  fact::{AuditItem, Deficiency, Facility, FacilityFilter},
  history::LookbackWindow,
  snapshot::{BatchWrite, CategoryScoreRow, FacilityRiskSnapshot, SnapshotRecord},
  store::RiskStore,
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use crate::{
  Result,
  encode::{
    EncodedRecord, FACILITY_COLUMNS, RawAuditItem, RawCategoryRow, RawDeficiency, RawFacility,
    RawSnapshot, encode_date, encode_dt, encode_window,
  },
  schema::SCHEMA,
};

const SNAPSHOT_COLUMNS: &str = "facility_id, calculated_at, model_version, overall_score,
   overall_tier, key_metrics, ranked_categories, data_as_of";

const CATEGORY_COLUMNS: &str = "facility_id, category_id, calculated_at, rank, citation_count,
   severity_weighted_count, repeat_count, had_immediate_jeopardy, had_harm,
   citation_factor, peer_factor, quality_level_factor, quality_trend_factor,
   staffing_factor, composite_score";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Carewatch risk store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Fact loading ──────────────────────────────────────────────────────────

  /// Insert or replace a facility.
  pub async fn upsert_facility(&self, facility: &Facility) -> Result<()> {
    let raw = RawFacility::from_facility(facility);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO facilities ({FACILITY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT (facility_id) DO UPDATE SET
               name = excluded.name,
               state = excluded.state,
               certified_beds = excluded.certified_beds,
               ownership_type = excluded.ownership_type,
               overall_rating = excluded.overall_rating,
               health_rating = excluded.health_rating,
               staffing_rating = excluded.staffing_rating,
               qm_rating = excluded.qm_rating,
               special_focus = excluded.special_focus,
               fine_count = excluded.fine_count,
               fine_total = excluded.fine_total,
               staffing_hours = excluded.staffing_hours,
               staff_turnover = excluded.staff_turnover,
               occupancy_rate = excluded.occupancy_rate"
          ),
          rusqlite::params![
            raw.facility_id,
            raw.name,
            raw.state,
            raw.certified_beds,
            raw.ownership_type,
            raw.overall_rating,
            raw.health_rating,
            raw.staffing_rating,
            raw.qm_rating,
            raw.special_focus,
            raw.fine_count,
            raw.fine_total,
            raw.staffing_hours,
            raw.staff_turnover,
            raw.occupancy_rate,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append deficiency facts in a single transaction.
  pub async fn insert_deficiencies(&self, facts: Vec<Deficiency>) -> Result<usize> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO deficiencies
               (facility_id, survey_date, citation_code, severity, is_standard, is_complaint, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for fact in &facts {
            stmt.execute(rusqlite::params![
              fact.facility_id,
              encode_date(fact.survey_date),
              fact.citation_code,
              fact.severity,
              fact.is_standard,
              fact.is_complaint,
              fact.text,
            ])?;
          }
        }
        tx.commit()?;
        Ok(facts.len())
      })
      .await
      .map_err(Into::into)
  }

  /// Insert or replace internal audit scorecard items.
  pub async fn upsert_audit_items(&self, items: Vec<AuditItem>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO audit_items (item_id, facility_id, category_id, title, score)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (item_id) DO UPDATE SET
               facility_id = excluded.facility_id,
               category_id = excluded.category_id,
               title = excluded.title,
               score = excluded.score",
          )?;
          for item in &items {
            stmt.execute(rusqlite::params![
              item.item_id,
              item.facility_id,
              item.category.id(),
              item.title,
              item.score,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Write one snapshot and its category rows in their own transaction.
fn write_record(conn: &mut rusqlite::Connection, record: &EncodedRecord) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;
  let s = &record.snapshot;
  tx.execute(
    &format!(
      "INSERT INTO facility_risk_snapshots ({SNAPSHOT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT (facility_id, calculated_at) DO UPDATE SET
         model_version = excluded.model_version,
         overall_score = excluded.overall_score,
         overall_tier = excluded.overall_tier,
         key_metrics = excluded.key_metrics,
         ranked_categories = excluded.ranked_categories,
         data_as_of = excluded.data_as_of"
    ),
    rusqlite::params![
      s.facility_id,
      s.calculated_at,
      s.model_version,
      s.overall_score,
      s.overall_tier,
      s.key_metrics,
      s.ranked_categories,
      s.data_as_of,
    ],
  )?;

  {
    let mut stmt = tx.prepare(&format!(
      "INSERT INTO category_scores ({CATEGORY_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
       ON CONFLICT (facility_id, category_id, calculated_at) DO UPDATE SET
         rank = excluded.rank,
         citation_count = excluded.citation_count,
         severity_weighted_count = excluded.severity_weighted_count,
         repeat_count = excluded.repeat_count,
         had_immediate_jeopardy = excluded.had_immediate_jeopardy,
         had_harm = excluded.had_harm,
         citation_factor = excluded.citation_factor,
         peer_factor = excluded.peer_factor,
         quality_level_factor = excluded.quality_level_factor,
         quality_trend_factor = excluded.quality_trend_factor,
         staffing_factor = excluded.staffing_factor,
         composite_score = excluded.composite_score"
    ))?;
    for r in &record.rows {
      stmt.execute(rusqlite::params![
        r.facility_id,
        r.category_id,
        r.calculated_at,
        r.rank,
        r.citation_count,
        r.severity_weighted_count,
        r.repeat_count,
        r.had_immediate_jeopardy,
        r.had_harm,
        r.citation_factor,
        r.peer_factor,
        r.quality_level_factor,
        r.quality_trend_factor,
        r.staffing_factor,
        r.composite_score,
      ])?;
    }
  }

  tx.commit()
}

/// Read `(code, count)` rows into an aggregate's code map.
fn collect_code_counts(
  stmt: &mut rusqlite::Statement<'_>,
  params: impl rusqlite::Params,
) -> rusqlite::Result<BTreeMap<String, u64>> {
  let rows = stmt.query_map(params, |row| {
    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
  })?;
  let mut counts = BTreeMap::new();
  for row in rows {
    let (code, n) = row?;
    *counts.entry(code.trim().to_ascii_uppercase()).or_insert(0) += n.max(0) as u64;
  }
  Ok(counts)
}

// ─── RiskStore impl ──────────────────────────────────────────────────────────

impl RiskStore for SqliteStore {
  type Error = crate::Error;

  // ── Facility facts ────────────────────────────────────────────────────────

  async fn get_facility(&self, facility_id: &str) -> Result<Option<Facility>> {
    let id = facility_id.to_owned();

    let raw: Option<RawFacility> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {FACILITY_COLUMNS} FROM facilities WHERE facility_id = ?1"),
            rusqlite::params![id],
            RawFacility::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawFacility::into_facility).transpose()
  }

  async fn list_facilities(&self, filter: &FacilityFilter) -> Result<Vec<Facility>> {
    let state = filter.state.as_deref().map(str::to_ascii_uppercase);
    let facility_id = filter.facility_id.clone();

    let raws: Vec<RawFacility> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACILITY_COLUMNS} FROM facilities
           WHERE (?1 IS NULL OR state = ?1)
             AND (?2 IS NULL OR facility_id = ?2)
           ORDER BY facility_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![state, facility_id], RawFacility::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFacility::into_facility).collect()
  }

  // ── Deficiency facts ──────────────────────────────────────────────────────

  async fn facility_deficiencies(
    &self,
    facility_id: &str,
    window: LookbackWindow,
  ) -> Result<Vec<Deficiency>> {
    let id = facility_id.to_owned();
    let (start, end) = encode_window(window);

    let raws: Vec<RawDeficiency> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT facility_id, survey_date, citation_code, severity,
                  is_standard, is_complaint, text
           FROM deficiencies
           WHERE facility_id = ?1 AND survey_date BETWEEN ?2 AND ?3
           ORDER BY survey_date, deficiency_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id, start, end], RawDeficiency::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDeficiency::into_deficiency).collect()
  }

  async fn deficiencies_within(
    &self,
    window: LookbackWindow,
    filter: &FacilityFilter,
  ) -> Result<Vec<Deficiency>> {
    let (start, end) = encode_window(window);
    let state = filter.state.as_deref().map(str::to_ascii_uppercase);
    let facility_id = filter.facility_id.clone();

    let raws: Vec<RawDeficiency> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.facility_id, d.survey_date, d.citation_code, d.severity,
                  d.is_standard, d.is_complaint, d.text
           FROM deficiencies d
           JOIN facilities f ON f.facility_id = d.facility_id
           WHERE d.survey_date BETWEEN ?1 AND ?2
             AND (?3 IS NULL OR f.state = ?3)
             AND (?4 IS NULL OR d.facility_id = ?4)
           ORDER BY d.facility_id, d.survey_date, d.deficiency_id",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![start, end, state, facility_id],
            RawDeficiency::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDeficiency::into_deficiency).collect()
  }

  // ── Benchmarks ────────────────────────────────────────────────────────────

  async fn peer_aggregate(
    &self,
    facility: &Facility,
    window: LookbackWindow,
  ) -> Result<CitationAggregate> {
    let (low, high) = facility.peer_bed_band();
    let state = facility.state.to_ascii_uppercase();
    let id = facility.facility_id.clone();
    let (start, end) = encode_window(window);

    let aggregate = self
      .conn
      .call(move |conn| {
        let facility_count: i64 = conn.query_row(
          "SELECT COUNT(*) FROM facilities
           WHERE state = ?1 AND certified_beds BETWEEN ?2 AND ?3 AND facility_id != ?4",
          rusqlite::params![state, low, high, id],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
          "SELECT d.citation_code, COUNT(*)
           FROM deficiencies d
           JOIN facilities f ON f.facility_id = d.facility_id
           WHERE f.state = ?1 AND f.certified_beds BETWEEN ?2 AND ?3
             AND f.facility_id != ?4
             AND d.is_standard = 1 AND d.survey_date BETWEEN ?5 AND ?6
           GROUP BY d.citation_code",
        )?;
        let code_counts = collect_code_counts(
          &mut stmt,
          rusqlite::params![state, low, high, id, start, end],
        )?;

        Ok(CitationAggregate {
          facility_count: facility_count.max(0) as u64,
          code_counts,
        })
      })
      .await?;

    Ok(aggregate)
  }

  async fn state_aggregates(
    &self,
    window: LookbackWindow,
    state: Option<&str>,
  ) -> Result<Vec<StateAggregate>> {
    let state = state.map(str::to_ascii_uppercase);
    let (start, end) = encode_window(window);

    let aggregates = self
      .conn
      .call(move |conn| {
        let mut by_state: BTreeMap<String, CitationAggregate> = BTreeMap::new();

        let mut counts = conn.prepare(
          "SELECT state, COUNT(*) FROM facilities
           WHERE (?1 IS NULL OR state = ?1)
           GROUP BY state",
        )?;
        let rows = counts.query_map(rusqlite::params![state], |row| {
          Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
          let (st, n) = row?;
          by_state.entry(st).or_default().facility_count = n.max(0) as u64;
        }

        let mut codes = conn.prepare(
          "SELECT f.state, d.citation_code, COUNT(*)
           FROM deficiencies d
           JOIN facilities f ON f.facility_id = d.facility_id
           WHERE (?1 IS NULL OR f.state = ?1)
             AND d.is_standard = 1 AND d.survey_date BETWEEN ?2 AND ?3
           GROUP BY f.state, d.citation_code",
        )?;
        let rows = codes.query_map(rusqlite::params![state, start, end], |row| {
          Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
          ))
        })?;
        for row in rows {
          let (st, code, n) = row?;
          *by_state
            .entry(st)
            .or_default()
            .code_counts
            .entry(code.trim().to_ascii_uppercase())
            .or_insert(0) += n.max(0) as u64;
        }

        Ok(
          by_state
            .into_iter()
            .map(|(state, aggregate)| StateAggregate { state, aggregate })
            .collect::<Vec<_>>(),
        )
      })
      .await?;

    Ok(aggregates)
  }

  // ── Internal audit ────────────────────────────────────────────────────────

  async fn audit_items(&self, facility_id: &str) -> Result<Vec<AuditItem>> {
    let id = facility_id.to_owned();

    let raws: Vec<RawAuditItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT item_id, facility_id, category_id, title, score
           FROM audit_items WHERE facility_id = ?1 ORDER BY item_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawAuditItem {
              item_id:     row.get(0)?,
              facility_id: row.get(1)?,
              category_id: row.get(2)?,
              title:       row.get(3)?,
              score:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditItem::into_item).collect()
  }

  // ── Snapshots ─────────────────────────────────────────────────────────────

  async fn upsert_snapshots(&self, records: Vec<SnapshotRecord>) -> Result<BatchWrite> {
    let mut outcome = BatchWrite::default();
    let mut encoded = Vec::with_capacity(records.len());
    for record in &records {
      match EncodedRecord::encode(record) {
        Ok(e) => encoded.push(e),
        Err(e) => outcome
          .failures
          .push((record.facility_id().to_owned(), e.to_string())),
      }
    }

    let (written, failures) = self
      .conn
      .call(move |conn| {
        let mut written = 0usize;
        let mut failures = Vec::new();
        for record in &encoded {
          match write_record(conn, record) {
            Ok(()) => written += 1,
            Err(e) => failures.push((record.snapshot.facility_id.clone(), e.to_string())),
          }
        }
        Ok((written, failures))
      })
      .await?;

    outcome.written = written;
    outcome.failures.extend(failures);
    Ok(outcome)
  }

  async fn latest_snapshot(&self, facility_id: &str) -> Result<Option<FacilityRiskSnapshot>> {
    Ok(self.list_snapshots(facility_id, 1).await?.into_iter().next())
  }

  async fn list_snapshots(
    &self,
    facility_id: &str,
    limit: usize,
  ) -> Result<Vec<FacilityRiskSnapshot>> {
    let id = facility_id.to_owned();
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawSnapshot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SNAPSHOT_COLUMNS} FROM facility_risk_snapshots
           WHERE facility_id = ?1
           ORDER BY calculated_at DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id, limit_val], RawSnapshot::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSnapshot::into_snapshot).collect()
  }

  async fn category_rows(
    &self,
    facility_id: &str,
    calculated_at: DateTime<Utc>,
  ) -> Result<Vec<CategoryScoreRow>> {
    let id = facility_id.to_owned();
    let at_str = encode_dt(calculated_at);

    let raws: Vec<RawCategoryRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CATEGORY_COLUMNS} FROM category_scores
           WHERE facility_id = ?1 AND calculated_at = ?2
           ORDER BY rank"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id, at_str], RawCategoryRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCategoryRow::into_domain).collect()
  }
}
