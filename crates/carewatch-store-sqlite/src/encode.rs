//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and dates as `YYYY-MM-DD`.
//! Structured snapshot fields (key metrics, ranked categories) are stored as
//! compact JSON. Enumerations are stored by their snake_case id.

use carewatch_core::{
  category::Category,
  fact::{AuditItem, Deficiency, Facility, QualityRatings},
  history::LookbackWindow,
  overall::RiskTier,
  scoring::FactorScores,
  snapshot::{CategoryScoreRow, FacilityRiskSnapshot, SnapshotRecord},
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

/// Inclusive `(start, end)` bounds of a window, for `BETWEEN`.
pub fn encode_window(window: LookbackWindow) -> (String, String) {
  (encode_date(window.start), encode_date(window.end))
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_category(s: &str) -> Result<Category> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown category: {s:?}")))
}

pub fn decode_tier(s: &str) -> Result<RiskTier> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown risk tier: {s:?}")))
}

fn decode_rating(value: Option<i64>) -> Result<Option<u8>> {
  value
    .map(|v| u8::try_from(v).map_err(|_| Error::Decode(format!("rating out of range: {v}"))))
    .transpose()
}

fn decode_count(value: i64, column: &str) -> Result<usize> {
  usize::try_from(value).map_err(|_| Error::Decode(format!("{column} out of range: {value}")))
}

// ─── Facilities ──────────────────────────────────────────────────────────────

/// Columns selected for a facility, in order.
pub const FACILITY_COLUMNS: &str = "facility_id, name, state, certified_beds, ownership_type,
   overall_rating, health_rating, staffing_rating, qm_rating, special_focus,
   fine_count, fine_total, staffing_hours, staff_turnover, occupancy_rate";

/// Raw values read directly from a `facilities` row.
pub struct RawFacility {
  pub facility_id:     String,
  pub name:            String,
  pub state:           String,
  pub certified_beds:  i64,
  pub ownership_type:  Option<String>,
  pub overall_rating:  Option<i64>,
  pub health_rating:   Option<i64>,
  pub staffing_rating: Option<i64>,
  pub qm_rating:       Option<i64>,
  pub special_focus:   bool,
  pub fine_count:      i64,
  pub fine_total:      f64,
  pub staffing_hours:  Option<f64>,
  pub staff_turnover:  Option<f64>,
  pub occupancy_rate:  Option<f64>,
}

impl RawFacility {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      facility_id:     row.get(0)?,
      name:            row.get(1)?,
      state:           row.get(2)?,
      certified_beds:  row.get(3)?,
      ownership_type:  row.get(4)?,
      overall_rating:  row.get(5)?,
      health_rating:   row.get(6)?,
      staffing_rating: row.get(7)?,
      qm_rating:       row.get(8)?,
      special_focus:   row.get(9)?,
      fine_count:      row.get(10)?,
      fine_total:      row.get(11)?,
      staffing_hours:  row.get(12)?,
      staff_turnover:  row.get(13)?,
      occupancy_rate:  row.get(14)?,
    })
  }

  pub fn from_facility(f: &Facility) -> Self {
    Self {
      facility_id:     f.facility_id.clone(),
      name:            f.name.clone(),
      state:           f.state.to_ascii_uppercase(),
      certified_beds:  i64::from(f.certified_beds),
      ownership_type:  f.ownership_type.clone(),
      overall_rating:  f.ratings.overall.map(i64::from),
      health_rating:   f.ratings.health_surveys.map(i64::from),
      staffing_rating: f.ratings.staffing.map(i64::from),
      qm_rating:       f.ratings.quality_measure.map(i64::from),
      special_focus:   f.special_focus,
      fine_count:      i64::from(f.fine_count),
      fine_total:      f.fine_total,
      staffing_hours:  f.staffing_hours,
      staff_turnover:  f.staff_turnover,
      occupancy_rate:  f.occupancy_rate,
    }
  }

  pub fn into_facility(self) -> Result<Facility> {
    let certified_beds = u32::try_from(self.certified_beds)
      .map_err(|_| Error::Decode(format!("certified_beds out of range: {}", self.certified_beds)))?;
    let fine_count = u32::try_from(self.fine_count)
      .map_err(|_| Error::Decode(format!("fine_count out of range: {}", self.fine_count)))?;

    Ok(Facility {
      facility_id: self.facility_id,
      name: self.name,
      state: self.state,
      certified_beds,
      ownership_type: self.ownership_type,
      ratings: QualityRatings {
        overall:         decode_rating(self.overall_rating)?,
        health_surveys:  decode_rating(self.health_rating)?,
        staffing:        decode_rating(self.staffing_rating)?,
        quality_measure: decode_rating(self.qm_rating)?,
      },
      special_focus: self.special_focus,
      fine_count,
      fine_total: self.fine_total,
      staffing_hours: self.staffing_hours,
      staff_turnover: self.staff_turnover,
      occupancy_rate: self.occupancy_rate,
    })
  }
}

// ─── Deficiencies ────────────────────────────────────────────────────────────

/// Raw values read directly from a `deficiencies` row.
pub struct RawDeficiency {
  pub facility_id:   String,
  pub survey_date:   String,
  pub citation_code: String,
  pub severity:      Option<String>,
  pub is_standard:   bool,
  pub is_complaint:  bool,
  pub text:          String,
}

impl RawDeficiency {
  /// Expects columns `facility_id, survey_date, citation_code, severity,
  /// is_standard, is_complaint, text`.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      facility_id:   row.get(0)?,
      survey_date:   row.get(1)?,
      citation_code: row.get(2)?,
      severity:      row.get(3)?,
      is_standard:   row.get(4)?,
      is_complaint:  row.get(5)?,
      text:          row.get(6)?,
    })
  }

  pub fn into_deficiency(self) -> Result<Deficiency> {
    Ok(Deficiency {
      facility_id:   self.facility_id,
      survey_date:   decode_date(&self.survey_date)?,
      citation_code: self.citation_code,
      severity:      self.severity,
      is_standard:   self.is_standard,
      is_complaint:  self.is_complaint,
      text:          self.text,
    })
  }
}

// ─── Audit items ─────────────────────────────────────────────────────────────

pub struct RawAuditItem {
  pub item_id:     String,
  pub facility_id: String,
  pub category_id: String,
  pub title:       String,
  pub score:       Option<f64>,
}

impl RawAuditItem {
  pub fn into_item(self) -> Result<AuditItem> {
    Ok(AuditItem {
      item_id:     self.item_id,
      facility_id: self.facility_id,
      category:    decode_category(&self.category_id)?,
      title:       self.title,
      score:       self.score,
    })
  }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `facility_risk_snapshots` row.
pub struct RawSnapshot {
  pub facility_id:       String,
  pub calculated_at:     String,
  pub model_version:     String,
  pub overall_score:     i64,
  pub overall_tier:      String,
  pub key_metrics:       String,
  pub ranked_categories: String,
  pub data_as_of:        Option<String>,
}

impl RawSnapshot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      facility_id:       row.get(0)?,
      calculated_at:     row.get(1)?,
      model_version:     row.get(2)?,
      overall_score:     row.get(3)?,
      overall_tier:      row.get(4)?,
      key_metrics:       row.get(5)?,
      ranked_categories: row.get(6)?,
      data_as_of:        row.get(7)?,
    })
  }

  pub fn into_snapshot(self) -> Result<FacilityRiskSnapshot> {
    let overall_score = u8::try_from(self.overall_score)
      .map_err(|_| Error::Decode(format!("overall_score out of range: {}", self.overall_score)))?;
    Ok(FacilityRiskSnapshot {
      facility_id: self.facility_id,
      calculated_at: decode_dt(&self.calculated_at)?,
      model_version: self.model_version,
      overall_score,
      overall_tier: decode_tier(&self.overall_tier)?,
      key_metrics: serde_json::from_str(&self.key_metrics)?,
      ranked_categories: serde_json::from_str(&self.ranked_categories)?,
      data_as_of: self.data_as_of.as_deref().map(decode_date).transpose()?,
    })
  }
}

/// Raw values of a `category_scores` row.
pub struct RawCategoryRow {
  pub facility_id:             String,
  pub category_id:             String,
  pub calculated_at:           String,
  pub rank:                    i64,
  pub citation_count:          i64,
  pub severity_weighted_count: i64,
  pub repeat_count:            i64,
  pub had_immediate_jeopardy:  bool,
  pub had_harm:                bool,
  pub citation_factor:         f64,
  pub peer_factor:             f64,
  pub quality_level_factor:    f64,
  pub quality_trend_factor:    f64,
  pub staffing_factor:         f64,
  pub composite_score:         f64,
}

impl RawCategoryRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      facility_id:             row.get(0)?,
      category_id:             row.get(1)?,
      calculated_at:           row.get(2)?,
      rank:                    row.get(3)?,
      citation_count:          row.get(4)?,
      severity_weighted_count: row.get(5)?,
      repeat_count:            row.get(6)?,
      had_immediate_jeopardy:  row.get(7)?,
      had_harm:                row.get(8)?,
      citation_factor:         row.get(9)?,
      peer_factor:             row.get(10)?,
      quality_level_factor:    row.get(11)?,
      quality_trend_factor:    row.get(12)?,
      staffing_factor:         row.get(13)?,
      composite_score:         row.get(14)?,
    })
  }

  pub fn from_domain(row: &CategoryScoreRow) -> Self {
    Self {
      facility_id:             row.facility_id.clone(),
      category_id:             row.category.id().to_owned(),
      calculated_at:           encode_dt(row.calculated_at),
      rank:                    row.rank as i64,
      citation_count:          row.citation_count as i64,
      severity_weighted_count: i64::from(row.severity_weighted_count),
      repeat_count:            row.repeat_count as i64,
      had_immediate_jeopardy:  row.had_immediate_jeopardy,
      had_harm:                row.had_harm,
      citation_factor:         row.factors.citation,
      peer_factor:             row.factors.peer,
      quality_level_factor:    row.factors.quality_level,
      quality_trend_factor:    row.factors.quality_trend,
      staffing_factor:         row.factors.staffing,
      composite_score:         row.composite_score,
    }
  }

  pub fn into_domain(self) -> Result<CategoryScoreRow> {
    Ok(CategoryScoreRow {
      facility_id:             self.facility_id,
      category:                decode_category(&self.category_id)?,
      calculated_at:           decode_dt(&self.calculated_at)?,
      rank:                    decode_count(self.rank, "rank")?,
      citation_count:          decode_count(self.citation_count, "citation_count")?,
      severity_weighted_count: u32::try_from(self.severity_weighted_count).map_err(|_| {
        Error::Decode(format!(
          "severity_weighted_count out of range: {}",
          self.severity_weighted_count
        ))
      })?,
      repeat_count:            decode_count(self.repeat_count, "repeat_count")?,
      had_immediate_jeopardy:  self.had_immediate_jeopardy,
      had_harm:                self.had_harm,
      factors:                 FactorScores {
        citation:      self.citation_factor,
        peer:          self.peer_factor,
        quality_level: self.quality_level_factor,
        quality_trend: self.quality_trend_factor,
        staffing:      self.staffing_factor,
      },
      composite_score:         self.composite_score,
    })
  }
}

/// A [`SnapshotRecord`] with every column pre-encoded, ready to move into
/// the database thread.
pub struct EncodedRecord {
  pub snapshot: RawSnapshot,
  pub rows:     Vec<RawCategoryRow>,
}

impl EncodedRecord {
  pub fn encode(record: &SnapshotRecord) -> Result<Self> {
    let s = &record.snapshot;
    Ok(Self {
      snapshot: RawSnapshot {
        facility_id:       s.facility_id.clone(),
        calculated_at:     encode_dt(s.calculated_at),
        model_version:     s.model_version.clone(),
        overall_score:     i64::from(s.overall_score),
        overall_tier:      s.overall_tier.to_string(),
        key_metrics:       serde_json::to_string(&s.key_metrics)?,
        ranked_categories: serde_json::to_string(&s.ranked_categories)?,
        data_as_of:        s.data_as_of.map(encode_date),
      },
      rows:     record.category_rows.iter().map(RawCategoryRow::from_domain).collect(),
    })
  }
}
