//! Persisted results: facility snapshots and per-category rows.
//!
//! Snapshots are additive history. The natural keys are
//! `(facility_id, calculated_at)` for snapshots and
//! `(facility_id, category, calculated_at)` for category rows; writing the
//! same key twice replaces the earlier row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  category::Category,
  focus::FocusArea,
  overall::RiskTier,
  scoring::{CategoryScore, FactorScores},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRiskSnapshot {
  pub facility_id:       String,
  pub calculated_at:     DateTime<Utc>,
  pub model_version:     String,
  pub overall_score:     u8,
  pub overall_tier:      RiskTier,
  /// Serialised [`KeyMetrics`](crate::engine::KeyMetrics).
  pub key_metrics:       serde_json::Value,
  pub ranked_categories: Vec<FocusArea>,
  /// Latest survey date in the lookback window.
  pub data_as_of:        Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScoreRow {
  pub facility_id:             String,
  pub category:                Category,
  pub calculated_at:           DateTime<Utc>,
  pub rank:                    usize,
  pub citation_count:          usize,
  pub severity_weighted_count: u32,
  pub repeat_count:            usize,
  pub had_immediate_jeopardy:  bool,
  pub had_harm:                bool,
  pub factors:                 FactorScores,
  pub composite_score:         f64,
}

impl CategoryScoreRow {
  pub fn from_score(score: &CategoryScore, rank: usize, calculated_at: DateTime<Utc>) -> Self {
    let a = &score.aggregate;
    Self {
      facility_id: score.facility_id.clone(),
      category: a.category,
      calculated_at,
      rank,
      citation_count: a.citation_count,
      severity_weighted_count: a.severity_weighted_count,
      repeat_count: a.repeat_codes.len(),
      had_immediate_jeopardy: a.had_immediate_jeopardy,
      had_harm: a.had_harm,
      factors: score.factors,
      composite_score: score.composite_score,
    }
  }
}

/// Everything written for one facility in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
  pub snapshot:      FacilityRiskSnapshot,
  pub category_rows: Vec<CategoryScoreRow>,
}

impl SnapshotRecord {
  pub fn facility_id(&self) -> &str { &self.snapshot.facility_id }
}

/// Outcome of writing a batch of [`SnapshotRecord`]s. Each record is written
/// independently; a failed record does not affect the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWrite {
  pub written:  usize,
  /// `(facility_id, message)` for each record that could not be written.
  pub failures: Vec<(String, String)>,
}
