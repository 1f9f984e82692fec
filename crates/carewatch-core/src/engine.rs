//! [`RiskEngine`]: pure assessment of one facility.
//!
//! Given a facility, its deficiency facts, a benchmark, and a calculation
//! timestamp, the engine produces a [`FacilityAssessment`]. It performs no
//! I/O, so the same engine serves on-demand requests and batch workers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  benchmark::Benchmark,
  category::CATEGORY_TABLE_VERSION,
  fact::{Deficiency, Facility},
  focus::{self, FocusArea},
  history::{DEFAULT_LOOKBACK_MONTHS, LookbackWindow, SurveyHistory},
  metrics::CitationMetrics,
  overall::{self, OverallRisk},
  profile::ScoringProfile,
  quality::{NeutralQualitySignals, QualitySignals},
  scoring::{self, CategoryScore},
  snapshot::{CategoryScoreRow, FacilityRiskSnapshot, SnapshotRecord},
};

// ─── Assessment ──────────────────────────────────────────────────────────────

/// Contents of a snapshot's key-metrics blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
  #[serde(flatten)]
  pub citations:          CitationMetrics,
  pub lookback_start:     NaiveDate,
  pub overall_adjustment: i32,
  pub special_focus:      bool,
  pub category_table:     String,
}

/// The full, in-memory result of assessing one facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityAssessment {
  pub facility:      Facility,
  pub calculated_at: DateTime<Utc>,
  pub model_version: String,
  pub window:        LookbackWindow,
  pub metrics:       CitationMetrics,
  pub overall:       OverallRisk,
  /// Ranked: descending composite score, ties by category id.
  pub categories:    Vec<CategoryScore>,
  /// One per category, in the same order as `categories`.
  pub focus_areas:   Vec<FocusArea>,
}

impl FacilityAssessment {
  pub fn data_as_of(&self) -> Option<NaiveDate> { self.metrics.last_survey_date }

  pub fn key_metrics(&self) -> KeyMetrics {
    KeyMetrics {
      citations:          self.metrics.clone(),
      lookback_start:     self.window.start,
      overall_adjustment: self.overall.adjustment,
      special_focus:      self.facility.special_focus,
      category_table:     CATEGORY_TABLE_VERSION.to_owned(),
    }
  }

  /// Convert into the rows persisted for this facility.
  pub fn to_record(&self) -> Result<SnapshotRecord> {
    let snapshot = FacilityRiskSnapshot {
      facility_id:       self.facility.facility_id.clone(),
      calculated_at:     self.calculated_at,
      model_version:     self.model_version.clone(),
      overall_score:     self.overall.score,
      overall_tier:      self.overall.tier,
      key_metrics:       serde_json::to_value(self.key_metrics())?,
      ranked_categories: self.focus_areas.clone(),
      data_as_of:        self.data_as_of(),
    };
    let category_rows = self
      .categories
      .iter()
      .enumerate()
      .map(|(i, score)| CategoryScoreRow::from_score(score, i + 1, self.calculated_at))
      .collect();
    Ok(SnapshotRecord { snapshot, category_rows })
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Scores facilities under one [`ScoringProfile`].
#[derive(Debug, Clone)]
pub struct RiskEngine<Q = NeutralQualitySignals> {
  profile:         ScoringProfile,
  quality:         Q,
  lookback_months: u32,
}

impl RiskEngine {
  /// An engine with neutral quality signals.
  pub fn new(profile: ScoringProfile) -> Self {
    Self::with_quality(profile, NeutralQualitySignals)
  }
}

impl Default for RiskEngine {
  fn default() -> Self { Self::new(ScoringProfile::default()) }
}

impl<Q: QualitySignals> RiskEngine<Q> {
  pub fn with_quality(profile: ScoringProfile, quality: Q) -> Self {
    Self { profile, quality, lookback_months: DEFAULT_LOOKBACK_MONTHS }
  }

  pub fn with_lookback_months(mut self, months: u32) -> Self {
    self.lookback_months = months;
    self
  }

  pub fn profile(&self) -> &ScoringProfile { &self.profile }

  /// The fact window for a calculation at `calculated_at`.
  pub fn window(&self, calculated_at: DateTime<Utc>) -> LookbackWindow {
    LookbackWindow::ending(calculated_at.date_naive(), self.lookback_months)
  }

  /// Assess `facility` from its deficiency facts.
  ///
  /// `facts` may extend beyond the lookback window and include complaint
  /// deficiencies; both are filtered here. Every fact must belong to the
  /// facility.
  pub fn assess<B>(
    &self,
    facility: &Facility,
    facts: &[Deficiency],
    benchmark: &B,
    calculated_at: DateTime<Utc>,
  ) -> Result<FacilityAssessment>
  where
    B: Benchmark + ?Sized,
  {
    if let Some(stray) = facts.iter().find(|f| f.facility_id != facility.facility_id) {
      return Err(Error::ForeignFact {
        facility_id: facility.facility_id.clone(),
        found:       stray.facility_id.clone(),
      });
    }

    let window = self.window(calculated_at);
    let history = SurveyHistory::from_facts(facts, window);
    let metrics = CitationMetrics::calculate(&history, window.end);
    let categories =
      scoring::score_categories(facility, &history, benchmark, &self.quality, &self.profile);
    let overall = overall::aggregate(&categories, &metrics);
    let focus_areas = focus::assemble_all(&categories);

    Ok(FacilityAssessment {
      facility: facility.clone(),
      calculated_at,
      model_version: self.profile.model_version(),
      window,
      metrics,
      overall,
      categories,
      focus_areas,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Days, TimeZone as _};

  use super::*;
  use crate::{
    benchmark::NoBenchmark,
    category::Category,
    metrics::Trend,
    overall::RiskTier,
    quality::NEUTRAL_FACTOR,
  };

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(y, m, d, 2, 0, 0).unwrap() }

  fn facility() -> Facility { Facility::new("145001", "Lakeside Care Center", "IL", 120) }

  #[test]
  fn zero_deficiency_facility_is_low() {
    let a = RiskEngine::default()
      .assess(&facility(), &[], &NoBenchmark, at(2024, 6, 1))
      .unwrap();
    assert_eq!(a.overall.score, 0);
    assert_eq!(a.overall.tier, RiskTier::Low);
    assert_eq!(a.data_as_of(), None);
    assert!(a.categories.iter().all(|c| c.factors.citation == 0.0));
    assert!(a.categories.iter().all(|c| c.factors.peer == NEUTRAL_FACTOR));
  }

  #[test]
  fn single_cycle_scenario() {
    let survey = at(2024, 3, 1).date_naive();
    let facts = vec![
      Deficiency::standard("145001", survey, "F689", "H"),
      Deficiency::standard("145001", survey, "F880", "K"),
    ];
    let calculated_at = at(2024, 3, 15);
    let a = RiskEngine::default()
      .assess(&facility(), &facts, &NoBenchmark, calculated_at)
      .unwrap();

    let care = a.categories.iter().find(|c| c.category() == Category::QualityOfCare).unwrap();
    assert_eq!(care.aggregate.citation_count, 1);
    assert_eq!(care.aggregate.severity_weighted_count, 5);

    let infection =
      a.categories.iter().find(|c| c.category() == Category::InfectionControl).unwrap();
    assert_eq!(infection.aggregate.citation_count, 1);
    assert_eq!(infection.aggregate.severity_weighted_count, 10);
    assert!(infection.aggregate.had_immediate_jeopardy);

    assert_eq!(a.metrics.citation_velocity, Trend::Stable);
    assert!(!a.metrics.survey_overdue);
    let top3: f64 = a.categories.iter().take(3).map(|c| c.composite_score).sum();
    assert_eq!(i32::from(a.overall.score), (top3 / 3.0).round() as i32);
    assert_eq!(a.overall.adjustment, 0);
  }

  #[test]
  fn overdue_scenario_adds_five() {
    let survey = at(2022, 1, 1).date_naive();
    let facts = vec![Deficiency::standard("145001", survey, "F880", "K")];
    let late = survey.checked_add_days(Days::new(500)).unwrap();
    let calculated_at = Utc.from_utc_datetime(&late.and_hms_opt(0, 0, 0).unwrap());
    let a = RiskEngine::default()
      .assess(&facility(), &facts, &NoBenchmark, calculated_at)
      .unwrap();
    assert!(a.metrics.survey_overdue);
    assert_eq!(a.overall.adjustment, 5);
  }

  #[test]
  fn ranks_are_positions() {
    let survey = at(2024, 1, 10).date_naive();
    let facts = vec![
      Deficiency::standard("145001", survey, "F760", "E"),
      Deficiency::standard("145001", survey, "F550", "G"),
      Deficiency::standard("145001", survey, "F600", "D"),
    ];
    let a = RiskEngine::default()
      .assess(&facility(), &facts, &NoBenchmark, at(2024, 2, 1))
      .unwrap();
    let record = a.to_record().unwrap();

    assert_eq!(record.category_rows.len(), Category::COUNT);
    for (i, (row, area)) in record
      .category_rows
      .iter()
      .zip(&record.snapshot.ranked_categories)
      .enumerate()
    {
      assert_eq!(row.rank, i + 1);
      assert_eq!(area.rank, i + 1);
      assert_eq!(row.category, area.category);
    }
    assert_eq!(record.snapshot.data_as_of, Some(survey));
    assert_eq!(record.snapshot.model_version, "1.0/detailed");
    assert_eq!(record.snapshot.key_metrics["total_citations"], 3);
  }

  #[test]
  fn rejects_foreign_facts() {
    let facts = vec![Deficiency::standard("999999", at(2024, 1, 1).date_naive(), "F880", "D")];
    let err = RiskEngine::default()
      .assess(&facility(), &facts, &NoBenchmark, at(2024, 2, 1))
      .unwrap_err();
    assert!(matches!(err, Error::ForeignFact { .. }));
  }
}
