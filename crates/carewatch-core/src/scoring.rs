//! Per-category composite scores.
//!
//! Scoring runs in two steps: a pure reduction of the survey history into a
//! [`CategoryAggregate`] per category, then factor computation against the
//! facility-wide maximum, the benchmark, and the quality signals.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

use crate::{
  benchmark::{Benchmark, peer_factor},
  category::Category,
  fact::Facility,
  history::SurveyHistory,
  profile::ScoringProfile,
  quality::QualitySignals,
  severity::SeverityBand,
};

const REPEAT_CODE_BONUS: f64 = 5.0;
const IMMEDIATE_JEOPARDY_BONUS: f64 = 20.0;
const HARM_BONUS: f64 = 10.0;

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// Immutable tallies for one category of one facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAggregate {
  pub category:                Category,
  pub citation_count:          usize,
  pub severity_weighted_count: u32,
  pub cited_codes:             BTreeSet<String>,
  /// Codes cited in both of this category's two most recent cycles.
  pub repeat_codes:            BTreeSet<String>,
  pub had_immediate_jeopardy:  bool,
  pub had_harm:                bool,
}

impl CategoryAggregate {
  pub fn reduce(history: &SurveyHistory, category: Category) -> Self {
    let citations: Vec<_> = history
      .citations()
      .filter(|c| c.category == Some(category))
      .collect();

    let mut recent = history.category_cycles(category);
    let repeat_codes = match (recent.next(), recent.next()) {
      (Some(latest), Some(prior)) => {
        let before = prior.category_codes(category);
        latest
          .category_codes(category)
          .into_iter()
          .filter(|code| before.contains(code))
          .map(str::to_owned)
          .collect()
      }
      _ => BTreeSet::new(),
    };

    Self {
      category,
      citation_count: citations.len(),
      severity_weighted_count: citations.iter().map(|c| c.weight()).sum(),
      cited_codes: citations.iter().map(|c| c.code.clone()).collect(),
      repeat_codes,
      had_immediate_jeopardy: citations
        .iter()
        .any(|c| c.band() == Some(SeverityBand::ImmediateJeopardy)),
      had_harm: citations
        .iter()
        .any(|c| c.band() == Some(SeverityBand::ActualHarm)),
    }
  }
}

// ─── Score ───────────────────────────────────────────────────────────────────

/// Component factors, each 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
  pub citation:      f64,
  pub peer:          f64,
  pub quality_level: f64,
  pub quality_trend: f64,
  pub staffing:      f64,
}

impl FactorScores {
  /// Weighted mean under `profile`.
  pub fn weighted(&self, profile: &ScoringProfile) -> f64 {
    let w = profile.weights();
    let sum = w.citation * self.citation
      + w.peer * self.peer
      + w.quality_level * self.quality_level
      + w.quality_trend * self.quality_trend
      + w.staffing * self.staffing;
    sum / w.total()
  }
}

/// The scored state of one category. Ephemeral: persisted as a
/// [`CategoryScoreRow`](crate::snapshot::CategoryScoreRow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
  pub facility_id:     String,
  #[serde(flatten)]
  pub aggregate:       CategoryAggregate,
  pub factors:         FactorScores,
  /// 0–100, one decimal place.
  pub composite_score: f64,
}

impl CategoryScore {
  pub fn category(&self) -> Category { self.aggregate.category }
}

/// Citation factor: share of the facility's worst category plus bonuses for
/// repeats and harm, clamped to 0–100.
pub fn citation_factor(aggregate: &CategoryAggregate, max_weighted: u32) -> f64 {
  let relative = if max_weighted == 0 {
    0.0
  } else {
    (100.0 * f64::from(aggregate.severity_weighted_count) / f64::from(max_weighted)).min(100.0)
  };
  let mut factor = relative + REPEAT_CODE_BONUS * aggregate.repeat_codes.len() as f64;
  if aggregate.had_immediate_jeopardy {
    factor += IMMEDIATE_JEOPARDY_BONUS;
  }
  if aggregate.had_harm {
    factor += HARM_BONUS;
  }
  factor.clamp(0.0, 100.0)
}

/// Score all seven categories and return them ranked: descending composite
/// score, ties by category id ascending.
pub fn score_categories<B, Q>(
  facility: &Facility,
  history: &SurveyHistory,
  benchmark: &B,
  quality: &Q,
  profile: &ScoringProfile,
) -> Vec<CategoryScore>
where
  B: Benchmark + ?Sized,
  Q: QualitySignals + ?Sized,
{
  let aggregates: Vec<CategoryAggregate> = Category::iter()
    .map(|category| CategoryAggregate::reduce(history, category))
    .collect();
  let max_weighted = aggregates
    .iter()
    .map(|a| a.severity_weighted_count)
    .max()
    .unwrap_or(0);

  let mut scores: Vec<CategoryScore> = aggregates
    .into_iter()
    .map(|aggregate| {
      let category = aggregate.category;
      let factors = FactorScores {
        citation:      citation_factor(&aggregate, max_weighted),
        peer:          peer_factor(
          aggregate.citation_count,
          benchmark.category_average(facility, category),
        ),
        quality_level: quality.quality_level(facility, category),
        quality_trend: quality.quality_trend(facility, category),
        staffing:      quality.staffing(facility, category),
      };
      // A category with nothing cited carries no risk of its own.
      let composite_score = if aggregate.citation_count == 0 {
        0.0
      } else {
        round_tenth(factors.weighted(profile).clamp(0.0, 100.0))
      };
      CategoryScore {
        facility_id: facility.facility_id.clone(),
        aggregate,
        factors,
        composite_score,
      }
    })
    .collect();

  rank(&mut scores);
  scores
}

/// Sort descending by composite score, ties by category id ascending.
pub fn rank(scores: &mut [CategoryScore]) {
  scores.sort_by(|a, b| {
    b.composite_score
      .total_cmp(&a.composite_score)
      .then_with(|| a.category().cmp(&b.category()))
  });
}

fn round_tenth(value: f64) -> f64 { (value * 10.0).round() / 10.0 }

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    benchmark::{NoBenchmark, StateAggregate, StateCategoryTable},
    fact::Deficiency,
    history::LookbackWindow,
    quality::NeutralQualitySignals,
  };

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  fn history(facts: &[Deficiency]) -> SurveyHistory {
    SurveyHistory::from_facts(facts, LookbackWindow::ending(date(2024, 6, 1), 36))
  }

  fn facility() -> Facility { Facility::new("015009", "Burns Nursing Home", "AL", 57) }

  fn find(scores: &[CategoryScore], category: Category) -> &CategoryScore {
    scores.iter().find(|s| s.category() == category).unwrap()
  }

  #[test]
  fn aggregates_counts_weights_and_flags() {
    let day = date(2024, 3, 1);
    let facts = vec![
      Deficiency::standard("1", day, "F689", "G"),
      Deficiency::standard("1", day, "F880", "J"),
      Deficiency::standard("1", day, "F812", "F"),
    ];
    let h = history(&facts);

    let care = CategoryAggregate::reduce(&h, Category::QualityOfCare);
    assert_eq!(care.citation_count, 1);
    assert_eq!(care.severity_weighted_count, 5);
    assert!(care.had_harm);
    assert!(!care.had_immediate_jeopardy);

    let infection = CategoryAggregate::reduce(&h, Category::InfectionControl);
    assert_eq!(infection.citation_count, 1);
    assert_eq!(infection.severity_weighted_count, 10);
    assert!(infection.had_immediate_jeopardy);
  }

  #[test]
  fn repeat_codes_use_the_categorys_own_cycles() {
    let facts = vec![
      Deficiency::standard("1", date(2022, 1, 1), "F880", "D"),
      Deficiency::standard("1", date(2022, 1, 1), "F689", "D"),
      // A newer survey with no infection-control citations.
      Deficiency::standard("1", date(2023, 1, 1), "F689", "D"),
      Deficiency::standard("1", date(2024, 1, 1), "F880", "D"),
    ];
    let h = history(&facts);

    let infection = CategoryAggregate::reduce(&h, Category::InfectionControl);
    assert_eq!(infection.repeat_codes, BTreeSet::from(["F880".to_owned()]));

    let care = CategoryAggregate::reduce(&h, Category::QualityOfCare);
    assert_eq!(care.repeat_codes, BTreeSet::from(["F689".to_owned()]));
  }

  #[test]
  fn citation_factor_bonuses_and_clamp() {
    let aggregate = CategoryAggregate {
      category:                Category::Pharmacy,
      citation_count:          2,
      severity_weighted_count: 5,
      cited_codes:             BTreeSet::new(),
      repeat_codes:            BTreeSet::from(["F760".to_owned()]),
      had_immediate_jeopardy:  false,
      had_harm:                true,
    };
    assert_eq!(citation_factor(&aggregate, 10), 65.0);
    assert_eq!(citation_factor(&aggregate, 5), 100.0);
    assert_eq!(citation_factor(&aggregate, 0), 15.0);
  }

  #[test]
  fn zero_deficiency_facility_scores_zero() {
    let scores = score_categories(
      &facility(),
      &history(&[]),
      &NoBenchmark,
      &NeutralQualitySignals,
      &ScoringProfile::detailed(),
    );
    assert_eq!(scores.len(), Category::COUNT);
    for s in &scores {
      assert_eq!(s.factors.citation, 0.0);
      assert_eq!(s.factors.peer, 50.0);
      assert_eq!(s.composite_score, 0.0);
    }
    // All tied: order falls back to category id.
    let order: Vec<_> = scores.iter().map(CategoryScore::category).collect();
    assert_eq!(order, Category::iter().collect::<Vec<_>>());
  }

  #[test]
  fn composite_follows_profile_and_ranks() {
    let day = date(2024, 3, 1);
    let facts = vec![
      Deficiency::standard("1", day, "F689", "G"),
      Deficiency::standard("1", day, "F880", "J"),
    ];
    let h = history(&facts);

    let detailed = score_categories(
      &facility(),
      &h,
      &NoBenchmark,
      &NeutralQualitySignals,
      &ScoringProfile::detailed(),
    );
    assert_eq!(detailed[0].category(), Category::InfectionControl);
    assert_eq!(detailed[0].factors.citation, 100.0);
    assert_eq!(detailed[0].composite_score, 70.0);
    assert_eq!(detailed[1].category(), Category::QualityOfCare);
    assert_eq!(detailed[1].factors.citation, 60.0);
    assert_eq!(detailed[1].composite_score, 54.0);

    let batch = score_categories(
      &facility(),
      &h,
      &NoBenchmark,
      &NeutralQualitySignals,
      &ScoringProfile::batch(),
    );
    assert_eq!(find(&batch, Category::QualityOfCare).composite_score, 55.0);
    assert_eq!(find(&batch, Category::InfectionControl).composite_score, 75.0);
  }

  #[test]
  fn peer_average_moves_peer_factor() {
    let facts = vec![
      Deficiency::standard("1", date(2024, 3, 1), "F760", "D"),
      Deficiency::standard("1", date(2024, 3, 1), "F761", "D"),
    ];
    let table = StateCategoryTable::from_aggregates(&[StateAggregate {
      state:     "AL".into(),
      aggregate: crate::benchmark::CitationAggregate {
        facility_count: 2,
        code_counts:    [("F760".to_owned(), 2)].into_iter().collect(),
      },
    }]);
    let scores = score_categories(
      &facility(),
      &history(&facts),
      &table,
      &NeutralQualitySignals,
      &ScoringProfile::detailed(),
    );
    assert_eq!(find(&scores, Category::Pharmacy).factors.peer, 100.0);
    // Uncited category below the state average of zero stays at 50.
    assert_eq!(find(&scores, Category::ResidentRights).factors.peer, 50.0);
  }

  #[test]
  fn composite_always_in_range() {
    let mut facts = Vec::new();
    for (i, code) in ["F880", "F689", "F760", "F600", "F550", "F656", "F835"].iter().enumerate() {
      for year in 2022..=2024 {
        let sev = ["A", "E", "H", "L"][(i + year as usize) % 4];
        facts.push(Deficiency::standard("1", date(year, 2, 1), *code, sev));
      }
    }
    let scores = score_categories(
      &facility(),
      &history(&facts),
      &NoBenchmark,
      &NeutralQualitySignals,
      &ScoringProfile::detailed(),
    );
    for pair in scores.windows(2) {
      assert!(pair[0].composite_score >= pair[1].composite_score);
    }
    assert!(scores.iter().all(|s| (0.0..=100.0).contains(&s.composite_score)));
  }
}
