//! Survey history: the immutable per-facility reduction over deficiency
//! facts that every metric calculator reads from.
//!
//! Reduction applies the lookback window and the standard-deficiency filter
//! exactly once, groups citations by survey date into cycles, and orders the
//! cycles newest first.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  category::Category,
  fact::Deficiency,
  severity::{self, SeverityBand},
};

/// Default lookback: three years.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 36;

// ─── Window ──────────────────────────────────────────────────────────────────

/// Inclusive date range of facts considered by a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl LookbackWindow {
  /// The window of `months` months ending on `as_of`.
  pub fn ending(as_of: NaiveDate, months: u32) -> Self {
    let start = as_of
      .checked_sub_months(Months::new(months))
      .unwrap_or(NaiveDate::MIN);
    Self { start, end: as_of }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

// ─── Cycle ───────────────────────────────────────────────────────────────────

/// A citation as seen by the scoring engine: code, mapped category, severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
  pub code:     String,
  pub category: Option<Category>,
  pub severity: Option<String>,
}

impl Citation {
  pub fn weight(&self) -> u32 { severity::weight(self.severity.as_deref()) }

  pub fn band(&self) -> Option<SeverityBand> {
    self.severity.as_deref().and_then(severity::band)
  }

  fn ordinal(&self) -> Option<u8> { self.severity.as_deref().and_then(severity::ordinal) }
}

/// All citations issued on one survey date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyCycle {
  pub survey_date: NaiveDate,
  pub citations:   Vec<Citation>,
}

impl SurveyCycle {
  pub fn len(&self) -> usize { self.citations.len() }

  pub fn is_empty(&self) -> bool { self.citations.is_empty() }

  /// Distinct codes cited in this cycle.
  pub fn codes(&self) -> BTreeSet<&str> {
    self.citations.iter().map(|c| c.code.as_str()).collect()
  }

  /// Distinct codes cited in this cycle for one category.
  pub fn category_codes(&self, category: Category) -> BTreeSet<&str> {
    self
      .citations
      .iter()
      .filter(|c| c.category == Some(category))
      .map(|c| c.code.as_str())
      .collect()
  }

  /// Mean severity ordinal (`A` = 1 … `L` = 12) over citations with a
  /// recognised letter.
  pub fn average_severity(&self) -> Option<f64> {
    let ordinals: Vec<u8> = self.citations.iter().filter_map(Citation::ordinal).collect();
    if ordinals.is_empty() {
      return None;
    }
    let sum: u32 = ordinals.iter().map(|&n| u32::from(n)).sum();
    Some(f64::from(sum) / ordinals.len() as f64)
  }

  pub fn has_band(&self, band: SeverityBand) -> bool {
    self.citations.iter().any(|c| c.band() == Some(band))
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// A facility's in-window standard citations grouped into survey cycles,
/// newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyHistory {
  window: LookbackWindow,
  cycles: Vec<SurveyCycle>,
}

impl SurveyHistory {
  /// Reduce raw facts into a history. Facts outside the window and
  /// non-standard (complaint-only) facts are dropped.
  pub fn from_facts<'a>(
    facts: impl IntoIterator<Item = &'a Deficiency>,
    window: LookbackWindow,
  ) -> Self {
    let mut by_date: BTreeMap<NaiveDate, Vec<Citation>> = BTreeMap::new();
    for fact in facts {
      if !fact.is_standard || !window.contains(fact.survey_date) {
        continue;
      }
      by_date.entry(fact.survey_date).or_default().push(Citation {
        code:     fact.citation_code.trim().to_ascii_uppercase(),
        category: fact.category(),
        severity: fact.severity.clone(),
      });
    }

    let cycles = by_date
      .into_iter()
      .rev()
      .map(|(survey_date, citations)| SurveyCycle { survey_date, citations })
      .collect();

    Self { window, cycles }
  }

  pub fn window(&self) -> LookbackWindow { self.window }

  /// Cycles ordered by survey date descending.
  pub fn cycles(&self) -> &[SurveyCycle] { &self.cycles }

  pub fn current(&self) -> Option<&SurveyCycle> { self.cycles.first() }

  pub fn previous(&self) -> Option<&SurveyCycle> { self.cycles.get(1) }

  pub fn two_back(&self) -> Option<&SurveyCycle> { self.cycles.get(2) }

  /// All in-window citations, mapped or not.
  pub fn total_citations(&self) -> usize { self.cycles.iter().map(SurveyCycle::len).sum() }

  pub fn citations(&self) -> impl Iterator<Item = &Citation> {
    self.cycles.iter().flat_map(|c| c.citations.iter())
  }

  pub fn latest_survey_date(&self) -> Option<NaiveDate> {
    self.current().map(|c| c.survey_date)
  }

  /// Most recent survey date with at least one Immediate Jeopardy citation.
  pub fn latest_immediate_jeopardy(&self) -> Option<NaiveDate> {
    self
      .cycles
      .iter()
      .find(|c| c.has_band(SeverityBand::ImmediateJeopardy))
      .map(|c| c.survey_date)
  }

  /// Cycles in which `category` was cited, newest first.
  pub fn category_cycles(&self, category: Category) -> impl Iterator<Item = &SurveyCycle> {
    self
      .cycles
      .iter()
      .filter(move |c| c.citations.iter().any(|cit| cit.category == Some(category)))
  }
}
