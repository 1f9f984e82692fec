//! Facility-wide citation metrics: trend analysis across survey cycles.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::history::{SurveyCycle, SurveyHistory};

/// A survey is overdue once more than this many days have passed.
pub const SURVEY_OVERDUE_DAYS: i64 = 456;

const VELOCITY_IMPROVING_RATIO: f64 = 0.8;
const VELOCITY_WORSENING_RATIO: f64 = 1.2;
const SEVERITY_TREND_THRESHOLD: f64 = 0.5;

/// Direction of change between the current and previous survey cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
  Improving,
  Stable,
  Worsening,
}

/// Facility-wide metrics derived from a [`SurveyHistory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationMetrics {
  /// Every in-window standard citation, including unmapped codes.
  pub total_citations:        usize,
  pub survey_cycles:          usize,
  pub current_cycle_count:    usize,
  pub previous_cycle_count:   usize,
  pub two_back_cycle_count:   usize,
  pub citation_velocity:      Trend,
  pub severity_trend:         Trend,
  /// Codes cited in both the current and previous cycle.
  pub repeat_codes:           BTreeSet<String>,
  pub repeat_ftag_rate:       f64,
  pub last_survey_date:       Option<NaiveDate>,
  pub days_since_last_survey: Option<i64>,
  pub survey_overdue:         bool,
  pub days_since_last_ij:     Option<i64>,
}

impl CitationMetrics {
  /// Compute metrics for `history` as of `today`.
  pub fn calculate(history: &SurveyHistory, today: NaiveDate) -> Self {
    let current = history.current();
    let previous = history.previous();
    let count = |c: Option<&SurveyCycle>| c.map_or(0, SurveyCycle::len);

    let current_cycle_count = count(current);
    let previous_cycle_count = count(previous);

    let repeat_codes = repeat_codes(current, previous);
    let repeat_ftag_rate = match current.map(SurveyCycle::codes) {
      Some(codes) if !codes.is_empty() => repeat_codes.len() as f64 / codes.len() as f64,
      _ => 0.0,
    };

    let last_survey_date = history.latest_survey_date();
    let days_since_last_survey = last_survey_date.map(|d| (today - d).num_days());

    Self {
      total_citations: history.total_citations(),
      survey_cycles: history.cycles().len(),
      current_cycle_count,
      previous_cycle_count,
      two_back_cycle_count: count(history.two_back()),
      citation_velocity: citation_velocity(current_cycle_count, previous_cycle_count),
      severity_trend: severity_trend(current, previous),
      repeat_codes,
      repeat_ftag_rate,
      last_survey_date,
      days_since_last_survey,
      survey_overdue: is_survey_overdue(days_since_last_survey),
      days_since_last_ij: history
        .latest_immediate_jeopardy()
        .map(|d| (today - d).num_days()),
    }
  }
}

/// Compare citation counts of the current and previous cycle. With no
/// previous citations the velocity is always stable.
pub fn citation_velocity(current: usize, previous: usize) -> Trend {
  if previous == 0 {
    return Trend::Stable;
  }
  let (current, previous) = (current as f64, previous as f64);
  if current < VELOCITY_IMPROVING_RATIO * previous {
    Trend::Improving
  } else if current > VELOCITY_WORSENING_RATIO * previous {
    Trend::Worsening
  } else {
    Trend::Stable
  }
}

fn severity_trend(current: Option<&SurveyCycle>, previous: Option<&SurveyCycle>) -> Trend {
  let (Some(now), Some(before)) = (
    current.and_then(SurveyCycle::average_severity),
    previous.and_then(SurveyCycle::average_severity),
  ) else {
    return Trend::Stable;
  };

  let delta = now - before;
  if delta > SEVERITY_TREND_THRESHOLD {
    Trend::Worsening
  } else if delta < -SEVERITY_TREND_THRESHOLD {
    Trend::Improving
  } else {
    Trend::Stable
  }
}

fn repeat_codes(current: Option<&SurveyCycle>, previous: Option<&SurveyCycle>) -> BTreeSet<String> {
  match (current, previous) {
    (Some(current), Some(previous)) => {
      let before = previous.codes();
      current
        .codes()
        .into_iter()
        .filter(|code| before.contains(code))
        .map(str::to_owned)
        .collect()
    }
    _ => BTreeSet::new(),
  }
}

pub fn is_survey_overdue(days_since_last_survey: Option<i64>) -> bool {
  days_since_last_survey.is_some_and(|days| days > SURVEY_OVERDUE_DAYS)
}
