//! Overall facility score and tier.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  metrics::{CitationMetrics, Trend},
  scoring::CategoryScore,
};

/// Number of top categories averaged into the overall score.
pub const TOP_CATEGORIES: usize = 3;

const REPEAT_RATE_THRESHOLD: f64 = 0.3;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskTier {
  Low,
  Medium,
  High,
  VeryHigh,
}

impl RiskTier {
  pub fn from_score(score: u8) -> Self {
    match score {
      75.. => Self::VeryHigh,
      50.. => Self::High,
      25.. => Self::Medium,
      _ => Self::Low,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Low => "Low",
      Self::Medium => "Medium",
      Self::High => "High",
      Self::VeryHigh => "Very High",
    }
  }
}

/// Facility-level result of aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallRisk {
  pub score:      u8,
  pub tier:       RiskTier,
  /// Sum of trend adjustments applied to the base score.
  pub adjustment: i32,
}

/// Trend adjustment in points derived from facility-wide metrics.
pub fn adjustment(metrics: &CitationMetrics) -> i32 {
  let mut points = match metrics.citation_velocity {
    Trend::Worsening => 10,
    Trend::Improving => -10,
    Trend::Stable => 0,
  };
  if metrics.repeat_ftag_rate > REPEAT_RATE_THRESHOLD {
    points += 10;
  }
  if metrics.survey_overdue {
    points += 5;
  }
  points
}

/// Combine ranked category scores and metrics into one score and tier.
///
/// `ranked` must already be sorted descending by composite score.
pub fn aggregate(ranked: &[CategoryScore], metrics: &CitationMetrics) -> OverallRisk {
  let top: Vec<f64> = ranked
    .iter()
    .take(TOP_CATEGORIES)
    .map(|s| s.composite_score)
    .collect();
  let base = if top.is_empty() {
    0.0
  } else {
    (top.iter().sum::<f64>() / top.len() as f64).round()
  };

  let adjustment = adjustment(metrics);
  let score = (base as i32 + adjustment).clamp(0, 100) as u8;
  OverallRisk { score, tier: RiskTier::from_score(score), adjustment }
}
