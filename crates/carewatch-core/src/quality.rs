//! Quality-measure signals feeding the non-citation factors.
//!
//! Quality-measure statistics are not yet integrated. [`NeutralQualitySignals`]
//! stands in until a data-backed implementation replaces it.

use crate::{category::Category, fact::Facility};

/// Neutral value for every placeholder factor.
pub const NEUTRAL_FACTOR: f64 = 50.0;

/// Per-category quality inputs, each on a 0–100 scale where higher means
/// more risk.
pub trait QualitySignals: Send + Sync {
  /// Current quality-measure level for the category.
  fn quality_level(&self, facility: &Facility, category: Category) -> f64;

  /// Direction of quality measures over recent quarters.
  fn quality_trend(&self, facility: &Facility, category: Category) -> f64;

  /// Staffing adequacy as it bears on the category.
  fn staffing(&self, facility: &Facility, category: Category) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralQualitySignals;

impl QualitySignals for NeutralQualitySignals {
  fn quality_level(&self, _: &Facility, _: Category) -> f64 { NEUTRAL_FACTOR }

  fn quality_trend(&self, _: &Facility, _: Category) -> f64 { NEUTRAL_FACTOR }

  fn staffing(&self, _: &Facility, _: Category) -> f64 { NEUTRAL_FACTOR }
}
