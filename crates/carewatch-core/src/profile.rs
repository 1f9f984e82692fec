//! Scoring profiles: named weight splits for the composite category score.
//!
//! Two splits exist in production history and it has not been confirmed
//! which one is canonical, so both are available by name and the choice is
//! made in configuration.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// Version of the scoring model; combined with the profile name to form
/// the snapshot's model version.
pub const MODEL_VERSION: &str = "1.0";

/// Name of a built-in weight profile.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProfileName {
  /// citation 40 / peer 25 / quality level 15 / quality trend 10 / staffing 10
  #[default]
  Detailed,
  /// citation 50 / peer 30 / quality level 20
  Batch,
}

/// Relative weights of the five factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
  pub citation:      f64,
  pub peer:          f64,
  pub quality_level: f64,
  pub quality_trend: f64,
  pub staffing:      f64,
}

impl FactorWeights {
  pub fn total(&self) -> f64 {
    self.citation + self.peer + self.quality_level + self.quality_trend + self.staffing
  }
}

/// A named set of factor weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
  name:    String,
  weights: FactorWeights,
}

impl ScoringProfile {
  /// Build a custom profile. Weights must be finite, non-negative, and not
  /// all zero.
  pub fn new(name: impl Into<String>, weights: FactorWeights) -> Result<Self> {
    let name = name.into();
    let parts = [
      weights.citation,
      weights.peer,
      weights.quality_level,
      weights.quality_trend,
      weights.staffing,
    ];
    if parts.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.total() <= 0.0 {
      return Err(Error::InvalidProfile(name));
    }
    Ok(Self { name, weights })
  }

  pub fn detailed() -> Self {
    Self {
      name:    ProfileName::Detailed.to_string(),
      weights: FactorWeights {
        citation:      0.40,
        peer:          0.25,
        quality_level: 0.15,
        quality_trend: 0.10,
        staffing:      0.10,
      },
    }
  }

  pub fn batch() -> Self {
    Self {
      name:    ProfileName::Batch.to_string(),
      weights: FactorWeights {
        citation:      0.50,
        peer:          0.30,
        quality_level: 0.20,
        quality_trend: 0.0,
        staffing:      0.0,
      },
    }
  }

  pub fn named(name: ProfileName) -> Self {
    match name {
      ProfileName::Detailed => Self::detailed(),
      ProfileName::Batch => Self::batch(),
    }
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn weights(&self) -> &FactorWeights { &self.weights }

  /// Model version recorded on snapshots, e.g. `"1.0/detailed"`.
  pub fn model_version(&self) -> String { format!("{MODEL_VERSION}/{}", self.name) }
}

impl Default for ScoringProfile {
  fn default() -> Self { Self::named(ProfileName::default()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn built_in_profiles_sum_to_one() {
    for profile in [ScoringProfile::detailed(), ScoringProfile::batch()] {
      assert!((profile.weights().total() - 1.0).abs() < 1e-9, "{}", profile.name());
    }
  }

  #[test]
  fn names_parse_and_version() {
    assert_eq!("batch".parse::<ProfileName>().ok(), Some(ProfileName::Batch));
    assert_eq!(ScoringProfile::named(ProfileName::Batch).model_version(), "1.0/batch");
    assert_eq!(ScoringProfile::default().name(), "detailed");
  }

  #[test]
  fn rejects_degenerate_weights() {
    let zero = FactorWeights {
      citation:      0.0,
      peer:          0.0,
      quality_level: 0.0,
      quality_trend: 0.0,
      staffing:      0.0,
    };
    assert!(matches!(ScoringProfile::new("zero", zero), Err(Error::InvalidProfile(_))));

    let negative = FactorWeights { citation: -1.0, peer: 2.0, ..zero };
    assert!(ScoringProfile::new("neg", negative).is_err());
  }
}
