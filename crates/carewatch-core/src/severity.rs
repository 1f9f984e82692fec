//! Severity letters (A–L), their harm bands and scoring weights.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Weight applied when a severity letter is missing or unrecognised.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Harm band a severity letter falls into.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeverityBand {
  /// A–C
  NoHarm,
  /// D–F
  PotentialHarm,
  /// G–I
  ActualHarm,
  /// J–L
  ImmediateJeopardy,
}

impl SeverityBand {
  pub fn weight(self) -> u32 {
    match self {
      Self::NoHarm => 1,
      Self::PotentialHarm => 2,
      Self::ActualHarm => 5,
      Self::ImmediateJeopardy => 10,
    }
  }
}

/// Numeric position of a severity letter: `A` = 1 … `L` = 12.
pub fn ordinal(letter: &str) -> Option<u8> {
  match letter.trim().as_bytes() {
    [b @ b'A'..=b'L'] => Some(b - b'A' + 1),
    _ => None,
  }
}

/// The harm band for a letter, or `None` if it is not in `A..=L`.
pub fn band(letter: &str) -> Option<SeverityBand> {
  ordinal(letter).map(|n| match n {
    1..=3 => SeverityBand::NoHarm,
    4..=6 => SeverityBand::PotentialHarm,
    7..=9 => SeverityBand::ActualHarm,
    _ => SeverityBand::ImmediateJeopardy,
  })
}

/// Scoring weight of an optional severity letter.
pub fn weight(letter: Option<&str>) -> u32 {
  letter
    .and_then(band)
    .map_or(DEFAULT_WEIGHT, SeverityBand::weight)
}
