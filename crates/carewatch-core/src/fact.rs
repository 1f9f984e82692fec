//! Fact types: the immutable inputs the scoring engine reads.
//!
//! Facts are produced by external ingestion (survey data loads, the internal
//! audit spreadsheet pipeline) and are never modified by this system.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{category::Category, severity};

// ─── Deficiency ──────────────────────────────────────────────────────────────

/// One regulatory citation issued to a facility during a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deficiency {
  pub facility_id:   String,
  pub survey_date:   NaiveDate,
  /// Fixed-width citation code, e.g. `"F880"`.
  pub citation_code: String,
  /// Single uppercase letter `A`–`L`; missing or malformed letters weigh 1.
  pub severity:      Option<String>,
  pub is_standard:   bool,
  pub is_complaint:  bool,
  /// Inspector narrative; not used by scoring.
  #[serde(default)]
  pub text:          String,
}

impl Deficiency {
  /// Convenience constructor for a standard (non-complaint) deficiency.
  pub fn standard(
    facility_id: impl Into<String>,
    survey_date: NaiveDate,
    citation_code: impl Into<String>,
    severity: impl Into<String>,
  ) -> Self {
    Self {
      facility_id:   facility_id.into(),
      survey_date,
      citation_code: citation_code.into(),
      severity:      Some(severity.into()),
      is_standard:   true,
      is_complaint:  false,
      text:          String::new(),
    }
  }

  pub fn category(&self) -> Option<Category> { Category::for_code(&self.citation_code) }

  pub fn weight(&self) -> u32 { severity::weight(self.severity.as_deref()) }

  pub fn band(&self) -> Option<severity::SeverityBand> {
    self.severity.as_deref().and_then(severity::band)
  }
}

// ─── Facility ────────────────────────────────────────────────────────────────

/// Star ratings published for a facility, when known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRatings {
  pub overall:         Option<u8>,
  pub health_surveys:  Option<u8>,
  pub staffing:        Option<u8>,
  pub quality_measure: Option<u8>,
}

/// A certified care facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
  pub facility_id:     String,
  pub name:            String,
  /// Two-letter state code.
  pub state:           String,
  pub certified_beds:  u32,
  pub ownership_type:  Option<String>,
  #[serde(default)]
  pub ratings:         QualityRatings,
  #[serde(default)]
  pub special_focus:   bool,
  #[serde(default)]
  pub fine_count:      u32,
  #[serde(default)]
  pub fine_total:      f64,
  /// Total nurse staffing hours per resident day.
  pub staffing_hours:  Option<f64>,
  /// Annual nursing staff turnover, as a fraction.
  pub staff_turnover:  Option<f64>,
  pub occupancy_rate:  Option<f64>,
}

impl Facility {
  /// A facility with only the identifying fields set.
  pub fn new(
    facility_id: impl Into<String>,
    name: impl Into<String>,
    state: impl Into<String>,
    certified_beds: u32,
  ) -> Self {
    Self {
      facility_id: facility_id.into(),
      name: name.into(),
      state: state.into(),
      certified_beds,
      ownership_type: None,
      ratings: QualityRatings::default(),
      special_focus: false,
      fine_count: 0,
      fine_total: 0.0,
      staffing_hours: None,
      staff_turnover: None,
      occupancy_rate: None,
    }
  }

  /// Inclusive bed-count band used to select peers: ±25% of this facility.
  pub fn peer_bed_band(&self) -> (u32, u32) {
    let beds = f64::from(self.certified_beds);
    ((beds * 0.75).floor() as u32, (beds * 1.25).ceil() as u32)
  }
}

/// Start-time filter for listing facilities. An empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilityFilter {
  pub state:       Option<String>,
  pub facility_id: Option<String>,
}

// ─── Internal audit items ────────────────────────────────────────────────────

/// An item from the facility's internal audit scorecard, cross-referenced
/// into on-demand reports by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditItem {
  pub item_id:     String,
  pub facility_id: String,
  pub category:    Category,
  pub title:       String,
  /// Latest scorecard result, 0–100, if the item has been scored.
  pub score:       Option<f64>,
}
