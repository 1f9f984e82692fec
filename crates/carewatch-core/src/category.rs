//! Clinical categories and the citation-code → category table.
//!
//! The table is version-pinned: changing it changes every score the engine
//! produces, so [`CATEGORY_TABLE_VERSION`] must be bumped alongside any edit.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Version of the code → category table below.
pub const CATEGORY_TABLE_VERSION: &str = "2024.1";

/// One of the seven fixed clinical groupings used for scoring.
///
/// Declaration order matches the lexical order of [`Category::id`], so the
/// derived `Ord` is the "category id ascending" tie-break.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
  AbuseNeglect,
  Administration,
  CarePlanning,
  InfectionControl,
  Pharmacy,
  QualityOfCare,
  ResidentRights,
}

impl Category {
  /// Number of categories; ranked lists always have this many entries.
  pub const COUNT: usize = 7;

  /// Stable identifier stored in the `category_id` column.
  pub fn id(self) -> &'static str { self.into() }

  /// Human-readable name.
  pub fn name(self) -> &'static str {
    match self {
      Self::AbuseNeglect => "Abuse & Neglect",
      Self::Administration => "Administration & Staffing",
      Self::CarePlanning => "Assessment & Care Planning",
      Self::InfectionControl => "Infection Control",
      Self::Pharmacy => "Pharmacy Services",
      Self::QualityOfCare => "Quality of Care",
      Self::ResidentRights => "Resident Rights",
    }
  }

  /// Look up the category a citation code belongs to.
  ///
  /// Codes are matched after trimming and upper-casing. Unmapped codes
  /// return `None`; they still count toward facility-wide totals.
  pub fn for_code(code: &str) -> Option<Self> {
    let code = code.trim().to_ascii_uppercase();
    CODE_TABLE
      .iter()
      .find(|(_, codes)| codes.contains(&code.as_str()))
      .map(|(category, _)| *category)
  }
}

// ─── Table ───────────────────────────────────────────────────────────────────

const CODE_TABLE: &[(Category, &[&str])] = &[
  (Category::AbuseNeglect, &[
    "F600", "F602", "F603", "F604", "F605", "F606", "F607", "F608", "F609",
    "F610",
  ]),
  (Category::Administration, &[
    "F725", "F726", "F727", "F835", "F836", "F837", "F838", "F841", "F849",
    "F850", "F851", "F865", "F867",
  ]),
  (Category::CarePlanning, &[
    "F636", "F637", "F638", "F641", "F655", "F656", "F657", "F658", "F659",
    "F660", "F661",
  ]),
  (Category::InfectionControl, &[
    "F880", "F881", "F882", "F883", "F884", "F885", "F886", "F887", "F888",
  ]),
  (Category::Pharmacy, &[
    "F755", "F756", "F757", "F758", "F759", "F760", "F761",
  ]),
  (Category::QualityOfCare, &[
    "F684", "F686", "F687", "F688", "F689", "F690", "F692", "F693", "F694",
    "F695", "F697", "F698", "F700",
  ]),
  (Category::ResidentRights, &[
    "F550", "F551", "F552", "F553", "F554", "F557", "F558", "F559", "F561",
    "F565", "F580", "F582", "F583", "F584", "F585",
  ]),
];
