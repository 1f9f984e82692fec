//! Focus areas: narrative evidence and prioritised recommendations for each
//! ranked category.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{category::Category, scoring::CategoryScore};

/// Maximum recommendations attached to one focus area.
pub const MAX_RECOMMENDATIONS: usize = 5;

const HIGH_PRIORITY_SCORE: f64 = 60.0;
const MEDIUM_PRIORITY_SCORE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  High,
  Medium,
  Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
  pub priority:    Priority,
  pub title:       String,
  pub description: String,
}

/// One entry of a facility's ranked category list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusArea {
  /// 1-based position in the ranked list.
  pub rank:            usize,
  pub category:        Category,
  pub category_name:   String,
  pub score:           f64,
  pub citation_count:  usize,
  pub evidence:        String,
  pub recommendations: Vec<Recommendation>,
  /// Cited codes, repeat codes first.
  pub codes_to_review: Vec<String>,
}

impl FocusArea {
  /// Assemble the focus area for the category at `rank` (1-based).
  pub fn assemble(rank: usize, score: &CategoryScore) -> Self {
    let aggregate = &score.aggregate;
    let codes_to_review = aggregate
      .repeat_codes
      .iter()
      .chain(
        aggregate
          .cited_codes
          .iter()
          .filter(|c| !aggregate.repeat_codes.contains(*c)),
      )
      .cloned()
      .collect();

    Self {
      rank,
      category: aggregate.category,
      category_name: aggregate.category.name().to_owned(),
      score: score.composite_score,
      citation_count: aggregate.citation_count,
      evidence: evidence(score),
      recommendations: recommendations(score),
      codes_to_review,
    }
  }
}

/// Build focus areas for an already-ranked score list.
pub fn assemble_all(ranked: &[CategoryScore]) -> Vec<FocusArea> {
  ranked
    .iter()
    .enumerate()
    .map(|(i, score)| FocusArea::assemble(i + 1, score))
    .collect()
}

/// Narrative summary, e.g. `"3 citations in past 3 years; including
/// Immediate Jeopardy; 1 repeat code from previous survey"`.
pub fn evidence(score: &CategoryScore) -> String {
  let aggregate = &score.aggregate;
  if aggregate.citation_count == 0 {
    return "No citations in past 3 years".to_owned();
  }

  let mut parts = vec![format!(
    "{} {} in past 3 years",
    aggregate.citation_count,
    plural(aggregate.citation_count, "citation", "citations"),
  )];
  if aggregate.had_immediate_jeopardy {
    parts.push("including Immediate Jeopardy".to_owned());
  } else if aggregate.had_harm {
    parts.push("including actual harm".to_owned());
  }
  let repeats = aggregate.repeat_codes.len();
  if repeats > 0 {
    parts.push(format!(
      "{repeats} repeat {} from previous survey",
      plural(repeats, "code", "codes"),
    ));
  }
  parts.join("; ")
}

/// Recommendations for a category: a forced repeat-citation item when
/// repeats exist, then catalog items prioritised by composite score.
pub fn recommendations(score: &CategoryScore) -> Vec<Recommendation> {
  let aggregate = &score.aggregate;
  let mut out = Vec::with_capacity(MAX_RECOMMENDATIONS);

  if !aggregate.repeat_codes.is_empty() {
    let codes: Vec<&str> = aggregate.repeat_codes.iter().map(String::as_str).collect();
    out.push(Recommendation {
      priority:    Priority::High,
      title:       "Address Repeat Citations".to_owned(),
      description: format!(
        "Codes {} were cited again on the most recent survey; verify the \
         prior plan of correction was implemented and sustained.",
        codes.join(", "),
      ),
    });
  }

  for (i, (title, description)) in catalog(aggregate.category).iter().enumerate() {
    out.push(Recommendation {
      priority:    catalog_priority(i, score.composite_score),
      title:       (*title).to_owned(),
      description: (*description).to_owned(),
    });
  }

  out.truncate(MAX_RECOMMENDATIONS);
  out
}

fn catalog_priority(index: usize, score: f64) -> Priority {
  if index == 0 && score > HIGH_PRIORITY_SCORE {
    Priority::High
  } else if index < 3 && score > MEDIUM_PRIORITY_SCORE {
    Priority::Medium
  } else {
    Priority::Low
  }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
  if n == 1 { one } else { many }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

fn catalog(category: Category) -> &'static [(&'static str, &'static str)] {
  match category {
    Category::AbuseNeglect => &[
      (
        "Audit Abuse Reporting Timelines",
        "Confirm allegations are reported within required timeframes and investigations are \
         documented.",
      ),
      (
        "Refresh Abuse Prevention Training",
        "Re-train all staff on recognising and reporting abuse, neglect, and misappropriation.",
      ),
      (
        "Review Screening Records",
        "Verify background checks and registry screening for every new hire.",
      ),
      (
        "Strengthen Resident Protection Plans",
        "Ensure residents are protected during investigations.",
      ),
    ],
    Category::Administration => &[
      (
        "Review Staffing Coverage",
        "Compare scheduled and actual nurse staffing against census and acuity.",
      ),
      (
        "Strengthen QAPI Program",
        "Verify the quality committee meets, tracks indicators, and closes action items.",
      ),
      (
        "Audit Administrator Oversight",
        "Confirm governing-body review of survey findings and plans of correction.",
      ),
      (
        "Update Facility Assessment",
        "Refresh the facility-wide assessment of resources and competencies.",
      ),
    ],
    Category::CarePlanning => &[
      (
        "Audit Comprehensive Care Plans",
        "Check that care plans are person-centred and updated after each assessment.",
      ),
      (
        "Verify MDS Accuracy",
        "Reconcile assessment coding against clinical documentation.",
      ),
      (
        "Review Discharge Planning",
        "Confirm discharge needs are identified and communicated.",
      ),
      (
        "Check Care Plan Timeliness",
        "Track completion of baseline and comprehensive care plans against deadlines.",
      ),
    ],
    Category::InfectionControl => &[
      (
        "Audit Hand Hygiene Compliance",
        "Observe hand hygiene at the point of care across all shifts.",
      ),
      (
        "Review Infection Surveillance Log",
        "Verify infections are tracked, trended, and acted on.",
      ),
      (
        "Validate PPE and Isolation Practices",
        "Check transmission-based precautions are posted and followed.",
      ),
      (
        "Confirm Antibiotic Stewardship",
        "Review antibiotic orders against stewardship protocols.",
      ),
    ],
    Category::Pharmacy => &[
      (
        "Review Medication Error Rates",
        "Observe medication passes and investigate errors above threshold.",
      ),
      (
        "Audit Psychotropic Use",
        "Verify gradual dose reductions and documented indications.",
      ),
      (
        "Check Drug Regimen Reviews",
        "Confirm pharmacist recommendations are acted on by prescribers.",
      ),
      (
        "Inspect Medication Storage",
        "Check labelling, expiry, and secured storage of medications.",
      ),
    ],
    Category::QualityOfCare => &[
      (
        "Review Fall Prevention Program",
        "Assess fall risk screening, interventions, and post-fall huddles.",
      ),
      (
        "Audit Pressure Injury Prevention",
        "Verify skin assessments, repositioning, and wound care documentation.",
      ),
      (
        "Check Nutrition and Hydration Monitoring",
        "Review weight tracking and dietary interventions.",
      ),
      (
        "Evaluate Pain Management",
        "Confirm pain is assessed and treated per resident goals.",
      ),
    ],
    Category::ResidentRights => &[
      (
        "Review Grievance Process",
        "Verify grievances are logged, investigated, and resolved with the resident.",
      ),
      (
        "Audit Dignity and Privacy Practices",
        "Observe care delivery for dignity, privacy, and choice.",
      ),
      (
        "Check Notification of Changes",
        "Confirm physicians and representatives are notified of changes in condition.",
      ),
      (
        "Update Resident Rights Training",
        "Re-train staff on resident rights and self-determination.",
      ),
    ],
  }
}
