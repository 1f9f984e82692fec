//! On-demand assessment of a single facility.

use carewatch_core::{
  benchmark::{Fallback, PeerBenchmark, StateCategoryTable},
  category::Category,
  engine::{FacilityAssessment, KeyMetrics},
  fact::AuditItem,
  focus::FocusArea,
  overall::RiskTier,
  quality::QualitySignals,
  scoring::FactorScores,
  snapshot::{FacilityRiskSnapshot, SnapshotRecord},
  store::RiskStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{Error, Result, RiskService};

// ─── Report ──────────────────────────────────────────────────────────────────

/// Where the peer factor's averages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BenchmarkSource {
  Peer { peer_count: u64 },
  State,
  /// Neither comparison had data; every peer factor is neutral.
  Neutral,
}

/// One ranked category of an on-demand report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
  #[serde(flatten)]
  pub focus:       FocusArea,
  pub factors:     FactorScores,
  /// Internal audit items filed under this category.
  pub audit_items: Vec<AuditItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRiskReport {
  pub facility_id:    String,
  pub facility_name:  String,
  pub state:          String,
  pub certified_beds: u32,
  pub overall_score:  u8,
  pub overall_tier:   RiskTier,
  pub tier_label:     String,
  pub calculated_at:  DateTime<Utc>,
  pub model_version:  String,
  pub data_as_of:     Option<NaiveDate>,
  pub benchmark:      BenchmarkSource,
  pub key_metrics:    KeyMetrics,
  pub categories:     Vec<CategoryReport>,
}

impl FacilityRiskReport {
  fn new(
    assessment: &FacilityAssessment,
    benchmark: BenchmarkSource,
    audit_items: &[AuditItem],
  ) -> Self {
    let items_for = |category: Category| -> Vec<AuditItem> {
      audit_items
        .iter()
        .filter(|i| i.category == category)
        .cloned()
        .collect()
    };

    let categories = assessment
      .focus_areas
      .iter()
      .zip(&assessment.categories)
      .map(|(focus, score)| CategoryReport {
        focus:       focus.clone(),
        factors:     score.factors,
        audit_items: items_for(focus.category),
      })
      .collect();

    let facility = &assessment.facility;
    Self {
      facility_id: facility.facility_id.clone(),
      facility_name: facility.name.clone(),
      state: facility.state.clone(),
      certified_beds: facility.certified_beds,
      overall_score: assessment.overall.score,
      overall_tier: assessment.overall.tier,
      tier_label: assessment.overall.tier.label().to_owned(),
      calculated_at: assessment.calculated_at,
      model_version: assessment.model_version.clone(),
      data_as_of: assessment.data_as_of(),
      benchmark,
      key_metrics: assessment.key_metrics(),
      categories,
    }
  }
}

/// Result of an on-demand request. A missing facility or an internal
/// failure is an outcome, not an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum AssessmentOutcome {
  Found(Box<FacilityRiskReport>),
  NotFound { facility_id: String },
  Failed { message: String },
}

// ─── Service ─────────────────────────────────────────────────────────────────

impl<S, Q> RiskService<S, Q>
where
  S: RiskStore + 'static,
  Q: QualitySignals + 'static,
{
  /// Assess one facility as of `calculated_at` without persisting anything.
  pub async fn assess(&self, facility_id: &str, calculated_at: DateTime<Utc>) -> AssessmentOutcome {
    match self.try_assess(facility_id, calculated_at).await {
      Ok(Some(report)) => AssessmentOutcome::Found(Box::new(report)),
      Ok(None) => AssessmentOutcome::NotFound { facility_id: facility_id.to_owned() },
      Err(e) => {
        error!(facility_id, error = %e, "on-demand assessment failed");
        AssessmentOutcome::Failed { message: e.to_string() }
      }
    }
  }

  async fn try_assess(
    &self,
    facility_id: &str,
    calculated_at: DateTime<Utc>,
  ) -> Result<Option<FacilityRiskReport>> {
    let Some(facility) = self
      .store
      .get_facility(facility_id)
      .await
      .map_err(Error::store)?
    else {
      return Ok(None);
    };

    let window = self.engine.window(calculated_at);
    let facts = self
      .store
      .facility_deficiencies(facility_id, window)
      .await
      .map_err(Error::store)?;

    // The comparisons only need the facility row, so they run together.
    let (peers, states, audit) = tokio::join!(
      self.store.peer_aggregate(&facility, window),
      self.store.state_aggregates(window, Some(facility.state.as_str())),
      self.store.audit_items(facility_id),
    );

    let peers = peers
      .map(|a| PeerBenchmark::from_aggregate(&a))
      .unwrap_or_else(|e| {
        warn!(facility_id, error = %e, "peer comparison unavailable, using neutral defaults");
        PeerBenchmark::default()
      });
    let states = states
      .map(|a| StateCategoryTable::from_aggregates(&a))
      .unwrap_or_else(|e| {
        warn!(facility_id, error = %e, "state comparison unavailable, using neutral defaults");
        StateCategoryTable::default()
      });
    let audit = audit.unwrap_or_else(|e| {
      warn!(facility_id, error = %e, "audit items unavailable");
      Vec::new()
    });

    let source = if peers.peer_count() > 0 {
      BenchmarkSource::Peer { peer_count: peers.peer_count() }
    } else if !states.is_empty() {
      BenchmarkSource::State
    } else {
      BenchmarkSource::Neutral
    };

    let benchmark = Fallback { primary: peers, fallback: states };
    let assessment = self
      .engine
      .assess(&facility, &facts, &benchmark, calculated_at)?;

    debug!(
      facility_id,
      score = assessment.overall.score,
      facts = facts.len(),
      "assessed facility"
    );
    Ok(Some(FacilityRiskReport::new(&assessment, source, &audit)))
  }

  // ── Snapshot reads ────────────────────────────────────────────────────────

  /// The most recent persisted snapshot with its category rows.
  pub async fn latest_snapshot(&self, facility_id: &str) -> Result<Option<SnapshotRecord>> {
    let Some(snapshot) = self
      .store
      .latest_snapshot(facility_id)
      .await
      .map_err(Error::store)?
    else {
      return Ok(None);
    };
    let category_rows = self
      .store
      .category_rows(facility_id, snapshot.calculated_at)
      .await
      .map_err(Error::store)?;
    Ok(Some(SnapshotRecord { snapshot, category_rows }))
  }

  /// Persisted snapshots of a facility, newest first. `None` when the
  /// facility is unknown.
  pub async fn snapshot_history(
    &self,
    facility_id: &str,
    limit: usize,
  ) -> Result<Option<Vec<FacilityRiskSnapshot>>> {
    if self
      .store
      .get_facility(facility_id)
      .await
      .map_err(Error::store)?
      .is_none()
    {
      return Ok(None);
    }
    let snapshots = self
      .store
      .list_snapshots(facility_id, limit)
      .await
      .map_err(Error::store)?;
    Ok(Some(snapshots))
  }
}
