//! Handlers for `/facilities/{id}/risk` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/facilities/{id}/risk` | Scores now; optional `?as_of=<RFC 3339>` |
//! | `GET`  | `/facilities/{id}/risk/latest` | Latest persisted snapshot, 404 if none |
//! | `GET`  | `/facilities/{id}/risk/history` | Optional `?limit=N` (default 20, max 500) |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use carewatch_core::{
  snapshot::{FacilityRiskSnapshot, SnapshotRecord},
  store::RiskStore,
};
use carewatch_engine::{AssessmentOutcome, FacilityRiskReport, RiskService};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 500;

// ─── Assess ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AssessParams {
  pub as_of: Option<DateTime<Utc>>,
}

/// `GET /facilities/{id}/risk[?as_of=<timestamp>]`
pub async fn assess<S>(
  State(service): State<Arc<RiskService<S>>>,
  Path(id): Path<String>,
  Query(params): Query<AssessParams>,
) -> Result<Json<FacilityRiskReport>, ApiError>
where
  S: RiskStore + 'static,
{
  let calculated_at = params.as_of.unwrap_or_else(Utc::now);
  match service.assess(&id, calculated_at).await {
    AssessmentOutcome::Found(report) => Ok(Json(*report)),
    AssessmentOutcome::NotFound { facility_id } => {
      Err(ApiError::NotFound(format!("facility {facility_id}")))
    }
    AssessmentOutcome::Failed { message } => Err(ApiError::Assessment(message)),
  }
}

// ─── Latest ──────────────────────────────────────────────────────────────────

/// `GET /facilities/{id}/risk/latest`
pub async fn latest<S>(
  State(service): State<Arc<RiskService<S>>>,
  Path(id): Path<String>,
) -> Result<Json<SnapshotRecord>, ApiError>
where
  S: RiskStore + 'static,
{
  service
    .latest_snapshot(&id)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no snapshot for facility {id}")))
}

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub limit: Option<usize>,
}

/// `GET /facilities/{id}/risk/history[?limit=N]`
pub async fn history<S>(
  State(service): State<Arc<RiskService<S>>>,
  Path(id): Path<String>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<FacilityRiskSnapshot>>, ApiError>
where
  S: RiskStore + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
  if limit == 0 || limit > MAX_HISTORY_LIMIT {
    return Err(ApiError::BadRequest(format!(
      "limit must be between 1 and {MAX_HISTORY_LIMIT}"
    )));
  }

  service
    .snapshot_history(&id, limit)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("facility {id}")))
}
