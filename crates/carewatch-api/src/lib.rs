//! JSON REST API for Carewatch.
//!
//! Exposes an axum [`Router`] backed by a [`RiskService`] over any
//! [`carewatch_core::store::RiskStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", carewatch_api::api_router(service.clone()))
//! ```

pub mod error;
pub mod risk;

use std::sync::Arc;

use axum::{Router, routing::get};
use carewatch_core::store::RiskStore;
use carewatch_engine::RiskService;

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<RiskService<S>>) -> Router<()>
where
  S: RiskStore + 'static,
{
  Router::new()
    .route("/facilities/{id}/risk", get(risk::assess::<S>))
    .route("/facilities/{id}/risk/latest", get(risk::latest::<S>))
    .route("/facilities/{id}/risk/history", get(risk::history::<S>))
    .with_state(service)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
  };
  use carewatch_core::{
    engine::RiskEngine,
    fact::{Deficiency, Facility},
  };
  use carewatch_engine::{BatchOptions, CancelToken};
  use carewatch_store_sqlite::SqliteStore;
  use chrono::{NaiveDate, TimeZone as _, Utc};
  use serde_json::Value;
  use tower::ServiceExt as _;

  use super::*;

  async fn service() -> Arc<RiskService<SqliteStore>> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .upsert_facility(&Facility::new("145001", "Lakeside Care Center", "IL", 120))
      .await
      .unwrap();
    store
      .insert_deficiencies(vec![Deficiency::standard(
        "145001",
        NaiveDate::from_ymd_opt(2024, 2, 20).unwrap(),
        "F689",
        "G",
      )])
      .await
      .unwrap();
    Arc::new(RiskService::new(Arc::new(store), RiskEngine::default()))
  }

  async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
      .oneshot(Request::get(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn assess_returns_ranked_report() {
    let router = api_router(service().await);
    let (status, body) = get(router, "/facilities/145001/risk?as_of=2024-06-01T00:00:00Z").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["facility_id"], "145001");
    assert_eq!(body["model_version"], "1.0/detailed");
    assert_eq!(body["data_as_of"], "2024-02-20");
    let categories = body["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 7);
    assert_eq!(categories[0]["category"], "quality_of_care");
    assert_eq!(categories[0]["rank"], 1);
  }

  #[tokio::test]
  async fn assess_unknown_facility_is_404() {
    let router = api_router(service().await);
    let (status, body) = get(router, "/facilities/999999/risk").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("999999"));
  }

  #[tokio::test]
  async fn latest_is_404_until_a_batch_runs() {
    let service = service().await;
    let (status, _) = get(api_router(service.clone()), "/facilities/145001/risk/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let calculated_at = Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap();
    service
      .run_batch(BatchOptions::new(calculated_at), CancelToken::never())
      .await
      .unwrap();

    let (status, body) = get(api_router(service.clone()), "/facilities/145001/risk/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot"]["facility_id"], "145001");
    assert_eq!(body["category_rows"].as_array().unwrap().len(), 7);

    let (status, body) = get(api_router(service), "/facilities/145001/risk/history?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn history_rejects_zero_limit() {
    let router = api_router(service().await);
    let (status, _) = get(router, "/facilities/145001/risk/history?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}
