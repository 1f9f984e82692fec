//! Async orchestration of the risk engine over any
//! [`RiskStore`](carewatch_core::store::RiskStore).
//!
//! [`RiskService`] serves two call paths: on-demand assessment of a single
//! facility ([`RiskService::assess`]) and the batch run over many
//! facilities ([`RiskService::run_batch`]).

pub mod assess;
pub mod batch;
pub mod cancel;
pub mod error;

use std::sync::Arc;

use carewatch_core::{
  engine::RiskEngine,
  quality::{NeutralQualitySignals, QualitySignals},
  store::RiskStore,
};

pub use assess::{AssessmentOutcome, BenchmarkSource, CategoryReport, FacilityRiskReport};
pub use batch::{BatchOptions, BatchReport};
pub use cancel::{CancelHandle, CancelToken, cancellation};
pub use error::{Error, Result};

/// A store paired with the engine that scores its facts.
pub struct RiskService<S, Q = NeutralQualitySignals> {
  store:  Arc<S>,
  engine: Arc<RiskEngine<Q>>,
}

impl<S, Q> Clone for RiskService<S, Q> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      engine: Arc::clone(&self.engine),
    }
  }
}

impl<S, Q> RiskService<S, Q>
where
  S: RiskStore + 'static,
  Q: QualitySignals + 'static,
{
  pub fn new(store: Arc<S>, engine: RiskEngine<Q>) -> Self {
    Self { store, engine: Arc::new(engine) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn engine(&self) -> &RiskEngine<Q> { &self.engine }
}

#[cfg(test)]
mod testing;
