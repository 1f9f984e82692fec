//! Error type for `carewatch-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Core(#[from] carewatch_core::Error),

  #[error("batch task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl Error {
  /// Box a backend error from any [`RiskStore`](carewatch_core::store::RiskStore).
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
