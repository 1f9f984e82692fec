//! Error types for `carewatch-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("scoring profile {0:?} has invalid weights")]
  InvalidProfile(String),

  #[error("fact for facility {found} passed to assessment of {facility_id}")]
  ForeignFact { facility_id: String, found: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
