//! Runtime settings, layered from an optional TOML file and `CAREWATCH_*`
//! environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `CAREWATCH_BATCH__WORKERS=8`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use carewatch_core::{history::DEFAULT_LOOKBACK_MONTHS, profile::ProfileName};
use carewatch_engine::batch::{DEFAULT_FLUSH_SIZE, default_workers};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// Weight split used for every score this process computes.
  pub scoring_profile: ProfileName,
  pub lookback_months: u32,
  pub batch:           BatchSettings,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_string(),
      port:            8080,
      store_path:      PathBuf::from("carewatch.db"),
      scoring_profile: ProfileName::default(),
      lookback_months: DEFAULT_LOOKBACK_MONTHS,
      batch:           BatchSettings::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
  /// Defaults to the available parallelism.
  pub workers:    Option<usize>,
  pub flush_size: usize,
}

impl Default for BatchSettings {
  fn default() -> Self { Self { workers: None, flush_size: DEFAULT_FLUSH_SIZE } }
}

impl BatchSettings {
  pub fn workers(&self) -> usize { self.workers.unwrap_or_else(default_workers) }
}

impl Settings {
  /// Load settings from `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CAREWATCH")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
