//! Benchmark providers: how a facility's category citation counts compare
//! with similar facilities.
//!
//! Two lookup shapes sit behind [`Benchmark`]:
//!
//! - [`PeerBenchmark`]: built from a live peer-group query (same state,
//!   certified beds within ±25%), used by on-demand assessments.
//! - [`StateCategoryTable`]: a state × category table built once per batch
//!   run and shared read-only between workers.
//!
//! Both are derived from raw [`CitationAggregate`]s so the code → category
//! mapping stays in this crate rather than in SQL.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

use crate::{category::Category, fact::Facility};

/// Peer factor used when no benchmark data exists.
pub const NEUTRAL_PEER_FACTOR: f64 = 50.0;

// ─── Raw aggregates ──────────────────────────────────────────────────────────

/// Citation counts by code over a set of facilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationAggregate {
  pub facility_count: u64,
  pub code_counts:    BTreeMap<String, u64>,
}

impl CitationAggregate {
  pub fn total_citations(&self) -> u64 { self.code_counts.values().sum() }

  /// Mean citations per facility for each category. Empty when the
  /// aggregate covers no facilities.
  pub fn category_averages(&self) -> HashMap<Category, f64> {
    if self.facility_count == 0 {
      return HashMap::new();
    }
    let mut sums: HashMap<Category, u64> = Category::iter().map(|c| (c, 0)).collect();
    for (code, count) in &self.code_counts {
      if let Some(category) = Category::for_code(code) {
        *sums.entry(category).or_default() += count;
      }
    }
    let facilities = self.facility_count as f64;
    sums
      .into_iter()
      .map(|(category, sum)| (category, sum as f64 / facilities))
      .collect()
  }
}

/// A [`CitationAggregate`] for every facility of one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAggregate {
  pub state:     String,
  pub aggregate: CitationAggregate,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of comparison averages for the peer factor.
pub trait Benchmark {
  /// Average citation count per facility in `category` among the facility's
  /// comparison group, or `None` if there is no comparison data.
  fn category_average(&self, facility: &Facility, category: Category) -> Option<f64>;
}

impl<B: Benchmark + ?Sized> Benchmark for &B {
  fn category_average(&self, facility: &Facility, category: Category) -> Option<f64> {
    (**self).category_average(facility, category)
  }
}

/// No comparison data: every peer factor is neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBenchmark;

impl Benchmark for NoBenchmark {
  fn category_average(&self, _: &Facility, _: Category) -> Option<f64> { None }
}

/// Consult `primary`, then `fallback` when the primary has no data.
#[derive(Debug, Clone)]
pub struct Fallback<A, B> {
  pub primary:  A,
  pub fallback: B,
}

impl<A: Benchmark, B: Benchmark> Benchmark for Fallback<A, B> {
  fn category_average(&self, facility: &Facility, category: Category) -> Option<f64> {
    self
      .primary
      .category_average(facility, category)
      .or_else(|| self.fallback.category_average(facility, category))
  }
}

// ─── Peer group ──────────────────────────────────────────────────────────────

/// Averages of one facility's peer group. The facility is implied: the
/// group was selected for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerBenchmark {
  peer_count: u64,
  averages:   HashMap<Category, f64>,
}

impl PeerBenchmark {
  pub fn from_aggregate(aggregate: &CitationAggregate) -> Self {
    Self {
      peer_count: aggregate.facility_count,
      averages:   aggregate.category_averages(),
    }
  }

  pub fn peer_count(&self) -> u64 { self.peer_count }
}

impl Benchmark for PeerBenchmark {
  fn category_average(&self, _: &Facility, category: Category) -> Option<f64> {
    self.averages.get(&category).copied()
  }
}

// ─── State × category table ──────────────────────────────────────────────────

/// Per-state category averages, keyed for O(1) lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateCategoryTable {
  averages: HashMap<(String, Category), f64>,
}

impl StateCategoryTable {
  pub fn from_aggregates(aggregates: &[StateAggregate]) -> Self {
    let averages = aggregates
      .iter()
      .flat_map(|s| {
        s.aggregate
          .category_averages()
          .into_iter()
          .map(|(category, avg)| ((s.state.to_ascii_uppercase(), category), avg))
      })
      .collect();
    Self { averages }
  }

  pub fn get(&self, state: &str, category: Category) -> Option<f64> {
    self
      .averages
      .get(&(state.to_ascii_uppercase(), category))
      .copied()
  }

  pub fn is_empty(&self) -> bool { self.averages.is_empty() }
}

impl Benchmark for StateCategoryTable {
  fn category_average(&self, facility: &Facility, category: Category) -> Option<f64> {
    self.get(&facility.state, category)
  }
}

// ─── Peer factor ─────────────────────────────────────────────────────────────

/// Relative standing of `citation_count` against `average`, 0–100 with 50
/// meaning "at the average".
pub fn peer_factor(citation_count: usize, average: Option<f64>) -> f64 {
  let Some(average) = average else {
    return NEUTRAL_PEER_FACTOR;
  };
  let delta = citation_count as f64 - average;
  (50.0 + 50.0 * delta / average.max(1.0)).clamp(0.0, 100.0)
}
