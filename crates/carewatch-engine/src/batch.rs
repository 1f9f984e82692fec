//! The batch run: score every facility matching a filter and persist one
//! snapshot per facility.
//!
//! Facts and benchmarks are loaded once up front and shared read-only. A
//! dispatcher feeds facilities to a fixed pool of workers; each worker
//! scores on the blocking pool and hands the record to a single flusher,
//! which writes in batches of `flush_size`. A failure scoped to one facility
//! is logged and counted. Only a failure to load the run's inputs aborts it.

use std::{
  collections::HashMap,
  num::NonZeroUsize,
  sync::Arc,
  time::{Duration, Instant},
};

use carewatch_core::{
  benchmark::StateCategoryTable,
  fact::{Deficiency, Facility, FacilityFilter},
  quality::QualitySignals,
  snapshot::SnapshotRecord,
  store::RiskStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{CancelToken, Error, Result, RiskService};

pub const DEFAULT_FLUSH_SIZE: usize = 100;

/// Worker count used when none is configured.
pub fn default_workers() -> usize {
  std::thread::available_parallelism()
    .map(NonZeroUsize::get)
    .unwrap_or(4)
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
  pub filter:        FacilityFilter,
  pub calculated_at: DateTime<Utc>,
  pub workers:       usize,
  pub flush_size:    usize,
}

impl BatchOptions {
  pub fn new(calculated_at: DateTime<Utc>) -> Self {
    Self {
      filter: FacilityFilter::default(),
      calculated_at,
      workers: default_workers(),
      flush_size: DEFAULT_FLUSH_SIZE,
    }
  }

  pub fn with_filter(mut self, filter: FacilityFilter) -> Self {
    self.filter = filter;
    self
  }
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
  pub run_id:        Uuid,
  pub calculated_at: DateTime<Utc>,
  /// Facilities whose snapshot was written.
  pub processed:     usize,
  /// Facilities that failed to score or to persist.
  pub errors:        usize,
  /// Facilities never dispatched because the run was cancelled.
  pub skipped:       usize,
  pub flushes:       usize,
  pub cancelled:     bool,
  pub duration:      Duration,
}

// ─── Pipeline messages ───────────────────────────────────────────────────────

struct Job {
  facility: Facility,
  facts:    Vec<Deficiency>,
}

struct Scored {
  facility_id: String,
  outcome:     std::result::Result<SnapshotRecord, String>,
}

#[derive(Debug, Default)]
struct Tally {
  processed: usize,
  errors:    usize,
  flushes:   usize,
}

// ─── Run ─────────────────────────────────────────────────────────────────────

impl<S, Q> RiskService<S, Q>
where
  S: RiskStore + 'static,
  Q: QualitySignals + 'static,
{
  /// Run a batch to completion or until `cancel` trips.
  ///
  /// Cancellation stops dispatch; facilities already handed to a worker
  /// are still scored and flushed before this returns.
  pub async fn run_batch(
    &self,
    options: BatchOptions,
    mut cancel: CancelToken,
  ) -> Result<BatchReport> {
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    let calculated_at = options.calculated_at;
    let workers = options.workers.max(1);
    let flush_size = options.flush_size.max(1);
    let window = self.engine.window(calculated_at);

    info!(%run_id, %calculated_at, workers, flush_size, "starting batch run");

    let facilities = self
      .store
      .list_facilities(&options.filter)
      .await
      .map_err(Error::store)?;
    let facts = self
      .store
      .deficiencies_within(window, &options.filter)
      .await
      .map_err(Error::store)?;
    let aggregates = self
      .store
      .state_aggregates(window, options.filter.state.as_deref())
      .await
      .map_err(Error::store)?;

    let total = facilities.len();
    let mut by_facility: HashMap<String, Vec<Deficiency>> = HashMap::new();
    for fact in facts {
      by_facility.entry(fact.facility_id.clone()).or_default().push(fact);
    }
    let table = Arc::new(StateCategoryTable::from_aggregates(&aggregates));

    info!(%run_id, facilities = total, "loaded batch inputs");

    let (job_tx, job_rx) = mpsc::channel::<Job>(workers * 2);
    let (scored_tx, scored_rx) = mpsc::channel::<Scored>(workers * 2);
    let job_rx = Arc::new(Mutex::new(job_rx));

    let flusher = tokio::spawn(flush_loop(
      Arc::clone(&self.store),
      scored_rx,
      flush_size,
      run_id,
    ));

    let pool: Vec<_> = (0..workers)
      .map(|_| {
        let jobs = Arc::clone(&job_rx);
        let scored = scored_tx.clone();
        let engine = Arc::clone(&self.engine);
        let table = Arc::clone(&table);
        tokio::spawn(async move {
          loop {
            // The lock is held across `recv`: one idle worker waits on the
            // queue while the others wait on the lock.
            let Some(job) = jobs.lock().await.recv().await else {
              break;
            };
            let facility_id = job.facility.facility_id.clone();
            let engine = Arc::clone(&engine);
            let table = Arc::clone(&table);
            let computed = tokio::task::spawn_blocking(move || {
              engine
                .assess(&job.facility, &job.facts, &*table, calculated_at)
                .and_then(|a| a.to_record())
            })
            .await;
            let outcome = match computed {
              Ok(Ok(record)) => Ok(record),
              Ok(Err(e)) => Err(e.to_string()),
              Err(e) => Err(format!("scoring task failed: {e}")),
            };
            if scored.send(Scored { facility_id, outcome }).await.is_err() {
              break;
            }
          }
        })
      })
      .collect();
    drop(scored_tx);

    let mut dispatched = 0;
    let mut cancelled = false;
    for facility in facilities {
      if cancel.is_cancelled() {
        cancelled = true;
        break;
      }
      let facts = by_facility.remove(&facility.facility_id).unwrap_or_default();
      let job = Job { facility, facts };
      tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          cancelled = true;
          break;
        }
        sent = job_tx.send(job) => {
          if sent.is_err() {
            break;
          }
          dispatched += 1;
        }
      }
    }
    drop(job_tx);

    if cancelled {
      warn!(%run_id, dispatched, remaining = total - dispatched, "batch run cancelled");
    }

    for worker in pool {
      worker.await?;
    }
    let tally = flusher.await?;

    let report = BatchReport {
      run_id,
      calculated_at,
      processed: tally.processed,
      errors: tally.errors,
      skipped: total - dispatched,
      flushes: tally.flushes,
      cancelled,
      duration: started.elapsed(),
    };
    info!(
      %run_id,
      processed = report.processed,
      errors = report.errors,
      skipped = report.skipped,
      duration_ms = report.duration.as_millis() as u64,
      "batch run finished"
    );
    Ok(report)
  }
}

// ─── Flusher ─────────────────────────────────────────────────────────────────

async fn flush_loop<S: RiskStore>(
  store: Arc<S>,
  mut scored: mpsc::Receiver<Scored>,
  flush_size: usize,
  run_id: Uuid,
) -> Tally {
  let mut tally = Tally::default();
  let mut buffer = Vec::with_capacity(flush_size);

  while let Some(Scored { facility_id, outcome }) = scored.recv().await {
    match outcome {
      Ok(record) => {
        buffer.push(record);
        if buffer.len() >= flush_size {
          flush(store.as_ref(), &mut buffer, &mut tally, run_id).await;
        }
      }
      Err(message) => {
        warn!(%run_id, facility_id, error = message, "facility scoring failed");
        tally.errors += 1;
      }
    }
  }

  if !buffer.is_empty() {
    flush(store.as_ref(), &mut buffer, &mut tally, run_id).await;
  }
  tally
}

async fn flush<S: RiskStore>(
  store: &S,
  buffer: &mut Vec<SnapshotRecord>,
  tally: &mut Tally,
  run_id: Uuid,
) {
  let records = std::mem::take(buffer);
  let size = records.len();
  tally.flushes += 1;

  match store.upsert_snapshots(records).await {
    Ok(write) => {
      tally.processed += write.written;
      tally.errors += write.failures.len();
      for (facility_id, message) in write.failures {
        warn!(%run_id, facility_id, error = message, "snapshot write failed");
      }
      debug!(%run_id, written = write.written, "flushed snapshots");
    }
    Err(e) => {
      warn!(%run_id, records = size, error = %e, "snapshot flush failed");
      tally.errors += size;
    }
  }
}

#[cfg(test)]
mod tests;
