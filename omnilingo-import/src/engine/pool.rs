//! Bounded worker pool with event-driven admission control
//!
//! **Algorithm:**
//! 1. Hold a free-list of `worker_count` slots and a `JoinSet` of in-flight chunk tasks
//! 2. Until the source is exhausted: if a slot is free, pull the next chunk
//!    and spawn it on that slot; otherwise block on `join_next()` until a
//!    task finishes and returns its slot; finished tasks are reaped before
//!    every admission. `chunk_count` is the planned figure only: a stream
//!    holding more records than counted is still read to the end
//! 3. Each task merges its pairs into the shared aggregator and updates the
//!    tracker itself, before its slot is handed back
//! 4. Drain: join every remaining task, then finalize the index
//!
//! Admission is exact: at most `worker_count` chunks are ever in flight.

use super::{
    Chunk, ChunkProcessor, ChunkSource, ChunkSpan, Index, Plan, ProgressTracker,
    ResultAggregator, WorkerContext,
};
use crate::error::{ImportError, ImportResult};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, warn};

/// What to do when a chunk fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop admitting chunks after the first failure, let running chunks
    /// finish, then fail the run and withhold the index
    #[default]
    Strict,
    /// Run every chunk and return the partial index with the failure list
    BestEffort,
}

/// One failed chunk, with enough detail to retry its record range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk: ChunkSpan,
    pub worker: usize,
    pub cause: String,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on worker {}: {}", self.chunk, self.worker, self.cause)
    }
}

/// Result of a drained pool
#[derive(Debug)]
pub struct PoolOutcome<K: Eq + std::hash::Hash, V> {
    pub index: Index<K, V>,
    pub chunks_submitted: usize,
    pub records_submitted: usize,
    pub pairs_merged: usize,
    /// Empty unless running best-effort
    pub failures: Vec<ChunkFailure>,
}

struct TaskReport {
    slot: usize,
    failure: Option<ChunkFailure>,
}

/// Runs chunks on at most `worker_count` concurrent tasks
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    worker_count: usize,
    chunk_count: usize,
    policy: FailurePolicy,
}

impl WorkerPool {
    pub fn new(plan: &Plan, policy: FailurePolicy) -> Self {
        Self {
            worker_count: plan.worker_count.max(1),
            chunk_count: plan.chunk_count,
            policy,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Run every chunk of `source` through `processor`
    ///
    /// # Errors
    /// - [`ImportError::Read`] when the record stream fails; in-flight chunks
    ///   are drained first and no index is returned
    /// - [`ImportError::ChunksFailed`] in strict mode when any chunk failed
    /// - [`ImportError::Worker`] if a task could not be joined
    pub async fn run<P, I, E>(
        &self,
        mut source: ChunkSource<I>,
        processor: Arc<P>,
        tracker: Arc<ProgressTracker>,
    ) -> ImportResult<PoolOutcome<P::Key, P::Value>>
    where
        P: ChunkProcessor,
        I: Iterator<Item = Result<P::Record, E>>,
        E: fmt::Display,
    {
        let aggregator = Arc::new(ResultAggregator::new());
        let mut in_flight: JoinSet<TaskReport> = JoinSet::new();
        let mut free_slots: Vec<usize> = (0..self.worker_count).rev().collect();
        let mut failures = Vec::new();
        let mut chunks_submitted = 0;
        let mut records_submitted = 0;
        let mut read_error = None;

        loop {
            // Reap tasks that already finished so their slots and failures count now
            while let Some(Some(joined)) = in_flight.join_next().now_or_never() {
                let report = settle(joined, &mut failures)?;
                free_slots.push(report.slot);
            }

            if self.policy == FailurePolicy::Strict && !failures.is_empty() {
                warn!(
                    failed = failures.len(),
                    submitted = chunks_submitted,
                    planned = self.chunk_count,
                    "Chunk failed, admitting no further chunks"
                );
                break;
            }

            // Wait for a slot; the finishing task hands its slot back
            let Some(slot) = free_slots.pop() else {
                match in_flight.join_next().await {
                    Some(joined) => {
                        let report = settle(joined, &mut failures)?;
                        free_slots.push(report.slot);
                    }
                    None => {
                        return Err(ImportError::Worker(
                            "no free worker slot and nothing in flight".to_string(),
                        ))
                    }
                }
                continue;
            };

            let chunk = match source.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    free_slots.push(slot);
                    if chunks_submitted < self.chunk_count {
                        debug!(
                            submitted = chunks_submitted,
                            planned = self.chunk_count,
                            "Record stream ended before the planned chunk count"
                        );
                    }
                    break;
                }
                Err(e) => {
                    free_slots.push(slot);
                    read_error = Some(ImportError::Read {
                        records_read: source.records_read(),
                        message: e.to_string(),
                    });
                    break;
                }
            };

            if chunks_submitted == self.chunk_count {
                warn!(
                    planned = self.chunk_count,
                    records_read = source.records_read(),
                    "Record stream holds more records than counted, admitting beyond the plan"
                );
            }
            chunks_submitted += 1;
            records_submitted += chunk.len();
            tracker.on_chunk_started(slot, chunk.span());
            in_flight.spawn(run_chunk(
                slot,
                chunk,
                Arc::clone(&processor),
                Arc::clone(&aggregator),
                Arc::clone(&tracker),
            ));
        }

        // Drain: nothing new is admitted, running chunks finish
        while let Some(joined) = in_flight.join_next().await {
            let report = settle(joined, &mut failures)?;
            free_slots.push(report.slot);
        }

        if let Some(e) = read_error {
            error!(records_read = source.records_read(), "Record stream failed, aborting run");
            return Err(e);
        }

        if self.policy == FailurePolicy::Strict && !failures.is_empty() {
            return Err(ImportError::ChunksFailed(failures));
        }

        let aggregator = Arc::try_unwrap(aggregator).map_err(|_| {
            ImportError::Worker("result aggregator still shared after drain".to_string())
        })?;
        let pairs_merged = aggregator.pairs_merged();

        Ok(PoolOutcome {
            index: aggregator.finalize(),
            chunks_submitted,
            records_submitted,
            pairs_merged,
            failures,
        })
    }
}

/// Body of one worker task
///
/// Never panics outward: a panicking processor is reported as a chunk failure
/// so its slot is always returned.
async fn run_chunk<P: ChunkProcessor>(
    slot: usize,
    chunk: Chunk<P::Record>,
    processor: Arc<P>,
    aggregator: Arc<ResultAggregator<P::Key, P::Value>>,
    tracker: Arc<ProgressTracker>,
) -> TaskReport {
    let span = chunk.span();
    let worker = WorkerContext::new(slot, span, Arc::clone(&tracker));

    debug!(worker = slot, chunk = span.index, records = span.len, "Worker starting chunk");

    let outcome = AssertUnwindSafe(processor.process(chunk, worker))
        .catch_unwind()
        .await;

    let failure = match outcome {
        Ok(Ok(pairs)) => {
            let merged = aggregator.merge(pairs);
            if merged < span.len {
                debug!(
                    chunk = span.index,
                    records = span.len,
                    pairs = merged,
                    "Chunk produced fewer pairs than records"
                );
            }
            None
        }
        Ok(Err(e)) => Some(ChunkFailure {
            chunk: span,
            worker: slot,
            cause: format!("{:#}", e),
        }),
        Err(panic) => Some(ChunkFailure {
            chunk: span,
            worker: slot,
            cause: format!("worker panicked: {}", panic_message(panic.as_ref())),
        }),
    };

    if let Some(failure) = &failure {
        error!(worker = slot, chunk = %failure.chunk, cause = %failure.cause, "Chunk processing failed");
    }

    tracker.on_chunk_completed(slot, failure.is_none());
    TaskReport { slot, failure }
}

fn settle(
    joined: Result<TaskReport, JoinError>,
    failures: &mut Vec<ChunkFailure>,
) -> ImportResult<TaskReport> {
    let mut report = joined.map_err(|e| ImportError::Worker(e.to_string()))?;
    if let Some(failure) = report.failure.take() {
        failures.push(failure);
    }
    Ok(report)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
