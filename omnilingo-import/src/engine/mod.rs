//! Chunked parallel execution engine
//!
//! Splits a record stream into bounded chunks, runs a caller-supplied
//! [`ChunkProcessor`] over them on a fixed number of concurrent workers, and
//! folds every chunk's `(key, value)` pairs into one [`Index`].
//!
//! # Architecture
//! - [`CapacityPlanner`] runs once and fixes worker count, chunk size and chunk count
//! - [`ChunkSource`] cuts the record stream into chunks, order preserved within a chunk
//! - [`WorkerPool`] admits a chunk only when a worker slot is free and drains at the end
//! - [`ResultAggregator`] merges completed chunks under a mutex
//! - [`ProgressTracker`] counts chunks and per-worker records with atomics
//!
//! Chunks complete in any order, so the value order under a key follows
//! chunk completion order, not input order.

pub mod aggregator;
pub mod chunk_source;
pub mod planner;
pub mod pool;
pub mod progress;

pub use aggregator::{Index, ResultAggregator};
pub use chunk_source::ChunkSource;
pub use planner::{host_parallelism, CapacityPlanner, Plan, DEFAULT_MAX_CHUNK};
pub use pool::{ChunkFailure, FailurePolicy, PoolOutcome, WorkerPool};
pub use progress::{ProgressSnapshot, ProgressTracker, WorkerActivity, WorkerContext};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// One bounded batch of records, owned by exactly one worker at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<R> {
    /// Submission order, starting at 0
    pub index: usize,
    /// Position of the first record in the whole input stream
    pub first_record: usize,
    /// Records in input order
    pub records: Vec<R>,
}

impl<R> Chunk<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identity of this chunk without its payload
    pub fn span(&self) -> ChunkSpan {
        ChunkSpan {
            index: self.index,
            first_record: self.first_record,
            len: self.records.len(),
        }
    }
}

/// Chunk index and the record range it covers
///
/// Carried in failure reports so a caller can retry exactly that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub index: usize,
    pub first_record: usize,
    pub len: usize,
}

impl ChunkSpan {
    /// One past the last record of the chunk
    pub fn end_record(&self) -> usize {
        self.first_record + self.len
    }
}

impl fmt::Display for ChunkSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} (records {}..{})",
            self.index,
            self.first_record,
            self.end_record()
        )
    }
}

/// Per-chunk work supplied by the caller
///
/// Called once per chunk on a worker task. The implementation owns every
/// per-record side effect and must open its own session to any external
/// store: sessions are never shared between concurrent invocations.
///
/// Records that cannot be processed may simply produce no pair; returning
/// `Err` fails the whole chunk.
///
/// # Example
/// ```rust,ignore
/// struct Upper;
///
/// #[async_trait::async_trait]
/// impl ChunkProcessor for Upper {
///     type Record = String;
///     type Key = String;
///     type Value = usize;
///
///     async fn process(&self, chunk: Chunk<String>, worker: WorkerContext) -> anyhow::Result<Vec<(String, usize)>> {
///         let mut pairs = Vec::with_capacity(chunk.len());
///         for (i, rec) in chunk.records.into_iter().enumerate() {
///             pairs.push((rec.to_uppercase(), chunk.first_record + i));
///             worker.record_completed(i);
///         }
///         Ok(pairs)
///     }
/// }
/// ```
#[async_trait]
pub trait ChunkProcessor: Send + Sync + 'static {
    /// Input record type
    type Record: Send + 'static;
    /// Index grouping key
    type Key: Eq + Hash + Send + 'static;
    /// Value appended under a key
    type Value: Send + 'static;

    /// Process every record of `chunk` in order
    async fn process(
        &self,
        chunk: Chunk<Self::Record>,
        worker: WorkerContext,
    ) -> anyhow::Result<Vec<(Self::Key, Self::Value)>>;
}
