//! Chunk and per-worker progress tracking
//!
//! Counters are atomics and per-worker activity sits behind one small mutex
//! per slot, so workers never contend with each other. Rendering (indicatif
//! bars) is optional and never feeds back into the import result.

use super::{ChunkSpan, Plan};
use chrono::{DateTime, Utc};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHUNK_BAR_TEMPLATE: &str =
    "{prefix} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} chunks (eta {eta})";
const WORKER_BAR_TEMPLATE: &str = "{prefix} {wide_bar:.green/white} {pos}/{len} {msg}";

/// What one worker slot is doing right now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerActivity {
    /// Worker slot index (0-based)
    pub worker_id: usize,
    /// Chunk currently assigned, if any
    pub chunk: Option<ChunkSpan>,
    /// Records finished in the current chunk
    pub records_done: usize,
    /// Chunks this slot has finished
    pub chunks_done: usize,
    /// When the current chunk was assigned
    pub started_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_chunks: usize,
    pub started_chunks: usize,
    /// Finished chunks, successful or not (monotonic)
    pub completed_chunks: usize,
    pub failed_chunks: usize,
    pub in_flight: usize,
    pub records_completed: usize,
    pub workers: Vec<WorkerActivity>,
}

struct ProgressBars {
    _multi: MultiProgress,
    chunks: ProgressBar,
    workers: Vec<ProgressBar>,
}

impl ProgressBars {
    fn new(total_chunks: usize, worker_count: usize) -> Self {
        let multi = MultiProgress::new();

        let chunk_style = ProgressStyle::with_template(CHUNK_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        let worker_style = ProgressStyle::with_template(WORKER_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");

        let chunks = multi.add(ProgressBar::new(total_chunks as u64));
        chunks.set_style(chunk_style);
        chunks.set_prefix("Chunks:   ");
        chunks.enable_steady_tick(Duration::from_millis(500));

        let workers = (0..worker_count)
            .map(|i| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(worker_style.clone());
                bar.set_prefix(format!("Worker-{}: ", i));
                bar
            })
            .collect();

        Self {
            _multi: multi,
            chunks,
            workers,
        }
    }
}

/// Shared progress state for one run
pub struct ProgressTracker {
    total_chunks: usize,
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    records_done: AtomicUsize,
    workers: Vec<Mutex<WorkerActivity>>,
    bars: Option<ProgressBars>,
}

impl ProgressTracker {
    /// Create a silent tracker
    pub fn new(total_chunks: usize, worker_count: usize) -> Self {
        Self {
            total_chunks,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            records_done: AtomicUsize::new(0),
            workers: (0..worker_count)
                .map(|worker_id| {
                    Mutex::new(WorkerActivity {
                        worker_id,
                        ..Default::default()
                    })
                })
                .collect(),
            bars: None,
        }
    }

    /// Create a tracker for `plan`, rendering bars only if requested and the
    /// run takes more than one round (`chunk_count > worker_count`)
    pub fn for_plan(plan: &Plan, render: bool) -> Self {
        let mut tracker = Self::new(plan.chunk_count, plan.worker_count);
        if render && plan.runs_multiple_rounds() {
            tracker.bars = Some(ProgressBars::new(plan.chunk_count, plan.worker_count));
        }
        tracker
    }

    pub fn is_rendering(&self) -> bool {
        self.bars.is_some()
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// A chunk was admitted to `slot`
    pub fn on_chunk_started(&self, slot: usize, chunk: ChunkSpan) {
        self.started.fetch_add(1, Ordering::SeqCst);

        if let Some(activity) = self.workers.get(slot) {
            let mut activity = lock(activity);
            activity.chunk = Some(chunk);
            activity.records_done = 0;
            activity.started_at = Some(Utc::now());
        }

        if let Some(bar) = self.bars.as_ref().and_then(|b| b.workers.get(slot)) {
            bar.set_length(chunk.len as u64);
            bar.set_position(0);
            bar.set_message(format!("chunk {}", chunk.index));
        }
    }

    /// The chunk on `slot` finished, successfully or not
    ///
    /// Returns the new completed-chunk count.
    pub fn on_chunk_completed(&self, slot: usize, succeeded: bool) -> usize {
        if !succeeded {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(activity) = self.workers.get(slot) {
            let mut activity = lock(activity);
            activity.chunk = None;
            activity.started_at = None;
            activity.chunks_done += 1;
        }

        if let Some(bars) = &self.bars {
            bars.chunks.set_position(completed as u64);
            if let Some(bar) = bars.workers.get(slot) {
                bar.set_message("idle");
            }
        }

        if self.logs_on_completion(completed) {
            tracing::info!(
                progress = format!("{}/{}", completed, self.total_chunks),
                failed = self.failed.load(Ordering::SeqCst),
                "Chunk progress update"
            );
        }

        completed
    }

    /// Record `index_in_chunk` of the chunk on `slot` is done
    pub fn on_record_completed(&self, slot: usize, index_in_chunk: usize) {
        self.records_done.fetch_add(1, Ordering::Relaxed);

        if let Some(activity) = self.workers.get(slot) {
            lock(activity).records_done = index_in_chunk + 1;
        }

        if let Some(bar) = self.bars.as_ref().and_then(|b| b.workers.get(slot)) {
            bar.set_position(index_in_chunk as u64 + 1);
        }
    }

    pub fn completed_chunks(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let started = self.started.load(Ordering::SeqCst);
        let completed = self.completed.load(Ordering::SeqCst);

        ProgressSnapshot {
            total_chunks: self.total_chunks,
            started_chunks: started,
            completed_chunks: completed,
            failed_chunks: self.failed.load(Ordering::SeqCst),
            in_flight: started.saturating_sub(completed),
            records_completed: self.records_done.load(Ordering::Relaxed),
            workers: self.workers.iter().map(|w| lock(w).clone()).collect(),
        }
    }

    /// Stop rendering and return the final counts; counters stay readable
    ///
    /// Logs the closing progress line unless the last completed chunk
    /// already did (a stream shorter than planned never reaches the total).
    pub fn finish(&self) -> ProgressSnapshot {
        if let Some(bars) = &self.bars {
            for bar in &bars.workers {
                bar.finish_and_clear();
            }
            bars.chunks.finish();
        }

        let snapshot = self.snapshot();
        if !self.logs_on_completion(snapshot.completed_chunks) {
            tracing::info!(
                progress = format!("{}/{}", snapshot.completed_chunks, self.total_chunks),
                failed = snapshot.failed_chunks,
                "Chunk progress update"
            );
        }
        snapshot
    }

    /// Whether completing chunk number `completed` emits a progress line
    fn logs_on_completion(&self, completed: usize) -> bool {
        completed > 0 && (completed % 10 == 0 || completed == self.total_chunks)
    }
}

fn lock(activity: &Mutex<WorkerActivity>) -> std::sync::MutexGuard<'_, WorkerActivity> {
    activity
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle given to a [`ChunkProcessor`](super::ChunkProcessor) invocation
///
/// Identifies the worker slot and chunk, and forwards record-level progress.
#[derive(Clone)]
pub struct WorkerContext {
    slot: usize,
    chunk: ChunkSpan,
    tracker: Arc<ProgressTracker>,
}

impl WorkerContext {
    pub fn new(slot: usize, chunk: ChunkSpan, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            slot,
            chunk,
            tracker,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn chunk(&self) -> ChunkSpan {
        self.chunk
    }

    pub fn record_completed(&self, index_in_chunk: usize) {
        self.tracker.on_record_completed(self.slot, index_in_chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(index: usize, len: usize) -> ChunkSpan {
        ChunkSpan {
            index,
            first_record: index * len,
            len,
        }
    }

    #[test]
    fn test_rendering_only_for_multiple_rounds() {
        let one_round = Plan {
            worker_count: 3,
            chunk_size: 1000,
            chunk_count: 3,
        };
        let many_rounds = Plan {
            worker_count: 4,
            chunk_size: 1000,
            chunk_count: 12,
        };

        assert!(!ProgressTracker::for_plan(&one_round, true).is_rendering());
        assert!(!ProgressTracker::for_plan(&many_rounds, false).is_rendering());
        assert!(ProgressTracker::for_plan(&many_rounds, true).is_rendering());
    }

    #[test]
    fn test_snapshot_counts() {
        let tracker = ProgressTracker::new(3, 2);
        tracker.on_chunk_started(0, span(0, 10));
        tracker.on_chunk_started(1, span(1, 10));
        tracker.on_record_completed(1, 0);
        tracker.on_record_completed(1, 1);

        let snap = tracker.snapshot();
        assert_eq!(snap.in_flight, 2);
        assert_eq!(snap.completed_chunks, 0);
        assert_eq!(snap.records_completed, 2);
        assert_eq!(snap.workers[1].records_done, 2);
        assert_eq!(snap.workers[1].chunk, Some(span(1, 10)));

        assert_eq!(tracker.on_chunk_completed(0, true), 1);
        assert_eq!(tracker.on_chunk_completed(1, false), 2);

        let snap = tracker.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.completed_chunks, 2);
        assert_eq!(snap.failed_chunks, 1);
        assert_eq!(snap.workers[0].chunks_done, 1);
        assert!(snap.workers[0].chunk.is_none());
    }

    #[test]
    fn test_unknown_slot_ignored() {
        let tracker = ProgressTracker::new(1, 1);
        tracker.on_chunk_started(5, span(0, 1));
        tracker.on_record_completed(5, 0);
        tracker.on_chunk_completed(5, true);
        assert_eq!(tracker.completed_chunks(), 1);
    }

    #[test]
    fn test_worker_context_forwards() {
        let tracker = Arc::new(ProgressTracker::new(1, 1));
        let ctx = WorkerContext::new(0, span(0, 5), Arc::clone(&tracker));
        ctx.record_completed(4);
        assert_eq!(tracker.snapshot().workers[0].records_done, 5);
        assert_eq!(ctx.chunk().len, 5);
    }

    #[test]
    fn test_finish_closes_short_run() {
        // Planned 5 chunks, stream ended after 3
        let tracker = ProgressTracker::new(5, 2);
        for i in 0..3 {
            tracker.on_chunk_started(0, span(i, 4));
            tracker.on_chunk_completed(0, true);
        }
        assert!(!tracker.logs_on_completion(3));

        let last = tracker.finish();
        assert_eq!(last.completed_chunks, 3);
        assert_eq!(last.total_chunks, 5);
        assert_eq!(last.in_flight, 0);
    }

    #[test]
    fn test_completion_log_cadence() {
        let tracker = ProgressTracker::new(25, 4);
        assert!(!tracker.logs_on_completion(0));
        assert!(!tracker.logs_on_completion(9));
        assert!(tracker.logs_on_completion(10));
        assert!(tracker.logs_on_completion(20));
        assert!(tracker.logs_on_completion(25));
    }
}
