//! Run orchestration: validate, plan, execute, write, summarize
//!
//! **Flow:**
//! 1. Validate the dump directory and prepare the output directory
//! 2. Count records and compute the [`Plan`]
//! 3. Run the [`WorkerPool`] with a [`ClipChunkProcessor`]
//! 4. Write the index (keys sorted) atomically, then log the summary
//!
//! In strict mode a failed chunk aborts the run and nothing is written.

use crate::dataset::{count_records, open_records, DatasetLayout};
use crate::engine::{
    host_parallelism, CapacityPlanner, ChunkFailure, ChunkSource, FailurePolicy, Index, Plan,
    ProgressTracker, WorkerPool, DEFAULT_MAX_CHUNK,
};
use crate::error::{ImportError, ImportResult};
use crate::processor::{ClipChunkProcessor, DEFAULT_COPYRIGHT};
use crate::status::{self, StatusState};
use crate::store::StoreConnector;
use chrono::{DateTime, Utc};
use omnilingo_common::human_time::{format_elapsed, Throughput};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Knobs for one import run
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub max_chunk: usize,
    /// Parallelism available to the planner (logical cores unless overridden)
    pub host_parallelism: usize,
    pub policy: FailurePolicy,
    pub copyright: String,
    /// Compute identifiers without modifying clips
    pub dry_run: bool,
    /// Draw progress bars when the run takes several rounds
    pub render_progress: bool,
    pub status_addr: Option<SocketAddr>,
    /// Where to write the JSON run report, if anywhere
    pub report_path: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_chunk: DEFAULT_MAX_CHUNK,
            host_parallelism: host_parallelism(),
            policy: FailurePolicy::default(),
            copyright: DEFAULT_COPYRIGHT.to_string(),
            dry_run: false,
            render_progress: false,
            status_addr: None,
            report_path: None,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dataset_dir: PathBuf,
    pub output_path: PathBuf,
    pub store: String,
    pub dry_run: bool,
    /// Data lines in `validated.tsv`
    pub record_count: usize,
    pub plan: Plan,
    pub chunks_submitted: usize,
    pub records_submitted: usize,
    /// Clips written to the index
    pub pairs_merged: usize,
    /// Distinct sentences in the index
    pub sentence_count: usize,
    pub malformed_records: usize,
    pub missing_clips: usize,
    pub failures: Vec<ChunkFailure>,
    pub elapsed_ms: u64,
}

impl ImportReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// True when every record produced a pair
    pub fn is_complete(&self) -> bool {
        self.pairs_merged == self.record_count
    }
}

/// Imports a Common Voice dump into a sentence → clips index
pub struct Importer<C> {
    options: ImportOptions,
    connector: Arc<C>,
}

impl<C: StoreConnector> Importer<C> {
    pub fn new(options: ImportOptions, connector: Arc<C>) -> Self {
        Self { options, connector }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import `dataset_dir` and write the index to `output_path`
    pub async fn run(&self, dataset_dir: &Path, output_path: &Path) -> ImportResult<ImportReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let layout = DatasetLayout::new(dataset_dir);
        layout.validate()?;
        ensure_parent_dir(output_path).await?;

        let validated_path = layout.validated_path.clone();
        let record_count = tokio::task::spawn_blocking(move || count_records(&validated_path))
            .await
            .map_err(|e| ImportError::Worker(format!("Record count task failed: {}", e)))??;

        let plan = CapacityPlanner::new(self.options.max_chunk)
            .plan(record_count, self.options.host_parallelism);

        info!(
            %run_id,
            records = record_count,
            dataset = %dataset_dir.display(),
            output = %output_path.display(),
            store = %self.connector.describe(),
            dry_run = self.options.dry_run,
            "Starting import"
        );
        info!(
            workers = plan.worker_count,
            chunk_size = plan.chunk_size,
            chunks = plan.chunk_count,
            "Using {} workers, {} records per chunk, {} chunks",
            plan.worker_count,
            plan.chunk_size,
            plan.chunk_count
        );

        let tracker = Arc::new(ProgressTracker::for_plan(&plan, self.options.render_progress));
        let status_server = match self.options.status_addr {
            Some(addr) => {
                let state = StatusState::new(run_id, Arc::clone(&tracker));
                Some(status::spawn(addr, state).await?.1)
            }
            None => None,
        };

        let processor = Arc::new(
            ClipChunkProcessor::new(layout.clone(), Arc::clone(&self.connector))
                .with_copyright(self.options.copyright.clone())
                .with_dry_run(self.options.dry_run),
        );
        let source = ChunkSource::new(open_records(&layout.validated_path)?, plan.chunk_size);

        let outcome = WorkerPool::new(&plan, self.options.policy)
            .run(source, Arc::clone(&processor), Arc::clone(&tracker))
            .await;

        tracker.finish();
        if let Some(handle) = status_server {
            handle.abort();
        }
        let outcome = outcome?;

        for failure in &outcome.failures {
            warn!(
                chunk = failure.chunk.index,
                first_record = failure.chunk.first_record,
                records = failure.chunk.len,
                cause = %failure.cause,
                "Chunk failed, its records are missing from the index"
            );
        }

        write_index(output_path, &outcome.index).await?;
        info!(path = %output_path.display(), sentences = outcome.index.len(), "Index written");

        let elapsed = start.elapsed();
        let report = ImportReport {
            run_id,
            started_at,
            dataset_dir: dataset_dir.to_path_buf(),
            output_path: output_path.to_path_buf(),
            store: self.connector.describe(),
            dry_run: self.options.dry_run,
            record_count,
            plan,
            chunks_submitted: outcome.chunks_submitted,
            records_submitted: outcome.records_submitted,
            pairs_merged: outcome.pairs_merged,
            sentence_count: outcome.index.len(),
            malformed_records: processor.malformed_records(),
            missing_clips: processor.missing_clips(),
            failures: outcome.failures,
            elapsed_ms: elapsed.as_millis() as u64,
        };

        log_summary(&report, elapsed);

        if let Some(path) = &self.options.report_path {
            write_json_atomic(path, serde_json::to_vec_pretty(&report)?).await?;
            info!(path = %path.display(), "Run report written");
        }

        Ok(report)
    }
}

fn log_summary(report: &ImportReport, elapsed: Duration) {
    if report.is_complete() {
        info!(
            "Returned items {} - Required {}",
            report.pairs_merged, report.record_count
        );
    } else {
        let failed_records: usize = report.failures.iter().map(|f| f.chunk.len).sum();
        warn!(
            malformed = report.malformed_records,
            missing_clips = report.missing_clips,
            failed_chunk_records = failed_records,
            "Returned items {} - Required {} (Reason: {})",
            report.pairs_merged,
            report.record_count,
            discrepancy_reason(report.malformed_records, report.missing_clips, failed_records)
        );
    }

    info!("Elapsed time: {}", format_elapsed(elapsed));
    if let Some(throughput) = Throughput::compute(report.record_count as u64, elapsed) {
        info!("Speed: {}", throughput);
    }
}

fn discrepancy_reason(malformed: usize, missing_clips: usize, failed_records: usize) -> String {
    let mut reasons = Vec::new();
    if malformed > 0 {
        reasons.push(format!("{} malformed rows", malformed));
    }
    if missing_clips > 0 {
        reasons.push(format!("{} missing clips", missing_clips));
    }
    if failed_records > 0 {
        reasons.push(format!("{} records in failed chunks", failed_records));
    }
    if reasons.is_empty() {
        // Lines that are not records, e.g. blank lines
        "unparsed lines in dataset".to_string()
    } else {
        reasons.join(", ")
    }
}

async fn ensure_parent_dir(output_path: &Path) -> ImportResult<()> {
    let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if !parent.exists() {
        warn!(dir = %parent.display(), "Output directory does not exist, creating it");
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Serialize the index with sorted keys and write it atomically
pub async fn write_index(path: &Path, index: &Index<String, String>) -> ImportResult<()> {
    let bytes = serde_json::to_vec(&index.sorted())?;
    write_json_atomic(path, bytes).await
}

async fn write_json_atomic(path: &Path, bytes: Vec<u8>) -> ImportResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discrepancy_reason() {
        assert_eq!(discrepancy_reason(0, 0, 0), "unparsed lines in dataset");
        assert_eq!(
            discrepancy_reason(2, 1, 0),
            "2 malformed rows, 1 missing clips"
        );
        assert_eq!(discrepancy_reason(0, 0, 1000), "1000 records in failed chunks");
    }

    #[tokio::test]
    async fn test_write_index_sorted_and_atomic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");

        let aggregator = crate::engine::ResultAggregator::new();
        aggregator.merge(vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "3".to_string()),
        ]);
        write_index(&path, &aggregator.finalize()).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, r#"{"a":["1"],"b":["2","3"]}"#);
        assert!(!dir.path().join("index.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_parent_dir_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/index.json");
        ensure_parent_dir(&path).await.unwrap();
        assert!(dir.path().join("nested/out").is_dir());
    }
}
