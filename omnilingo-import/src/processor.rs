//! Common Voice chunk processor
//!
//! For every clip row: store the sentence document, tag the clip with the
//! sentence CID, store the clip, and emit `(sentence_cid, clip_cid)`.

use crate::dataset::{ClipRecord, DatasetLayout, DatasetRow};
use crate::engine::{Chunk, ChunkProcessor, WorkerContext};
use crate::store::{ContentStore, StoreConnector};
use crate::tagger::{write_clip_tags_blocking, ClipTags};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// License written into sentence documents and clip tags by default
pub const DEFAULT_COPYRIGHT: &str = "CC0-1.0";

/// Why a record produced no pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    MissingClip,
}

/// Turns dataset rows into sentence/clip CID pairs
pub struct ClipChunkProcessor<C> {
    layout: DatasetLayout,
    connector: Arc<C>,
    copyright: String,
    dry_run: bool,
    malformed: AtomicUsize,
    missing_clips: AtomicUsize,
}

impl<C: StoreConnector> ClipChunkProcessor<C> {
    pub fn new(layout: DatasetLayout, connector: Arc<C>) -> Self {
        Self {
            layout,
            connector,
            copyright: DEFAULT_COPYRIGHT.to_string(),
            dry_run: false,
            malformed: AtomicUsize::new(0),
            missing_clips: AtomicUsize::new(0),
        }
    }

    pub fn with_copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = copyright.into();
        self
    }

    /// Leave clip files untouched
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn copyright(&self) -> &str {
        &self.copyright
    }

    /// Rows that could not be parsed
    pub fn malformed_records(&self) -> usize {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Rows whose clip file does not exist
    pub fn missing_clips(&self) -> usize {
        self.missing_clips.load(Ordering::Relaxed)
    }

    fn skip(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::Malformed => &self.malformed,
            SkipReason::MissingClip => &self.missing_clips,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    async fn import_clip(
        &self,
        store: &dyn ContentStore,
        record: &ClipRecord,
    ) -> anyhow::Result<Option<(String, String)>> {
        let clip_path = self.layout.clip_path(&record.path);
        if !clip_path.is_file() {
            warn!(clip = %clip_path.display(), client_id = %record.client_id, "Clip file not found, skipping record");
            self.skip(SkipReason::MissingClip);
            return Ok(None);
        }

        let sentence = json!({
            "content": record.sentence,
            "language": record.locale,
            "copyright": self.copyright,
        });
        let sentence_cid = store
            .add_json(&sentence)
            .await
            .with_context(|| format!("storing sentence for {}", record.path))?;

        if !self.dry_run {
            let tags = ClipTags {
                copyright: self.copyright.clone(),
                language: record.locale.clone(),
                album: sentence_cid.clone(),
                author: record.client_id.clone(),
            };
            write_clip_tags_blocking(clip_path.clone(), tags).await?;
        }

        let clip_cid = store
            .add_file(&clip_path)
            .await
            .with_context(|| format!("storing clip {}", record.path))?;

        debug!(sentence = %sentence_cid, clip = %clip_cid, "Clip imported");
        Ok(Some((sentence_cid, clip_cid)))
    }
}

#[async_trait]
impl<C: StoreConnector> ChunkProcessor for ClipChunkProcessor<C> {
    type Record = DatasetRow;
    type Key = String;
    type Value = String;

    async fn process(
        &self,
        chunk: Chunk<DatasetRow>,
        worker: WorkerContext,
    ) -> anyhow::Result<Vec<(String, String)>> {
        let store = self
            .connector
            .connect()
            .await
            .with_context(|| format!("connecting to {}", self.connector.describe()))?;

        let mut pairs = Vec::with_capacity(chunk.len());
        for (i, row) in chunk.records.into_iter().enumerate() {
            match row {
                DatasetRow::Clip(record) => {
                    if let Some(pair) = self.import_clip(store.as_ref(), &record).await? {
                        pairs.push(pair);
                    }
                }
                DatasetRow::Malformed { line, reason } => {
                    warn!(line, reason = %reason, "Skipping malformed dataset row");
                    self.skip(SkipReason::Malformed);
                }
            }
            worker.record_completed(i);
        }

        Ok(pairs)
    }
}
