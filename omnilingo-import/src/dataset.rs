//! Common Voice dump reader
//!
//! A dump directory holds `validated.tsv` (tab-separated, header row) and a
//! `clips/` directory with the audio file each row references.
//!
//! Quoting is disabled: sentences contain bare `"` characters and a quoting
//! reader would swallow every following line up to the next quote.

use crate::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const TSV_NAME: &str = "validated.tsv";
const CLIPS_DIR: &str = "clips";

/// One validated clip row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRecord {
    pub client_id: String,
    /// Clip file name, relative to `clips/`
    pub path: String,
    pub sentence: String,
    #[serde(default)]
    pub up_votes: Option<u32>,
    #[serde(default)]
    pub down_votes: Option<u32>,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub accents: String,
    #[serde(default)]
    pub variant: String,
    pub locale: String,
    #[serde(default)]
    pub segment: String,
}

/// A row as handed to the chunk processor
///
/// Rows that fail to parse stay in the stream so chunk boundaries and
/// record positions match the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetRow {
    Clip(ClipRecord),
    Malformed { line: u64, reason: String },
}

/// Paths inside a dump directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub validated_path: PathBuf,
    pub clips_path: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            validated_path: root.join(TSV_NAME),
            clips_path: root.join(CLIPS_DIR),
            root,
        }
    }

    /// Fail if `validated.tsv` is missing
    pub fn validate(&self) -> ImportResult<()> {
        if !self.validated_path.is_file() {
            return Err(ImportError::Input(format!(
                "{} is not found in {}",
                TSV_NAME,
                self.root.display()
            )));
        }
        if !self.clips_path.is_dir() {
            tracing::warn!(
                clips = %self.clips_path.display(),
                "Clips directory not found, every record will be skipped"
            );
        }
        Ok(())
    }

    /// Absolute path of a clip referenced by a row
    pub fn clip_path(&self, relative: &str) -> PathBuf {
        self.clips_path.join(relative)
    }
}

/// Count data records in a TSV file without parsing it
///
/// Reads 1MB blocks and counts record terminators the way the row reader
/// does: `\n`, `\r` and `\r\n` each end one record. A final line without a
/// terminator still counts; the header line does not.
pub fn count_records(path: &Path) -> io::Result<usize> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; 1024 * 1024];
    let mut lines = 0usize;
    let mut last_byte = None;

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        for &byte in &buffer[..bytes_read] {
            match byte {
                // Second half of a `\r\n` pair was already counted
                b'\n' if last_byte == Some(b'\r') => {}
                b'\n' | b'\r' => lines += 1,
                _ => {}
            }
            last_byte = Some(byte);
        }
    }

    if matches!(last_byte, Some(b) if b != b'\n' && b != b'\r') {
        lines += 1;
    }

    Ok(lines.saturating_sub(1))
}

/// Lazy row iterator over a TSV source
pub struct DatasetRows<R> {
    inner: csv::DeserializeRecordsIntoIter<R, ClipRecord>,
}

impl<R: Read> Iterator for DatasetRows<R> {
    /// `Err` only for I/O failures; parse failures become [`DatasetRow::Malformed`]
    type Item = Result<DatasetRow, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;
        Some(match result {
            Ok(record) => Ok(DatasetRow::Clip(record)),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => Err(e),
            Err(e) => Ok(DatasetRow::Malformed {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                reason: e.to_string(),
            }),
        })
    }
}

/// Read rows from any reader (header row first)
pub fn read_rows<R: Read>(reader: R) -> DatasetRows<R> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    DatasetRows {
        inner: reader.into_deserialize(),
    }
}

/// Open `validated.tsv` for streaming
pub fn open_records(path: &Path) -> ImportResult<DatasetRows<File>> {
    let file = File::open(path)?;
    Ok(read_rows(file))
}
