//! The labelling history: an append-only CSV log of `(id, label)` rows.
//!
//! The history file is the single source of truth for what has already been
//! labelled. It is created with a bare `id,label` header when missing, and
//! afterwards only ever grows: rows are appended without a header and
//! existing content is never rewritten.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WildlabelError;

/// Header written to a fresh history file.
pub const HISTORY_HEADER: &str = "id,label\n";

/// A single labelling decision.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub label: String,
}

impl HistoryRecord {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The set of identifiers that already have a label.
pub type LabelledIds = HashSet<String>;

/// Collects the identifiers present in a loaded history.
pub fn labelled_ids(records: &[HistoryRecord]) -> LabelledIds {
    records.iter().map(|record| record.id.clone()).collect()
}

/// Parses history rows from CSV bytes, header included.
///
/// Useful for fuzzing and processing raw bytes without requiring UTF-8 upfront.
pub fn from_history_csv_slice(bytes: &[u8]) -> Result<Vec<HistoryRecord>, WildlabelError> {
    parse_history(bytes, Path::new("<bytes>"))
}

fn parse_history<R: Read>(reader: R, path: &Path) -> Result<Vec<HistoryRecord>, WildlabelError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize() {
        let record: HistoryRecord = result.map_err(|source| WildlabelError::HistoryParse {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Handle to the history CSV on disk.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every record, creating an empty history if none exists yet.
    pub fn load(&self) -> Result<Vec<HistoryRecord>, WildlabelError> {
        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => return Err(WildlabelError::Io(err)),
        };

        if needs_header {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(WildlabelError::Io)?;
                }
            }
            fs::write(&self.path, HISTORY_HEADER).map_err(WildlabelError::Io)?;
            tracing::debug!(path = %self.path.display(), "created empty labelling history");
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(WildlabelError::Io)?;
        let records = parse_history(BufReader::new(file), &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "loaded labelling history"
        );
        Ok(records)
    }

    /// Appends rows to the end of the history without a header.
    pub fn append(&self, records: &[HistoryRecord]) -> Result<(), WildlabelError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(WildlabelError::Io)?;

        // a last row without its newline would swallow the first new row
        if !ends_with_newline(&mut file).map_err(WildlabelError::Io)? {
            file.write_all(b"\n").map_err(WildlabelError::Io)?;
            tracing::debug!(path = %self.path.display(), "terminated unfinished history row");
        }

        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for record in records {
            csv_writer
                .serialize(record)
                .map_err(|source| WildlabelError::HistoryWrite {
                    path: self.path.clone(),
                    source,
                })?;
        }

        csv_writer
            .into_inner()
            .map_err(|e| WildlabelError::Io(e.into_error()))?
            .flush()
            .map_err(WildlabelError::Io)?;

        Ok(())
    }
}

/// True for an empty file or one whose last byte is a newline.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Buffers new records and appends them to the history in batches.
///
/// `flush` only ever writes the rows that have not been written yet.
#[derive(Debug)]
pub struct BatchWriter {
    store: HistoryStore,
    batch_size: usize,
    pending: Vec<HistoryRecord>,
    flushed_batches: usize,
    flushed_rows: usize,
}

impl BatchWriter {
    /// Creates a writer. A `batch_size` of zero is treated as one.
    pub fn new(store: HistoryStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            flushed_batches: 0,
            flushed_rows: 0,
        }
    }

    /// Buffers a record, flushing when the batch is full.
    ///
    /// Returns `true` if this call triggered a flush.
    pub fn push(&mut self, record: HistoryRecord) -> Result<bool, WildlabelError> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Appends all pending records and clears the buffer.
    pub fn flush(&mut self) -> Result<usize, WildlabelError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        self.store.append(&self.pending)?;
        let written = self.pending.len();
        self.pending.clear();
        self.flushed_batches += 1;
        self.flushed_rows += written;
        tracing::info!(
            rows = written,
            path = %self.store.path().display(),
            "flushed labels to history"
        );
        Ok(written)
    }

    pub fn pending(&self) -> &[HistoryRecord] {
        &self.pending
    }

    pub fn flushed_batches(&self) -> usize {
        self.flushed_batches
    }

    pub fn flushed_rows(&self) -> usize {
        self.flushed_rows
    }

}
