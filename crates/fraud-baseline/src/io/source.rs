//! Record sources: lazy, finite and restartable.
//!
//! Every call to `RecordSource::records` starts a fresh pass over the same
//! data, which is what lets the engine read its input twice without
//! buffering it.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{BaselineError, BaselineResult, MalformedRecord};
use crate::record::{RawTransaction, TransactionRecord};

/// One item from a source: a validated record, or the reason it was rejected.
pub type SourceItem = Result<TransactionRecord, MalformedRecord>;

/// Columns a CSV source must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["transaction_id", "user_id", "amount", "timestamp"];

/// A restartable sequence of transaction records.
pub trait RecordSource {
    /// Start a new pass over the records.
    fn records(&self) -> BaselineResult<Box<dyn Iterator<Item = SourceItem> + '_>>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// In-memory source.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    items: Vec<SourceItem>,
}

impl VecSource {
    pub fn new(items: Vec<SourceItem>) -> Self {
        Self { items }
    }

    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        Self::new(records.into_iter().map(Ok).collect())
    }

    pub fn push(&mut self, record: TransactionRecord) {
        self.items.push(Ok(record));
    }

    /// Append a row that failed validation upstream.
    pub fn push_malformed(&mut self, reason: impl Into<String>) {
        let position = self.items.len() as u64 + 1;
        self.items.push(Err(MalformedRecord::new(position, reason)));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl RecordSource for VecSource {
    fn records(&self) -> BaselineResult<Box<dyn Iterator<Item = SourceItem> + '_>> {
        Ok(Box::new(self.items.iter().cloned()))
    }

    fn describe(&self) -> String {
        format!("in-memory ({} rows)", self.items.len())
    }
}

#[derive(Clone, Debug)]
enum CsvInput {
    Path(PathBuf),
    Text(String),
}

/// CSV source with a header row naming `transaction_id`, `user_id`,
/// `amount` and `timestamp` in any order. Extra columns are ignored.
#[derive(Clone, Debug)]
pub struct CsvSource {
    input: CsvInput,
}

impl CsvSource {
    /// Read from a file; each pass reopens it.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            input: CsvInput::Path(path.into()),
        }
    }

    /// Read from CSV text held in memory.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            input: CsvInput::Text(text.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.input {
            CsvInput::Path(p) => Some(p),
            CsvInput::Text(_) => None,
        }
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(csv::Trim::All);
    builder
}

fn rows<'a, R: Read + 'a>(
    mut rdr: csv::Reader<R>,
) -> BaselineResult<Box<dyn Iterator<Item = SourceItem> + 'a>> {
    let headers = rdr.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(BaselineError::Source(format!(
                "missing required column {:?}",
                column
            )));
        }
    }

    let iter = rdr
        .into_deserialize::<RawTransaction>()
        .enumerate()
        .map(|(idx, row)| {
            let position = idx as u64 + 1;
            match row {
                Ok(raw) => raw.validate(position),
                Err(e) => Err(MalformedRecord::new(position, e.to_string())),
            }
        });
    Ok(Box::new(iter))
}

impl RecordSource for CsvSource {
    fn records(&self) -> BaselineResult<Box<dyn Iterator<Item = SourceItem> + '_>> {
        match &self.input {
            CsvInput::Path(path) => {
                let rdr = reader_builder().from_path(path).map_err(|e| {
                    BaselineError::Source(format!("cannot open {}: {}", path.display(), e))
                })?;
                rows(rdr)
            }
            CsvInput::Text(text) => rows(reader_builder().from_reader(text.as_bytes())),
        }
    }

    fn describe(&self) -> String {
        match &self.input {
            CsvInput::Path(p) => format!("csv file {}", p.display()),
            CsvInput::Text(t) => format!("csv text ({} bytes)", t.len()),
        }
    }
}
