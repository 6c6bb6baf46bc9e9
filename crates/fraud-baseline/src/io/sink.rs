//! Sinks for flagged records.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use tracing::debug;

use crate::error::{BaselineError, BaselineResult};
use crate::record::FlaggedRecord;

/// Receives flagged records as the evaluation pass produces them.
pub trait FlaggedSink {
    fn write(&mut self, flagged: &FlaggedRecord) -> BaselineResult<()>;

    /// Called once after the last record of a pass.
    fn finish(&mut self) -> BaselineResult<()> {
        Ok(())
    }
}

/// Keeps flagged records in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Vec<FlaggedRecord>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[FlaggedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<FlaggedRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FlaggedSink for CollectingSink {
    fn write(&mut self, flagged: &FlaggedRecord) -> BaselineResult<()> {
        self.records.push(flagged.clone());
        Ok(())
    }
}

/// Header written by `CsvSink`.
pub const CSV_SINK_HEADER: [&str; 8] = [
    "transaction_id",
    "user_id",
    "amount",
    "timestamp",
    "avg_amount",
    "stddev_amount",
    "transaction_count",
    "is_fraud",
];

/// CSV file sink in overwrite mode.
///
/// Rows go to a `.tmp` sibling; `finish` flushes and renames it over the
/// target, so an interrupted run never leaves a half-written output file.
pub struct CsvSink {
    path: PathBuf,
    tmp_path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvSink {
    pub fn create(path: impl Into<PathBuf>) -> BaselineResult<Self> {
        let path = path.into();
        let tmp_path = path.with_extension("tmp");
        let mut writer = csv::Writer::from_path(&tmp_path).map_err(sink_error)?;
        writer.write_record(CSV_SINK_HEADER).map_err(sink_error)?;
        Ok(Self {
            path,
            tmp_path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sink_error(e: csv::Error) -> BaselineError {
    BaselineError::Persistence(e.to_string())
}

impl FlaggedSink for CsvSink {
    fn write(&mut self, flagged: &FlaggedRecord) -> BaselineResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BaselineError::Persistence("csv sink already finished".into()))?;
        let rec = &flagged.record;
        writer
            .write_record([
                rec.transaction_id.clone(),
                rec.user_id.clone(),
                rec.amount.to_string(),
                rec.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                flagged.key_mean.to_string(),
                flagged.key_stddev.to_string(),
                flagged.key_count.to_string(),
                u8::from(flagged.is_fraud).to_string(),
            ])
            .map_err(sink_error)
    }

    fn finish(&mut self) -> BaselineResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            drop(writer);
            std::fs::rename(&self.tmp_path, &self.path)?;
            debug!(path = %self.path.display(), "flagged records written");
        }
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        // Dropped before `finish`: discard the partial `.tmp` file.
        if let Some(writer) = self.writer.take() {
            drop(writer);
            if let Err(e) = std::fs::remove_file(&self.tmp_path) {
                debug!(path = %self.tmp_path.display(), error = %e, "could not remove unfinished output");
            }
        }
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FlaggedSink for JsonLinesSink<W> {
    fn write(&mut self, flagged: &FlaggedRecord) -> BaselineResult<()> {
        serde_json::to_writer(&mut self.out, flagged)
            .map_err(|e| BaselineError::Persistence(e.to_string()))?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> BaselineResult<()> {
        self.out.flush()?;
        Ok(())
    }
}
