//! Run summaries returned by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;

/// Identifies one engine run in logs and reports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run:{}", self.0)
    }
}

/// Outcome of pass 1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Rows the source produced, valid or not.
    pub records_seen: u64,
    pub records_ingested: u64,
    pub records_skipped: u64,
    pub distinct_keys: usize,
    /// First malformed rows, capped at `MAX_REPORTED_MALFORMED`.
    pub malformed: Vec<MalformedRecord>,
}

impl IngestSummary {
    pub(crate) fn record_malformed(&mut self, malformed: MalformedRecord) {
        self.records_seen += 1;
        self.records_skipped += 1;
        keep_sample(&mut self.malformed, malformed);
    }

    pub(crate) fn record_ingested(&mut self) {
        self.records_seen += 1;
        self.records_ingested += 1;
    }
}

/// Log a skipped row and keep it if the sample has room.
fn keep_sample(sample: &mut Vec<MalformedRecord>, malformed: MalformedRecord) {
    if sample.len() < super::MAX_REPORTED_MALFORMED {
        tracing::warn!(
            position = malformed.position,
            reason = %malformed.reason,
            "skipping malformed record"
        );
        sample.push(malformed);
    } else {
        tracing::debug!(position = malformed.position, "skipping malformed record");
    }
}

/// Outcome of pass 2.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub records_evaluated: u64,
    pub records_flagged: u64,
    /// Records whose key had no statistics (only possible when evaluating
    /// against a table loaded from elsewhere).
    pub records_unclassified: u64,
    /// Malformed rows skipped by this pass. Only counted when the engine did
    /// not ingest the source itself; otherwise they are in `IngestSummary`.
    pub records_skipped: u64,
    /// First malformed rows, capped at `MAX_REPORTED_MALFORMED`.
    pub malformed: Vec<MalformedRecord>,
}

impl EvaluationSummary {
    pub(crate) fn record_malformed(&mut self, malformed: MalformedRecord) {
        self.records_skipped += 1;
        keep_sample(&mut self.malformed, malformed);
    }
}

/// Non-fatal conditions worth surfacing to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// The source produced no rows at all.
    EmptySource,
    /// Some rows failed validation and were skipped.
    RecordsSkipped { count: u64 },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::EmptySource => write!(f, "record source was empty"),
            RunWarning::RecordsSkipped { count } => {
                write!(f, "{} malformed records skipped", count)
            }
        }
    }
}

/// Full report of an ingest + evaluate run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ingest: IngestSummary,
    pub evaluation: EvaluationSummary,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub(crate) fn warnings_for(ingest: &IngestSummary) -> Vec<RunWarning> {
        let mut warnings = Vec::new();
        if ingest.records_seen == 0 {
            warnings.push(RunWarning::EmptySource);
        }
        if ingest.records_skipped > 0 {
            warnings.push(RunWarning::RecordsSkipped {
                count: ingest.records_skipped,
            });
        }
        warnings
    }
}
