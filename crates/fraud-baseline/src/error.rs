use thiserror::Error;

use crate::engine::EngineState;

/// A source row that failed schema validation.
///
/// Recovered at the ingestion boundary: the row is skipped, counted, and a
/// bounded sample is kept in the run report.
#[derive(Clone, Debug, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("malformed record at {position}: {reason}")]
pub struct MalformedRecord {
    /// 1-based position of the row in its source (data line for CSV).
    pub position: u64,
    /// What was wrong with it.
    pub reason: String,
}

impl MalformedRecord {
    /// Malformed row at `position` (1-based) with a short reason.
    pub fn new(position: u64, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }
}

/// Errors from the baseline engine and its collaborators.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),

    #[error("record source failed: {0}")]
    Source(String),

    #[error("sink write failed after {delivered} flagged records: {reason}")]
    SinkWrite { delivered: u64, reason: String },

    #[error("run cancelled during {phase}")]
    Cancelled { phase: EngineState },

    #[error("invalid engine state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: EngineState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<csv::Error> for BaselineError {
    fn from(e: csv::Error) -> Self {
        BaselineError::Source(e.to_string())
    }
}

impl From<std::io::Error> for BaselineError {
    fn from(e: std::io::Error) -> Self {
        BaselineError::Persistence(e.to_string())
    }
}

/// Convenience type alias for baseline results.
pub type BaselineResult<T> = Result<T, BaselineError>;
